//! CLI command implementations.

pub mod key;
pub mod list;
pub mod serve;
pub mod sync;

use bibvault_store::TagSet;
use thiserror::Error;

/// Failures the commands report on their own account.
#[derive(Debug, Error)]
pub enum CliError {
    /// A required flag was missing or malformed.
    #[error("usage: {0}")]
    Usage(String),

    /// Some documents did not sync.
    #[error("{failed} of {total} documents failed to sync")]
    SyncFailures {
        /// Documents that did not sync.
        failed: usize,
        /// Documents attempted.
        total: usize,
    },
}

/// Collects repeated `--tag` flags.
pub fn tag_set(tags: &[String]) -> TagSet {
    tags.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_flags_skip_blanks() {
        let tags = tag_set(&["physics".into(), " ".into(), "math ".into()]);
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("math"));
    }

    #[test]
    fn sync_failure_message() {
        let err = CliError::SyncFailures { failed: 2, total: 5 };
        assert_eq!(err.to_string(), "2 of 5 documents failed to sync");
    }
}
