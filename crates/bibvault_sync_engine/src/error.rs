//! Error types for the sync engine.

use bibvault_archive::ArchiveError;
use bibvault_store::StoreError;
use bibvault_sync_protocol::ProtocolError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// The engine converts these into [`crate::SyncOutcome`]s at its public
/// boundary; they surface directly only from the lower-level helpers and
/// the virtual file manipulator.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Malformed request or response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The credential is missing or not registered.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The credential may not touch this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The remote copy moved past the base the upload was prepared against.
    #[error("stale write rejected: {0}")]
    StaleWrite(String),

    /// The server failed while handling the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Neither side knows the id.
    #[error("record {0} not found")]
    NotFound(Uuid),

    /// A write was attempted on a document with no local replica.
    #[error("record {0} has no local replica")]
    NotLocal(Uuid),

    /// No remote endpoint is configured.
    #[error("no remote configured")]
    Offline,

    /// Local record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Archive pack or unpack failure.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A local replica did not end up where it was expected.
    #[error("local integrity violation: {0}")]
    LocalIntegrity(String),

    /// Filesystem failure outside the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Transport was closed.
    #[error("not connected to server")]
    NotConnected,

    /// Batch was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried after a delay.
    ///
    /// The engine never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns true for failures of the local replica rather than the
    /// network or the remote.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SyncError::Store(_)
                | SyncError::Archive(_)
                | SyncError::LocalIntegrity(_)
                | SyncError::Io(_)
        )
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerError("internal error".into()).is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::StaleWrite("server at 200".into()).is_retryable());
        assert!(!SyncError::Unauthorized("bad key".into()).is_retryable());
    }

    #[test]
    fn local_errors() {
        assert!(SyncError::LocalIntegrity("missing".into()).is_local());
        assert!(SyncError::Store(StoreError::NotFound(Uuid::nil())).is_local());
        assert!(!SyncError::Timeout.is_local());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");

        let id = Uuid::new_v4();
        assert!(SyncError::NotLocal(id).to_string().contains(&id.to_string()));
    }
}
