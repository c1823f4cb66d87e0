//! Sync outcomes, replica states and statistics.

use std::fmt;
use std::time::Instant;

/// Result of one per-document sync operation.
///
/// Network and local failures are folded into outcomes at the engine
/// boundary; nothing propagates past it as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    /// Both sides agree, or the engine is offline.
    Unchanged,
    /// The local replica was replaced by the remote copy.
    UpdatedFromRemote,
    /// The remote copy was replaced by the local replica.
    UploadedToRemote,
    /// The server moved past the upload's base; nothing was written.
    RejectedStale,
    /// The server could not be reached or answered with garbage.
    FailedConnection,
    /// The credential was missing, unknown, or lacked tag permission.
    FailedAuth,
    /// Pack, unpack or the local store failed; the prior replica is intact.
    FailedLocal,
    /// Neither side knows the id.
    NotFound,
    /// The record was deleted.
    Deleted,
}

impl SyncOutcome {
    /// Returns true for outcomes after which both sides agree.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Unchanged
                | SyncOutcome::UpdatedFromRemote
                | SyncOutcome::UploadedToRemote
                | SyncOutcome::Deleted
        )
    }

    /// Returns true if an archive crossed the network.
    pub fn transferred(&self) -> bool {
        matches!(
            self,
            SyncOutcome::UpdatedFromRemote | SyncOutcome::UploadedToRemote
        )
    }

    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::UpdatedFromRemote => "updated-from-remote",
            SyncOutcome::UploadedToRemote => "uploaded-to-remote",
            SyncOutcome::RejectedStale => "rejected-stale",
            SyncOutcome::FailedConnection => "failed-connection",
            SyncOutcome::FailedAuth => "failed-auth",
            SyncOutcome::FailedLocal => "failed-local",
            SyncOutcome::NotFound => "not-found",
            SyncOutcome::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a local replica compares with the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Equal modification times.
    Same,
    /// Local is newer.
    Ahead,
    /// Remote is newer.
    Behind,
    /// Only the remote has the record.
    NoLocal,
    /// Only the local store has the record.
    NoRemote,
}

impl Freshness {
    /// Compares two modification timestamps.
    pub fn compare(local: f64, remote: f64) -> Self {
        if local > remote {
            Freshness::Ahead
        } else if local < remote {
            Freshness::Behind
        } else {
            Freshness::Same
        }
    }

    /// The replica state this comparison puts the document in.
    pub fn replica_state(&self) -> ReplicaState {
        match self {
            Freshness::Same => ReplicaState::LocalCurrent,
            Freshness::Ahead | Freshness::NoRemote => ReplicaState::LocalAhead,
            Freshness::Behind => ReplicaState::LocalBehind,
            Freshness::NoLocal => ReplicaState::NoLocal,
        }
    }
}

/// Per-document state from the requesting node's point of view.
///
/// ```text
/// NoLocal --download--> LocalCurrent --edit--> LocalAhead --upload--> LocalCurrent
/// any --remote edit--> LocalBehind --download--> LocalCurrent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    /// No local replica.
    NoLocal,
    /// Local and remote agree.
    LocalCurrent,
    /// Local has edits the remote lacks.
    LocalAhead,
    /// Remote has edits the local replica lacks.
    LocalBehind,
}

impl ReplicaState {
    /// The transfer that brings this state back to `LocalCurrent`.
    pub fn pending_transfer(&self) -> Option<SyncOutcome> {
        match self {
            ReplicaState::NoLocal | ReplicaState::LocalBehind => Some(SyncOutcome::UpdatedFromRemote),
            ReplicaState::LocalAhead => Some(SyncOutcome::UploadedToRemote),
            ReplicaState::LocalCurrent => None,
        }
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Syncs that found nothing to do.
    pub unchanged: u64,
    /// Downloads.
    pub downloaded: u64,
    /// Uploads.
    pub uploaded: u64,
    /// Uploads rejected as stale.
    pub rejected_stale: u64,
    /// Connection failures.
    pub failed_connection: u64,
    /// Authentication failures.
    pub failed_auth: u64,
    /// Local failures.
    pub failed_local: u64,
    /// Ids unknown on both sides.
    pub not_found: u64,
    /// Deletions.
    pub deleted: u64,
    /// Last operation time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl SyncStats {
    /// Counts one outcome.
    pub fn record(&mut self, outcome: SyncOutcome) {
        let counter = match outcome {
            SyncOutcome::Unchanged => &mut self.unchanged,
            SyncOutcome::UpdatedFromRemote => &mut self.downloaded,
            SyncOutcome::UploadedToRemote => &mut self.uploaded,
            SyncOutcome::RejectedStale => &mut self.rejected_stale,
            SyncOutcome::FailedConnection => &mut self.failed_connection,
            SyncOutcome::FailedAuth => &mut self.failed_auth,
            SyncOutcome::FailedLocal => &mut self.failed_local,
            SyncOutcome::NotFound => &mut self.not_found,
            SyncOutcome::Deleted => &mut self.deleted,
        };
        *counter += 1;
        self.last_sync_time = Some(Instant::now());
    }

    /// Total operations counted.
    pub fn total(&self) -> u64 {
        self.unchanged
            + self.downloaded
            + self.uploaded
            + self.rejected_stale
            + self.failed_connection
            + self.failed_auth
            + self.failed_local
            + self.not_found
            + self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_names() {
        assert_eq!(SyncOutcome::UpdatedFromRemote.to_string(), "updated-from-remote");
        assert_eq!(SyncOutcome::RejectedStale.as_str(), "rejected-stale");
        assert!(SyncOutcome::Unchanged.is_success());
        assert!(!SyncOutcome::FailedAuth.is_success());
        assert!(!SyncOutcome::Unchanged.transferred());
    }

    #[test]
    fn freshness_comparison() {
        assert_eq!(Freshness::compare(2.0, 1.0), Freshness::Ahead);
        assert_eq!(Freshness::compare(1.0, 2.0), Freshness::Behind);
        assert_eq!(Freshness::compare(1.5, 1.5), Freshness::Same);
    }

    #[test]
    fn state_transitions() {
        assert_eq!(Freshness::NoLocal.replica_state(), ReplicaState::NoLocal);
        assert_eq!(Freshness::NoRemote.replica_state(), ReplicaState::LocalAhead);
        assert_eq!(
            ReplicaState::LocalBehind.pending_transfer(),
            Some(SyncOutcome::UpdatedFromRemote)
        );
        assert_eq!(ReplicaState::LocalCurrent.pending_transfer(), None);
    }

    #[test]
    fn stats_count_outcomes() {
        let mut stats = SyncStats::default();
        stats.record(SyncOutcome::Unchanged);
        stats.record(SyncOutcome::Unchanged);
        stats.record(SyncOutcome::RejectedStale);

        assert_eq!(stats.unchanged, 2);
        assert_eq!(stats.rejected_stale, 1);
        assert_eq!(stats.total(), 3);
        assert!(stats.last_sync_time.is_some());
    }
}
