//! Error types for the sync server.

use bibvault_archive::ArchiveError;
use bibvault_store::StoreError;
use bibvault_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Credential hash missing or not registered.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The key is valid but its tag permission does not cover the record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The referenced record or route does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upload was based on an outdated view of the stored record.
    #[error("stale write: stored record modified at {stored}, upload based on {base:?}")]
    StaleWrite {
        /// Stored modification time.
        stored: f64,
        /// Modification time the uploader compared against.
        base: Option<f64>,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Archive failure while serving a download.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Malformed protocol fields.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Protocol(_) => 400,
            ServerError::Unauthorized(_) => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::NotFound(_) | ServerError::Store(StoreError::NotFound(_)) => 404,
            ServerError::StaleWrite { .. } => 409,
            _ => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(ServerError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(
            ServerError::Store(StoreError::NotFound(Uuid::nil())).status_code(),
            404
        );
        assert_eq!(
            ServerError::StaleWrite {
                stored: 2.0,
                base: Some(1.0)
            }
            .status_code(),
            409
        );
        assert_eq!(
            ServerError::Protocol(ProtocolError::MissingField("uuid")).status_code(),
            400
        );
        assert_eq!(ServerError::Internal("oops".into()).status_code(), 500);
    }

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }
}
