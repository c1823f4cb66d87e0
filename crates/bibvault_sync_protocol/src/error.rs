//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required form field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A form field is present but malformed.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The `cmd` field names no known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A credential hash is not 64 lowercase hex digits.
    #[error("invalid credential hash")]
    InvalidCredential,

    /// A JSON payload could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid field error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
