//! # bibvault Sync Protocol
//!
//! Wire surface shared by the bibvault sync client and server.
//!
//! This crate provides:
//! - Endpoint paths, form field names and commands
//! - `CredentialHash` and `Permission` for the authentication gate
//! - Transport-neutral `Request`/`Response` plus typed upload and
//!   field-edit messages
//! - `RecordSummary`, the lightweight per-record metadata payload
//! - The `LoopbackServer` seam for in-process dispatch
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod credential;
mod endpoint;
mod error;
mod loopback;
mod message;

pub use bibvault_store::RecordSummary;
pub use credential::{CredentialHash, Permission};
pub use endpoint::{field, path, FieldCommand, FileCommand};
pub use error::{ProtocolError, ProtocolResult};
pub use loopback::LoopbackServer;
pub use message::{
    decode_tags, encode_tags, parse_path_uuid, FieldUpdate, FileListResponse, Method, Request,
    Response, UploadRequest,
};
