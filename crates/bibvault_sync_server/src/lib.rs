//! # bibvault Sync Server
//!
//! Reference HTTP sync server for bibvault.
//!
//! This crate provides:
//! - The authentication gate: a flat credential file of SHA-256 hashes
//!   with optional tag restrictions
//! - Archive download, upload and delete with server-side staleness
//!   checks
//! - Summary listing, single-record info, notes and field edits
//! - An axum router and `serve` entry point
//!
//! # Architecture
//!
//! The server uses the same record store as clients. Request handling is
//! synchronous and transport-neutral; the HTTP layer only translates
//! forms and multipart bodies into [`bibvault_sync_protocol::Request`]s
//! and runs the handler on the blocking pool.
//!
//! # Staleness
//!
//! Uploads carry `base_time_modified`, the remote timestamp the client
//! compared against. When the server already holds the record, the upload
//! is rejected with 409 unless the base is present, the stored timestamp
//! has not moved past it, and the upload is strictly newer than the
//! stored copy. The check and the swap run under one lock.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod http;
mod server;

pub use auth::{AuthGate, KeyStore};
pub use config::{ServerConfig, DEFAULT_KEY_FILE};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use http::{router, serve};
pub use server::SyncServer;
