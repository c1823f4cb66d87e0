//! # bibvault Sync Engine
//!
//! Per-document synchronization between a local record store and a
//! bibvault sync server.
//!
//! This crate provides:
//! - The sync state machine (`NoLocal`, `LocalCurrent`, `LocalAhead`,
//!   `LocalBehind`) and its outcomes
//! - Whole-record transfer as packed archives, staged before every swap
//! - The virtual file manipulator: one accessor over local and remote-only
//!   documents
//! - A bounded worker pool for batch sync with cooperative cancellation
//! - HTTP transport abstraction with reqwest and loopback clients
//!
//! ## Architecture
//!
//! For each id the engine compares the local `time_modified` with the
//! remote summary and performs at most one transfer. Uploads carry the
//! remote timestamp they were compared against; the server refuses them if
//! its copy moved in between.
//!
//! ## Remote-only documents
//!
//! A [`VirtualFileManipulator`] over a document with no local replica
//! answers reads from the cached remote summary. Writes through it fail
//! with [`SyncError::NotLocal`] rather than being silently dropped; call
//! [`VirtualFileManipulator::sync`] first, or check
//! [`VirtualFileManipulator::is_write_allowed`].
//!
//! ## Key Invariants
//!
//! - At most one in-flight sync per id within a process
//! - A failed download never touches the existing replica
//! - A rejected upload changes neither side
//! - Network and local failures become `SyncOutcome` values, never panics
//! - No automatic retries

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod engine;
mod error;
mod http;
mod outcome;
mod transport;
mod vfm;

pub use batch::{BatchHandle, BatchReport, BatchSync};
pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, ReqwestClient};
pub use outcome::{Freshness, ReplicaState, SyncOutcome, SyncStats};
pub use transport::{MockTransport, RemoteTransport};
pub use vfm::{Replica, VirtualFileManipulator};
