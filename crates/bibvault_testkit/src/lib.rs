//! # bibvault Testkit
//!
//! Test utilities for bibvault.
//!
//! This crate provides:
//! - Temporary libraries and sample documents
//! - Property-based generators for records, tags and directory trees
//! - An in-process server with any number of clients over the loopback
//!   transport
//! - Concurrent sync stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bibvault_testkit::prelude::*;
//!
//! #[test]
//! fn document_reaches_server() {
//!     let world = SyncWorld::new();
//!     let alice = world.client("alice");
//!     let id = alice.store().create("@misc{x}", None).unwrap();
//!     assert_eq!(alice.sync(&id), SyncOutcome::UploadedToRemote);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::stress::*;
    pub use bibvault_sync_engine::{Freshness, SyncOutcome};
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use stress::*;
