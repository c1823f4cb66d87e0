//! # bibvault Store
//!
//! Document record store for bibvault.
//!
//! A store owns one node's view of the library: a table of
//! [`DocumentRecord`]s keyed by UUID plus one directory per document on
//! disk holding the attached file and the auxiliary `misc/` folder.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//! ├─ bibvault.db             # SQLite record table
//! └─ <uuid>/
//!    ├─ record.json          # metadata sidecar, travels with the archive
//!    ├─ document.pdf         # primary file (optional)
//!    └─ misc/                # auxiliary attachments
//! ```
//!
//! ## Backends
//!
//! - [`SqliteBackend`] - Persistent record table
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//!
//! ## Example
//!
//! ```rust
//! use bibvault_store::Store;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = Store::open_in_memory(dir.path()).unwrap();
//! let id = store.create("@article{a, title={A}}", None).unwrap();
//! assert!(store.has_replica(&id).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod record;
mod sqlite;
mod store;
mod summary;
mod tags;

pub use backend::RecordBackend;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use record::{next_modified, now_stamp, DocumentRecord};
pub use sqlite::SqliteBackend;
pub use store::{Store, DB_FILE, DOCUMENT_STEM, MISC_DIR, RECORD_FILE, STAGING_DIR};
pub use summary::RecordSummary;
pub use tags::{TagSet, TAG_SEPARATOR};
