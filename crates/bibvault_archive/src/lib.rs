//! # bibvault Archive
//!
//! Whole-document transfer format for bibvault.
//!
//! A document directory is packed into a single ZIP archive with DEFLATE
//! compression. Entry names are paths relative to the packed root, with
//! `/` separators and no leading separator. An empty directory or an
//! empty selection packs into a valid, empty archive.
//!
//! Unpacking overwrites files at matching relative paths. Callers that
//! replace a live replica unpack into a fresh staging directory and swap
//! it in afterwards.
//!
//! ## Example
//!
//! ```rust
//! use bibvault_archive::{pack, unpack};
//!
//! let src = tempfile::tempdir().unwrap();
//! std::fs::write(src.path().join("document.pdf"), b"%PDF").unwrap();
//!
//! let out = tempfile::tempdir().unwrap();
//! let archive = pack(src.path(), &out.path().join("doc.zip")).unwrap();
//! let dest = unpack(&archive, &out.path().join("restored")).unwrap();
//! assert_eq!(std::fs::read(dest.join("document.pdf")).unwrap(), b"%PDF");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod pack;
mod unpack;

pub use error::{ArchiveError, ArchiveResult};
pub use pack::{pack, pack_selected, pack_to_vec};
pub use unpack::{unpack, unpack_bytes};
