//! Error types for archive operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur while packing or unpacking an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The ZIP container is malformed.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive destination already exists as a directory.
    #[error("archive destination is a directory: {0}")]
    DestinationIsDirectory(PathBuf),

    /// The extraction destination already exists as a regular file.
    #[error("extraction destination is a file: {0}")]
    DestinationIsFile(PathBuf),

    /// An entry would be written outside the destination directory.
    #[error("unsafe archive entry: {0}")]
    UnsafeEntry(String),

    /// A selected entry does not exist under the packing root.
    #[error("selected entry does not exist: {0}")]
    MissingSelection(PathBuf),

    /// The packing source is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl ArchiveError {
    /// Returns true for errors caused by unexpected pre-existing files or
    /// hostile entry names, as opposed to plain I/O or format failures.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::DestinationIsDirectory(_) | Self::DestinationIsFile(_) | Self::UnsafeEntry(_)
        )
    }
}
