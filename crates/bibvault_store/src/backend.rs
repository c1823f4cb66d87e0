//! Record backend trait definition.

use crate::error::StoreResult;
use crate::record::DocumentRecord;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Key-value persistence of document records.
///
/// Backends only persist rows. They know nothing about document
/// directories or attached files; [`crate::Store`] owns those and enforces
/// the file invariants before a record reaches the backend.
///
/// # Invariants
///
/// - `put` replaces any existing record with the same id
/// - `get` returns exactly the record last `put` for that id
/// - `delete` returns `false` for unknown ids
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::SqliteBackend`] - For persistent storage
pub trait RecordBackend: Send + Sync {
    /// Returns the record stored under `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the row exists but cannot be decoded, or the
    /// underlying storage fails.
    fn get(&self, id: &Uuid) -> StoreResult<Option<DocumentRecord>>;

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn put(&self, record: &DocumentRecord) -> StoreResult<()>;

    /// Removes the record stored under `id`.
    ///
    /// Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn delete(&self, id: &Uuid) -> StoreResult<bool>;

    /// Returns the ids of every stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn list_ids(&self) -> StoreResult<BTreeSet<Uuid>>;
}
