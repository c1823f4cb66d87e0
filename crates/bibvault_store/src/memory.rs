//! In-memory record backend for testing.

use crate::backend::RecordBackend;
use crate::error::StoreResult;
use crate::record::DocumentRecord;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// An in-memory record backend.
///
/// Rows are lost when the backend is dropped. Suitable for unit tests and
/// ephemeral stores; document directories still live on disk under the
/// store root.
///
/// # Example
///
/// ```rust
/// use bibvault_store::{DocumentRecord, InMemoryBackend, RecordBackend};
///
/// let backend = InMemoryBackend::new();
/// let record = DocumentRecord::new("@misc{x}");
/// backend.put(&record).unwrap();
/// assert_eq!(backend.get(&record.id).unwrap(), Some(record));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    rows: RwLock<HashMap<Uuid, DocumentRecord>>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl RecordBackend for InMemoryBackend {
    fn get(&self, id: &Uuid) -> StoreResult<Option<DocumentRecord>> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn put(&self, record: &DocumentRecord) -> StoreResult<()> {
        self.rows.write().insert(record.id, record.clone());
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        Ok(self.rows.write().remove(id).is_some())
    }

    fn list_ids(&self) -> StoreResult<BTreeSet<Uuid>> {
        Ok(self.rows.read().keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_replaces_existing() {
        let backend = InMemoryBackend::new();
        let mut record = DocumentRecord::new("@misc{a}");
        backend.put(&record).unwrap();
        record.bibtex = "@misc{b}".into();
        backend.put(&record).unwrap();
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get(&record.id).unwrap().unwrap().bibtex, "@misc{b}");
    }

    #[test]
    fn delete_unknown_returns_false() {
        let backend = InMemoryBackend::new();
        assert!(!backend.delete(&Uuid::new_v4()).unwrap());
    }

    #[test]
    fn list_ids_is_sorted() {
        let backend = InMemoryBackend::new();
        for _ in 0..5 {
            backend.put(&DocumentRecord::new("@misc{x}")).unwrap();
        }
        let ids: Vec<_> = backend.list_ids().unwrap().into_iter().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 5);
    }
}
