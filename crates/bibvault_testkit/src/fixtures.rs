//! Test fixtures and library helpers.
//!
//! Provides convenience functions for setting up temporary record stores
//! and sample documents.

use bibvault_store::{DocumentRecord, Store, TagSet, RECORD_FILE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Bytes of a minimal PDF used as a sample attachment.
pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

/// A temporary library with automatic cleanup.
pub struct TestLibrary {
    /// The store instance.
    pub store: Arc<Store>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestLibrary {
    /// Creates a library whose records live in memory and whose document
    /// directories live in a temporary directory.
    pub fn memory() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open_in_memory(temp_dir.path().join("library"))
            .expect("Failed to open in-memory store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    /// Creates a library backed by SQLite in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open(temp_dir.path().join("library")).expect("Failed to open store");
        Self {
            store: Arc::new(store),
            temp_dir,
        }
    }

    /// Scratch directory outside the store root.
    pub fn scratch(&self) -> PathBuf {
        let dir = self.temp_dir.path().join("scratch");
        std::fs::create_dir_all(&dir).expect("Failed to create scratch directory");
        dir
    }

    /// Imports a record with an attached file named `document.<ext>`.
    pub fn add_document(&self, bibtex: &str, ext: &str, contents: &[u8]) -> Uuid {
        let source = self.scratch().join(format!("{}.{ext}", Uuid::new_v4()));
        std::fs::write(&source, contents).expect("Failed to write sample document");
        self.store
            .create(bibtex, Some(source.as_path()))
            .expect("Failed to create record")
    }

    /// Imports a record with the sample PDF attached.
    pub fn add_pdf(&self, bibtex: &str) -> Uuid {
        self.add_document(bibtex, "pdf", SAMPLE_PDF)
    }
}

impl std::ops::Deref for TestLibrary {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory library.
pub fn with_temp_library<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let library = TestLibrary::memory();
    f(&library.store)
}

/// Runs a test with a temporary SQLite-backed library.
pub fn with_file_library<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let library = TestLibrary::file();
    let root = library.store.root().to_path_buf();
    f(&library.store, &root)
}

/// Writes a sample PDF named `name` into `dir` and returns its path.
pub fn sample_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, SAMPLE_PDF).expect("Failed to write sample PDF");
    path
}

/// Creates a record and pins both of its timestamps to `time`.
pub fn record_at(store: &Store, bibtex: &str, time: f64) -> Uuid {
    let id = store.create(bibtex, None).expect("Failed to create record");
    set_modified(store, &id, time);
    id
}

/// Overwrites the modification time of `id` without touching anything else.
///
/// `Store::put` never lets a timestamp go backwards, so the record is
/// rewritten through its sidecar and re-imported instead.
pub fn set_modified(store: &Store, id: &Uuid, time: f64) -> DocumentRecord {
    let mut record = store
        .get(id)
        .expect("Failed to read record")
        .expect("Record does not exist");
    record.time_imported = record.time_imported.min(time);
    record.time_modified = time;
    let dir = store.doc_dir(id);
    let sidecar = serde_json::to_vec_pretty(&record).expect("Failed to encode record");
    std::fs::write(dir.join(RECORD_FILE), sidecar).expect("Failed to write sidecar");
    store.import_replica(&dir).expect("Failed to import record")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a library with `count` records, every third one with an
    /// attached PDF.
    pub fn populated_library(count: usize) -> TestLibrary {
        let library = TestLibrary::memory();
        for i in 0..count {
            let bibtex = format!("@article{{paper{i},\n  title={{Paper {i}}}\n}}");
            if i % 3 == 0 {
                library.add_pdf(&bibtex);
            } else {
                library.store.create(&bibtex, None).expect("Failed to create record");
            }
        }
        library
    }

    /// Creates a library with `per_tag` records carrying each of `tags`.
    pub fn tagged_library(tags: &[&str], per_tag: usize) -> (TestLibrary, Vec<Uuid>) {
        let library = TestLibrary::memory();
        let mut ids = Vec::with_capacity(tags.len() * per_tag);
        for (t, tag) in tags.iter().enumerate() {
            for i in 0..per_tag {
                let id = library
                    .store
                    .create(&format!("@misc{{t{t}n{i}}}"), None)
                    .expect("Failed to create record");
                let tag_set: TagSet = [*tag].into_iter().collect();
                library
                    .store
                    .update_tags(&id, tag_set)
                    .expect("Failed to tag record");
                ids.push(id);
            }
        }
        (library, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_pdf() {
        let library = TestLibrary::memory();
        let id = library.add_pdf("@misc{sample}");
        let doc = library.doc_path(&id).unwrap().unwrap();
        assert_eq!(std::fs::read(doc).unwrap(), SAMPLE_PDF);
    }

    #[test]
    fn test_record_at_pins_time() {
        with_temp_library(|store| {
            let id = record_at(store, "@misc{old}", 100.0);
            let record = store.get(&id).unwrap().unwrap();
            assert_eq!(record.time_modified, 100.0);
            assert!(record.time_imported <= 100.0);
        });
    }

    #[test]
    fn test_set_modified_can_move_backwards() {
        with_temp_library(|store| {
            let id = store.create("@misc{edited}", None).unwrap();
            let edited = store.update_comments(&id, "kept").unwrap();

            let pinned = set_modified(store, &id, 150.0);
            assert_eq!(pinned.time_modified, 150.0);
            assert_eq!(pinned.comments, "kept");
            assert_eq!(store.get(&id).unwrap(), Some(pinned));
            assert!(edited.time_modified > 150.0);
        });
    }

    #[test]
    fn test_populated_scenario() {
        let library = scenarios::populated_library(7);
        assert_eq!(library.list_ids().unwrap().len(), 7);
        let with_files = library
            .list_ids()
            .unwrap()
            .iter()
            .filter(|id| library.get(id).unwrap().unwrap().has_file())
            .count();
        assert_eq!(with_files, 3);
    }

    #[test]
    fn test_file_library_persists() {
        with_file_library(|store, root| {
            store.create("@misc{disk}", None).unwrap();
            assert!(root.exists());
        });
    }
}
