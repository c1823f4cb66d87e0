//! The store façade: record rows plus per-document directories.

use crate::backend::RecordBackend;
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryBackend;
use crate::record::DocumentRecord;
use crate::sqlite::SqliteBackend;
use crate::summary::RecordSummary;
use crate::tags::TagSet;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File name of the SQLite database under the store root.
pub const DB_FILE: &str = "bibvault.db";

/// File name of the metadata sidecar inside a document directory.
pub const RECORD_FILE: &str = "record.json";

/// Stem of the primary document file (`document.pdf`).
pub const DOCUMENT_STEM: &str = "document";

/// Auxiliary attachment folder inside a document directory.
pub const MISC_DIR: &str = "misc";

/// Default staging directory under the store root.
pub const STAGING_DIR: &str = ".staging";

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// One node's record store.
///
/// Rows live in a [`RecordBackend`]; every record also owns the directory
/// `<root>/<uuid>/`. A store-wide reader/writer lock keeps rows and
/// directories consistent: writers are exclusive, readers never observe a
/// half-applied write.
pub struct Store {
    root: PathBuf,
    backend: Box<dyn RecordBackend>,
    lock: RwLock<()>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Opens a persistent store rooted at `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the database
    /// cannot be opened.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let backend = SqliteBackend::open(&root.join(DB_FILE))?;
        info!("Opened store at {:?}", root);
        Ok(Self::with_backend(root, Box::new(backend)))
    }

    /// Opens a store whose rows are kept in memory. Document directories
    /// are still written under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created.
    pub fn open_in_memory(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self::with_backend(root, Box::new(InMemoryBackend::new())))
    }

    /// Creates a store over an existing backend.
    #[must_use]
    pub fn with_backend(root: impl Into<PathBuf>, backend: Box<dyn RecordBackend>) -> Self {
        Self {
            root: root.into(),
            backend,
            lock: RwLock::new(()),
        }
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by the record `id`.
    #[must_use]
    pub fn doc_dir(&self, id: &Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Default staging directory for archive transfers.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Returns the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn get(&self, id: &Uuid) -> StoreResult<Option<DocumentRecord>> {
        let _guard = self.lock.read();
        self.backend.get(id)
    }

    /// Returns true if a row exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn contains(&self, id: &Uuid) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Returns true if a complete local replica exists: a row and its
    /// document directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn has_replica(&self, id: &Uuid) -> StoreResult<bool> {
        let _guard = self.lock.read();
        Ok(self.backend.get(id)?.is_some() && self.doc_dir(id).is_dir())
    }

    /// Ids of every stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn list_ids(&self) -> StoreResult<BTreeSet<Uuid>> {
        let _guard = self.lock.read();
        self.backend.list_ids()
    }

    /// Inserts or replaces a record and rewrites its sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ContractViolation`] if the record declares an
    /// extension whose `document<ext>` file does not exist, has an empty
    /// citation or a malformed extension, or carries a `time_modified`
    /// older than the stored one.
    pub fn put(&self, record: &DocumentRecord) -> StoreResult<()> {
        let _guard = self.lock.write();
        self.put_locked(record)
    }

    /// Deletes a record together with its document directory.
    ///
    /// Returns `false` (and logs) for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend or filesystem fails.
    pub fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let _guard = self.lock.write();
        let removed = self.backend.delete(id)?;
        let dir = self.doc_dir(id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        if removed {
            info!(%id, "Deleted record");
        } else {
            warn!(%id, "Delete of unknown record");
        }
        Ok(removed)
    }

    /// Imports a new record, optionally attaching a copy of `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the citation is empty, the source has no
    /// extension or cannot be copied.
    pub fn create(&self, bibtex: &str, source: Option<&Path>) -> StoreResult<Uuid> {
        let mut record = DocumentRecord::new(bibtex);
        let _guard = self.lock.write();
        let dir = self.doc_dir(&record.id);
        fs::create_dir_all(dir.join(MISC_DIR))?;

        let result = (|| -> StoreResult<()> {
            if let Some(source) = source {
                let ext = extension_of(source)?;
                fs::copy(source, dir.join(document_file_name(&ext)))?;
                record.doc_extension = ext;
            }
            self.put_locked(&record)
        })();
        if let Err(err) = result {
            let _ = fs::remove_dir_all(&dir);
            return Err(err);
        }
        info!(id = %record.id, "Created record");
        Ok(record.id)
    }

    /// Replaces the citation text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn update_bibtex(&self, id: &Uuid, bibtex: &str) -> StoreResult<DocumentRecord> {
        self.modify(id, |record| record.bibtex = bibtex.to_string())
    }

    /// Replaces the abstract.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn update_abstract(&self, id: &Uuid, text: &str) -> StoreResult<DocumentRecord> {
        self.modify(id, |record| record.abstract_text = text.to_string())
    }

    /// Replaces the notes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn update_comments(&self, id: &Uuid, text: &str) -> StoreResult<DocumentRecord> {
        self.modify(id, |record| record.comments = text.to_string())
    }

    /// Replaces the tag set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn update_tags(&self, id: &Uuid, tags: TagSet) -> StoreResult<DocumentRecord> {
        self.modify(id, |record| record.tags = tags)
    }

    /// Replaces the web link.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn update_url(&self, id: &Uuid, url: &str) -> StoreResult<DocumentRecord> {
        self.modify(id, |record| record.url = url.to_string())
    }

    /// Attaches a copy of `source` as the primary document.
    ///
    /// Returns `false` without changes if a file is already attached.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids or if the copy fails.
    pub fn add_file(&self, id: &Uuid, source: &Path) -> StoreResult<bool> {
        let _guard = self.lock.write();
        let mut record = self.backend.get(id)?.ok_or(StoreError::NotFound(*id))?;
        if record.has_file() {
            debug!(%id, "File already attached");
            return Ok(false);
        }
        let ext = extension_of(source)?;
        let dir = self.doc_dir(id);
        fs::create_dir_all(&dir)?;
        let target = dir.join(document_file_name(&ext));
        fs::copy(source, &target)?;
        record.doc_extension = ext;
        record.touch();
        if let Err(err) = self.put_locked(&record) {
            let _ = fs::remove_file(&target);
            return Err(err);
        }
        Ok(true)
    }

    /// Detaches and deletes the primary document.
    ///
    /// Returns `false` if nothing was attached.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids or if the file cannot be removed.
    pub fn remove_file(&self, id: &Uuid) -> StoreResult<bool> {
        let _guard = self.lock.write();
        let mut record = self.backend.get(id)?.ok_or(StoreError::NotFound(*id))?;
        if !record.has_file() {
            return Ok(false);
        }
        let path = self.doc_dir(id).join(document_file_name(&record.doc_extension));
        if path.exists() {
            fs::remove_file(&path)?;
        }
        record.doc_extension.clear();
        record.touch();
        self.put_locked(&record)?;
        Ok(true)
    }

    /// Path of the attached document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn doc_path(&self, id: &Uuid) -> StoreResult<Option<PathBuf>> {
        let record = self.get(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(record
            .has_file()
            .then(|| self.doc_dir(id).join(document_file_name(&record.doc_extension))))
    }

    /// Attached document size in MiB, rounded to two decimals. Zero when
    /// nothing is attached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn doc_size_mb(&self, id: &Uuid) -> StoreResult<f64> {
        let record = self.get(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(self.measure(&record))
    }

    /// Summary of one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn summary(&self, id: &Uuid) -> StoreResult<Option<RecordSummary>> {
        Ok(self
            .get(id)?
            .map(|record| RecordSummary::from_record(&record, self.measure(&record))))
    }

    /// Summaries of every record whose tags include all of `filter`.
    ///
    /// An empty filter selects everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn summaries(&self, filter: &TagSet) -> StoreResult<Vec<RecordSummary>> {
        let _guard = self.lock.read();
        let mut out = Vec::new();
        for id in self.backend.list_ids()? {
            if let Some(record) = self.backend.get(&id)? {
                if record.tags.contains_all(filter) {
                    out.push(RecordSummary::from_record(&record, self.measure(&record)));
                }
            }
        }
        Ok(out)
    }

    /// Runs `f` over the document directory of `id` while holding the read
    /// lock, so no writer can change the replica underneath.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no replica exists.
    pub fn with_replica<R>(&self, id: &Uuid, f: impl FnOnce(&Path) -> R) -> StoreResult<R> {
        let _guard = self.lock.read();
        let dir = self.doc_dir(id);
        if self.backend.get(id)?.is_none() || !dir.is_dir() {
            return Err(StoreError::NotFound(*id));
        }
        Ok(f(&dir))
    }

    /// Reads and validates the sidecar of an unpacked directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar is missing, undecodable, or
    /// inconsistent with the directory contents.
    pub fn read_staged_record(dir: &Path) -> StoreResult<DocumentRecord> {
        let raw = fs::read(dir.join(RECORD_FILE)).map_err(|err| {
            StoreError::contract(format!("missing {RECORD_FILE} in {}: {err}", dir.display()))
        })?;
        let record: DocumentRecord = serde_json::from_slice(&raw)?;
        validate(&record, dir)?;
        Ok(record)
    }

    /// Refreshes the row for a directory that already sits at its final
    /// location, using its sidecar.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` is not the record's document directory or
    /// the sidecar is invalid.
    pub fn import_replica(&self, dir: &Path) -> StoreResult<DocumentRecord> {
        let record = Self::read_staged_record(dir)?;
        if dir != self.doc_dir(&record.id) {
            return Err(StoreError::contract(format!(
                "{} is not the directory of {}",
                dir.display(),
                record.id
            )));
        }
        let _guard = self.lock.write();
        self.backend.put(&record)?;
        Ok(record)
    }

    /// Replaces the replica of `id` with a fully staged directory.
    ///
    /// The staged sidecar is validated first. The live directory is moved
    /// aside, the staged one renamed into place, and the row upserted; on
    /// any failure the previous directory is restored. Runs under the write
    /// lock. `staged` must be on the same filesystem as the store root.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ContractViolation`] if the staged sidecar is
    /// invalid or names another id, or an I/O error if the swap fails.
    pub fn adopt_replica(&self, id: &Uuid, staged: &Path) -> StoreResult<DocumentRecord> {
        let record = Self::read_staged_record(staged)?;
        if record.id != *id {
            return Err(StoreError::contract(format!(
                "staged replica is {} but {} was expected",
                record.id, id
            )));
        }

        let _guard = self.lock.write();
        let live = self.doc_dir(id);
        let aside = self.root.join(format!(".{id}.old"));
        if aside.exists() {
            fs::remove_dir_all(&aside)?;
        }
        let had_live = live.exists();
        if had_live {
            fs::rename(&live, &aside)?;
        }

        let swapped = fs::rename(staged, &live)
            .map_err(StoreError::from)
            .and_then(|()| {
                fs::create_dir_all(live.join(MISC_DIR))?;
                self.backend.put(&record)
            });
        if let Err(err) = swapped {
            warn!(%id, "Replica swap failed, restoring previous copy: {}", err);
            if live.exists() {
                let _ = fs::remove_dir_all(&live);
            }
            if had_live {
                fs::rename(&aside, &live)?;
            }
            return Err(err);
        }

        if had_live {
            if let Err(err) = fs::remove_dir_all(&aside) {
                warn!(%id, "Could not remove previous replica: {}", err);
            }
        }
        debug!(%id, time_modified = record.time_modified, "Adopted replica");
        Ok(record)
    }

    fn modify(
        &self,
        id: &Uuid,
        edit: impl FnOnce(&mut DocumentRecord),
    ) -> StoreResult<DocumentRecord> {
        let _guard = self.lock.write();
        let mut record = self.backend.get(id)?.ok_or(StoreError::NotFound(*id))?;
        edit(&mut record);
        record.touch();
        self.put_locked(&record)?;
        Ok(record)
    }

    fn put_locked(&self, record: &DocumentRecord) -> StoreResult<()> {
        let dir = self.doc_dir(&record.id);
        validate(record, &dir)?;
        if let Some(stored) = self.backend.get(&record.id)? {
            if record.time_modified < stored.time_modified {
                return Err(StoreError::contract(format!(
                    "{} would move time_modified back from {} to {}",
                    record.id, stored.time_modified, record.time_modified
                )));
            }
        }
        fs::create_dir_all(dir.join(MISC_DIR))?;
        write_sidecar(&dir, record)?;
        self.backend.put(record)?;
        debug!(id = %record.id, time_modified = record.time_modified, "Stored record");
        Ok(())
    }

    fn measure(&self, record: &DocumentRecord) -> f64 {
        if !record.has_file() {
            return 0.0;
        }
        let path = self
            .doc_dir(&record.id)
            .join(document_file_name(&record.doc_extension));
        let bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
    }
}

fn document_file_name(ext: &str) -> String {
    format!("{DOCUMENT_STEM}{ext}")
}

fn extension_of(source: &Path) -> StoreResult<String> {
    source
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .ok_or_else(|| {
            StoreError::contract(format!("{} has no file extension", source.display()))
        })
}

fn validate(record: &DocumentRecord, dir: &Path) -> StoreResult<()> {
    if record.bibtex.trim().is_empty() {
        return Err(StoreError::contract(format!("{} has an empty citation", record.id)));
    }
    let ext = &record.doc_extension;
    if ext.is_empty() {
        return Ok(());
    }
    let well_formed = ext.len() > 1
        && ext.starts_with('.')
        && !ext[1..].contains(['.', '/', '\\']);
    if !well_formed {
        return Err(StoreError::contract(format!("malformed extension {ext:?}")));
    }
    if !dir.join(document_file_name(ext)).is_file() {
        return Err(StoreError::contract(format!(
            "{} declares {ext} but has no document file",
            record.id
        )));
    }
    Ok(())
}

fn write_sidecar(dir: &Path, record: &DocumentRecord) -> StoreResult<()> {
    let tmp = dir.join(format!("{RECORD_FILE}.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
    fs::rename(&tmp, dir.join(RECORD_FILE))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn store() -> (TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open_in_memory(dir.path()).unwrap();
        (dir, store)
    }

    fn pdf(dir: &Path, contents: &[u8]) -> PathBuf {
        let path = dir.join("paper.PDF");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn create_copies_source_and_writes_sidecar() {
        let (dir, store) = store();
        let source = pdf(dir.path(), b"%PDF-1.4");
        let id = store.create("@article{a}", Some(source.as_path())).unwrap();

        let record = store.get(&id).unwrap().unwrap();
        assert_eq!(record.doc_extension, ".pdf");
        assert!(source.exists());
        assert_eq!(fs::read(store.doc_dir(&id).join("document.pdf")).unwrap(), b"%PDF-1.4");
        assert!(store.doc_dir(&id).join(MISC_DIR).is_dir());

        let sidecar = Store::read_staged_record(&store.doc_dir(&id)).unwrap();
        assert_eq!(sidecar, record);
    }

    #[test]
    fn create_rejects_empty_citation() {
        let (_dir, store) = store();
        let err = store.create("   ", None).unwrap_err();
        assert!(matches!(err, StoreError::ContractViolation(_)));
        assert!(store.list_ids().unwrap().is_empty());
    }

    #[test]
    fn put_with_extension_but_no_file_fails_fast() {
        let (_dir, store) = store();
        let mut record = DocumentRecord::new("@misc{x}");
        record.doc_extension = ".pdf".into();
        let err = store.put(&record).unwrap_err();
        assert!(matches!(err, StoreError::ContractViolation(_)));
        assert!(store.get(&record.id).unwrap().is_none());
    }

    #[test]
    fn put_refuses_older_timestamp() {
        let (_dir, store) = store();
        let id = store.create("@misc{x}", None).unwrap();
        let stored = store.get(&id).unwrap().unwrap();

        let mut older = stored.clone();
        older.comments = "rewritten".into();
        older.time_modified -= 1000.0;
        let err = store.put(&older).unwrap_err();
        assert!(matches!(err, StoreError::ContractViolation(_)));
        assert_eq!(store.get(&id).unwrap(), Some(stored.clone()));
        assert_eq!(Store::read_staged_record(&store.doc_dir(&id)).unwrap(), stored);

        let mut same = stored.clone();
        same.url = "https://example.org".into();
        store.put(&same).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(same));
    }

    #[test]
    fn field_writes_bump_timestamp() {
        let (_dir, store) = store();
        let id = store.create("@misc{x}", None).unwrap();
        let before = store.get(&id).unwrap().unwrap().time_modified;

        let after_bib = store.update_bibtex(&id, "@misc{y}").unwrap().time_modified;
        let after_tags = store
            .update_tags(&id, ["a->b"].into_iter().collect())
            .unwrap()
            .time_modified;
        let after_notes = store.update_comments(&id, "read me").unwrap().time_modified;

        assert!(after_bib > before);
        assert!(after_tags > after_bib);
        assert!(after_notes > after_tags);
    }

    #[test]
    fn update_unknown_is_not_found() {
        let (_dir, store) = store();
        let err = store.update_url(&Uuid::new_v4(), "x").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn add_and_remove_file() {
        let (dir, store) = store();
        let id = store.create("@misc{x}", None).unwrap();
        let source = pdf(dir.path(), &[0u8; 2048]);

        assert!(store.add_file(&id, &source).unwrap());
        assert!(!store.add_file(&id, &source).unwrap());
        assert!(store.doc_path(&id).unwrap().unwrap().exists());
        assert_eq!(store.doc_size_mb(&id).unwrap(), 0.0);

        assert!(store.remove_file(&id).unwrap());
        assert!(!store.remove_file(&id).unwrap());
        assert!(store.doc_path(&id).unwrap().is_none());
    }

    #[test]
    fn doc_size_is_rounded_mib() {
        let (dir, store) = store();
        let source = pdf(dir.path(), &vec![7u8; 3 * 1024 * 1024 / 2]);
        let id = store.create("@misc{x}", Some(source.as_path())).unwrap();
        assert_eq!(store.doc_size_mb(&id).unwrap(), 1.5);
    }

    #[test]
    fn delete_removes_directory_and_reports_unknown() {
        let (_dir, store) = store();
        let id = store.create("@misc{x}", None).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.doc_dir(&id).exists());
        assert!(!store.has_replica(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn summaries_filter_by_tag_superset() {
        let (_dir, store) = store();
        let a = store.create("@misc{a}", None).unwrap();
        let b = store.create("@misc{b}", None).unwrap();
        store.update_tags(&a, ["physics", "todo"].into_iter().collect()).unwrap();
        store.update_tags(&b, ["physics"].into_iter().collect()).unwrap();

        let filter: TagSet = ["physics", "todo"].into_iter().collect();
        let hits = store.summaries(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].uuid, a);
        assert_eq!(store.summaries(&TagSet::new()).unwrap().len(), 2);
    }

    #[test]
    fn adopt_replica_swaps_in_staged_copy() {
        let (_dir, store) = store();
        let id = store.create("@misc{old}", None).unwrap();
        fs::write(store.doc_dir(&id).join(MISC_DIR).join("stale.txt"), b"x").unwrap();

        let mut incoming = store.get(&id).unwrap().unwrap();
        incoming.bibtex = "@misc{new}".into();
        incoming.touch();
        let staged = store.staging_dir().join(id.to_string());
        fs::create_dir_all(staged.join(MISC_DIR)).unwrap();
        write_sidecar(&staged, &incoming).unwrap();

        let adopted = store.adopt_replica(&id, &staged).unwrap();
        assert_eq!(adopted, incoming);
        assert_eq!(store.get(&id).unwrap().unwrap().bibtex, "@misc{new}");
        assert!(!store.doc_dir(&id).join(MISC_DIR).join("stale.txt").exists());
        assert!(!staged.exists());
    }

    #[test]
    fn adopt_replica_rejects_invalid_stage_and_keeps_live_copy() {
        let (_dir, store) = store();
        let id = store.create("@misc{keep}", None).unwrap();
        let staged = store.staging_dir().join(id.to_string());
        fs::create_dir_all(&staged).unwrap();
        fs::write(staged.join(RECORD_FILE), b"not json").unwrap();

        assert!(store.adopt_replica(&id, &staged).is_err());
        assert_eq!(store.get(&id).unwrap().unwrap().bibtex, "@misc{keep}");
        assert!(store.has_replica(&id).unwrap());
    }

    #[test]
    fn adopt_replica_rejects_foreign_id() {
        let (_dir, store) = store();
        let other = DocumentRecord::new("@misc{other}");
        let staged = store.staging_dir().join("x");
        fs::create_dir_all(&staged).unwrap();
        write_sidecar(&staged, &other).unwrap();
        let err = store.adopt_replica(&Uuid::new_v4(), &staged).unwrap_err();
        assert!(matches!(err, StoreError::ContractViolation(_)));
    }

    #[test]
    fn import_replica_refreshes_row() {
        let (_dir, store) = store();
        let id = store.create("@misc{x}", None).unwrap();
        let mut record = store.get(&id).unwrap().unwrap();
        record.comments = "edited on disk".into();
        write_sidecar(&store.doc_dir(&id), &record).unwrap();

        store.import_replica(&store.doc_dir(&id)).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().comments, "edited on disk");
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = Store::open(dir.path()).unwrap();
            store.create("@misc{durable}", None).unwrap()
        };
        let store = Store::open(dir.path()).unwrap();
        assert!(store.has_replica(&id).unwrap());
        assert!(dir.path().join(DB_FILE).exists());
    }
}
