//! SQLite record backend for persistent storage.

use crate::backend::RecordBackend;
use crate::error::{StoreError, StoreResult};
use crate::record::DocumentRecord;
use crate::tags::TagSet;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "uuid, bibtex, abstract, comments, tags, doc_ext, time_import, time_modify, url";

/// A SQLite-backed record table.
///
/// One row per document in table `files`. Tags are stored as a JSON array.
/// The connection is guarded by a mutex; callers may share the backend
/// across threads.
///
/// # Example
///
/// ```no_run
/// use bibvault_store::{DocumentRecord, RecordBackend, SqliteBackend};
/// use std::path::Path;
///
/// let backend = SqliteBackend::open(Path::new("bibvault.db")).unwrap();
/// backend.put(&DocumentRecord::new("@misc{x}")).unwrap();
/// ```
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Opens or creates a database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                 uuid        TEXT PRIMARY KEY,
                 bibtex      TEXT NOT NULL,
                 abstract    TEXT NOT NULL DEFAULT '',
                 comments    TEXT NOT NULL DEFAULT '',
                 tags        TEXT NOT NULL DEFAULT '[]',
                 doc_ext     TEXT NOT NULL DEFAULT '',
                 time_import REAL NOT NULL,
                 time_modify REAL NOT NULL,
                 url         TEXT NOT NULL DEFAULT ''
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            uuid: row.get(0)?,
            tags: row.get(4)?,
            record: DocumentRecord {
                id: Uuid::nil(),
                bibtex: row.get(1)?,
                abstract_text: row.get(2)?,
                comments: row.get(3)?,
                tags: TagSet::new(),
                doc_extension: row.get(5)?,
                time_imported: row.get(6)?,
                time_modified: row.get(7)?,
                url: row.get(8)?,
            },
        })
    }
}

/// A row as read from SQLite, before the text columns are decoded.
struct RawRow {
    uuid: String,
    tags: String,
    record: DocumentRecord,
}

impl RawRow {
    fn decode(self) -> StoreResult<DocumentRecord> {
        let mut record = self.record;
        record.id = Uuid::parse_str(&self.uuid)
            .map_err(|e| StoreError::Corrupted(format!("bad uuid {:?}: {e}", self.uuid)))?;
        record.tags = serde_json::from_str(&self.tags)
            .map_err(|e| StoreError::Corrupted(format!("bad tags for {}: {e}", self.uuid)))?;
        Ok(record)
    }
}

impl RecordBackend for SqliteBackend {
    fn get(&self, id: &Uuid) -> StoreResult<Option<DocumentRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM files WHERE uuid = ?1"),
                params![id.to_string()],
                Self::read_row,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    fn put(&self, record: &DocumentRecord) -> StoreResult<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO files (uuid, bibtex, abstract, comments, tags, doc_ext, time_import, time_modify, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(uuid) DO UPDATE SET
                 bibtex = excluded.bibtex,
                 abstract = excluded.abstract,
                 comments = excluded.comments,
                 tags = excluded.tags,
                 doc_ext = excluded.doc_ext,
                 time_import = excluded.time_import,
                 time_modify = excluded.time_modify,
                 url = excluded.url",
            params![
                record.id.to_string(),
                record.bibtex,
                record.abstract_text,
                record.comments,
                tags,
                record.doc_extension,
                record.time_imported,
                record.time_modified,
                record.url,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Uuid) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM files WHERE uuid = ?1", params![id.to_string()])?;
        Ok(removed > 0)
    }

    fn list_ids(&self) -> StoreResult<BTreeSet<Uuid>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT uuid FROM files")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = BTreeSet::new();
        for raw in rows {
            let raw = raw?;
            let id = Uuid::parse_str(&raw)
                .map_err(|e| StoreError::Corrupted(format!("bad uuid {raw:?}: {e}")))?;
            ids.insert(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> DocumentRecord {
        let mut record = DocumentRecord::new("@article{k, title={T}}");
        record.abstract_text = "abs".into();
        record.comments = "notes".into();
        record.tags = ["physics->optics", "todo"].into_iter().collect();
        record.url = "https://example.org/paper".into();
        record
    }

    #[test]
    fn put_get_preserves_all_fields() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let record = sample();
        backend.put(&record).unwrap();
        assert_eq!(backend.get(&record.id).unwrap(), Some(record));
    }

    #[test]
    fn upsert_replaces_row() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let mut record = sample();
        backend.put(&record).unwrap();
        record.comments = "changed".into();
        backend.put(&record).unwrap();
        assert_eq!(backend.list_ids().unwrap().len(), 1);
        assert_eq!(backend.get(&record.id).unwrap().unwrap().comments, "changed");
    }

    #[test]
    fn delete_reports_presence() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let record = sample();
        backend.put(&record).unwrap();
        assert!(backend.delete(&record.id).unwrap());
        assert!(!backend.delete(&record.id).unwrap());
        assert!(backend.get(&record.id).unwrap().is_none());
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bibvault.db");
        let record = sample();
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.put(&record).unwrap();
        }
        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.get(&record.id).unwrap(), Some(record));
    }
}
