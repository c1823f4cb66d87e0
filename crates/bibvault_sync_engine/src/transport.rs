//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use bibvault_store::TagSet;
use bibvault_sync_protocol::{
    CredentialHash, FieldUpdate, Permission, RecordSummary, UploadRequest,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

/// A remote transport carries the per-record operations to a sync server.
///
/// Implementations map "the server does not know this id" onto `None` or
/// `false` rather than an error, and every other refusal onto a
/// [`SyncError`]: `Unauthorized`, `Forbidden`, `StaleWrite`, or a transport
/// failure.
pub trait RemoteTransport: Send + Sync {
    /// Checks the credential and returns its permission.
    fn authenticate(&self, key: &CredentialHash) -> SyncResult<Permission>;

    /// Fetches the lightweight summary of one record.
    fn fetch_summary(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<RecordSummary>>;

    /// Lists summaries of records carrying every tag in `tags`.
    fn list(&self, key: &CredentialHash, tags: &TagSet) -> SyncResult<Vec<RecordSummary>>;

    /// Downloads the packed replica of one record.
    fn download(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<Vec<u8>>>;

    /// Uploads a packed replica.
    fn upload(&self, key: &CredentialHash, upload: UploadRequest) -> SyncResult<()>;

    /// Deletes a record. Returns false if the server did not know it.
    fn delete(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<bool>;

    /// Fetches a record's notes.
    fn fetch_notes(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<Option<String>>;

    /// Replaces one field of a remote record.
    fn update_field(&self, key: &CredentialHash, update: FieldUpdate) -> SyncResult<()>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// A mock transport for testing.
///
/// Serves canned summaries and archives from memory and records every
/// upload. Archives must be set explicitly; an accepted upload replaces the
/// stored archive but not the summary.
pub struct MockTransport {
    connected: AtomicBool,
    permission: Mutex<Option<Permission>>,
    summaries: Mutex<HashMap<Uuid, RecordSummary>>,
    archives: Mutex<HashMap<Uuid, Vec<u8>>>,
    notes: Mutex<HashMap<Uuid, String>>,
    uploads: Mutex<Vec<UploadRequest>>,
    reject_uploads: AtomicBool,
    downloads: AtomicUsize,
}

impl MockTransport {
    /// Creates a connected mock that accepts any credential as admin.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            permission: Mutex::new(Some(Permission::admin())),
            summaries: Mutex::new(HashMap::new()),
            archives: Mutex::new(HashMap::new()),
            notes: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            reject_uploads: AtomicBool::new(false),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Sets the permission returned for every key; `None` rejects all keys.
    pub fn set_permission(&self, permission: Option<Permission>) {
        *self.permission.lock() = permission;
    }

    /// Sets the summary served for its id.
    pub fn set_summary(&self, summary: RecordSummary) {
        self.summaries.lock().insert(summary.uuid, summary);
    }

    /// Sets the archive served for `id`.
    pub fn set_archive(&self, id: Uuid, archive: Vec<u8>) {
        self.archives.lock().insert(id, archive);
    }

    /// Sets the notes served for `id`.
    pub fn set_notes(&self, id: Uuid, notes: impl Into<String>) {
        self.notes.lock().insert(id, notes.into());
    }

    /// Makes every upload fail as stale.
    pub fn set_reject_uploads(&self, reject: bool) {
        self.reject_uploads.store(reject, Ordering::SeqCst);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Uploads accepted so far.
    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().clone()
    }

    /// Number of archive downloads served.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn gate(&self) -> SyncResult<Permission> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.permission
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Unauthorized("mock rejects every key".into()))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransport for MockTransport {
    fn authenticate(&self, _key: &CredentialHash) -> SyncResult<Permission> {
        self.gate()
    }

    fn fetch_summary(&self, _key: &CredentialHash, id: &Uuid) -> SyncResult<Option<RecordSummary>> {
        self.gate()?;
        Ok(self.summaries.lock().get(id).cloned())
    }

    fn list(&self, _key: &CredentialHash, tags: &TagSet) -> SyncResult<Vec<RecordSummary>> {
        self.gate()?;
        let mut out: Vec<_> = self
            .summaries
            .lock()
            .values()
            .filter(|s| s.tags.contains_all(tags))
            .cloned()
            .collect();
        out.sort_by_key(|s| s.uuid);
        Ok(out)
    }

    fn download(&self, _key: &CredentialHash, id: &Uuid) -> SyncResult<Option<Vec<u8>>> {
        self.gate()?;
        let archive = self.archives.lock().get(id).cloned();
        if archive.is_some() {
            self.downloads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(archive)
    }

    fn upload(&self, _key: &CredentialHash, upload: UploadRequest) -> SyncResult<()> {
        self.gate()?;
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::StaleWrite(format!("mock rejects {}", upload.uuid)));
        }
        self.archives
            .lock()
            .insert(upload.uuid, upload.archive.clone());
        self.uploads.lock().push(upload);
        Ok(())
    }

    fn delete(&self, _key: &CredentialHash, id: &Uuid) -> SyncResult<bool> {
        self.gate()?;
        let had_summary = self.summaries.lock().remove(id).is_some();
        let had_archive = self.archives.lock().remove(id).is_some();
        Ok(had_summary || had_archive)
    }

    fn fetch_notes(&self, _key: &CredentialHash, id: &Uuid) -> SyncResult<Option<String>> {
        self.gate()?;
        Ok(self.notes.lock().get(id).cloned())
    }

    fn update_field(&self, _key: &CredentialHash, update: FieldUpdate) -> SyncResult<()> {
        self.gate()?;
        if self.summaries.lock().contains_key(&update.uuid) {
            Ok(())
        } else {
            Err(SyncError::NotFound(update.uuid))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibvault_store::DocumentRecord;

    fn key() -> CredentialHash {
        CredentialHash::from_secret("k")
    }

    fn summary(tags: &[&str]) -> RecordSummary {
        let mut record = DocumentRecord::new("@misc{m}");
        record.tags = tags.iter().collect();
        RecordSummary::from_record(&record, 0.0)
    }

    #[test]
    fn mock_transport_connection() {
        let transport = MockTransport::new();
        assert!(transport.is_connected());

        transport.set_connected(false);
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.authenticate(&key()),
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn mock_transport_rejects_keys() {
        let transport = MockTransport::new();
        transport.set_permission(None);
        assert!(matches!(
            transport.fetch_summary(&key(), &Uuid::new_v4()),
            Err(SyncError::Unauthorized(_))
        ));
    }

    #[test]
    fn mock_transport_lists_by_tag() {
        let transport = MockTransport::new();
        transport.set_summary(summary(&["a"]));
        transport.set_summary(summary(&["a", "b"]));

        let filter: TagSet = ["b"].iter().collect();
        assert_eq!(transport.list(&key(), &filter).unwrap().len(), 1);
        assert_eq!(transport.list(&key(), &TagSet::new()).unwrap().len(), 2);
    }

    #[test]
    fn mock_transport_records_uploads() {
        let transport = MockTransport::new();
        let id = Uuid::new_v4();
        transport
            .upload(&key(), UploadRequest::new(id, None, vec![1, 2, 3]))
            .unwrap();
        assert_eq!(transport.uploads().len(), 1);
        assert_eq!(transport.download(&key(), &id).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(transport.downloads(), 1);

        transport.set_reject_uploads(true);
        assert!(matches!(
            transport.upload(&key(), UploadRequest::new(id, Some(1.0), vec![])),
            Err(SyncError::StaleWrite(_))
        ));
    }
}
