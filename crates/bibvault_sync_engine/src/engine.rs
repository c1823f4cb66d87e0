//! The per-document sync engine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::outcome::{Freshness, ReplicaState, SyncOutcome, SyncStats};
use crate::transport::RemoteTransport;
use crate::vfm::VirtualFileManipulator;
use bibvault_archive::{pack_to_vec, unpack_bytes};
use bibvault_store::{DocumentRecord, Store, TagSet};
use bibvault_sync_protocol::{CredentialHash, FieldUpdate, Permission, RecordSummary, UploadRequest};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reconciles local replicas with a remote server, one document at a time.
///
/// For each id the engine compares the local `time_modified` with the
/// remote summary and performs at most one archive transfer: a download
/// when the local side is missing or behind, an upload when it is ahead.
/// Uploads carry the remote timestamp they were compared against, so the
/// server can refuse them if the remote copy moved in between.
///
/// Syncs of the same id are serialized; different ids proceed in
/// parallel. The engine never retries.
pub struct SyncEngine<T: RemoteTransport> {
    config: SyncConfig,
    store: Arc<Store>,
    transport: Arc<T>,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    remote_cache: RwLock<HashMap<Uuid, RecordSummary>>,
    stats: RwLock<SyncStats>,
}

impl<T: RemoteTransport> SyncEngine<T> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, store: Arc<Store>, transport: T) -> Self {
        Self {
            config,
            store,
            transport: Arc::new(transport),
            locks: Mutex::new(HashMap::new()),
            remote_cache: RwLock::new(HashMap::new()),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true when no remote is configured.
    pub fn is_offline(&self) -> bool {
        self.config.is_offline()
    }

    /// Returns true if a local replica of `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn has_local(&self, id: &Uuid) -> SyncResult<bool> {
        Ok(self.store.has_replica(id)?)
    }

    /// Checks the configured credential with the server.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] without a remote, otherwise the
    /// transport's error.
    pub fn authenticate(&self) -> SyncResult<Permission> {
        if self.is_offline() {
            return Err(SyncError::Offline);
        }
        self.transport.authenticate(self.credential()?)
    }

    /// Brings local and remote copies of `id` into agreement.
    pub fn sync(&self, id: &Uuid) -> SyncOutcome {
        if self.is_offline() {
            debug!(%id, "Offline, sync skipped");
            return self.finish(id, "sync", Ok(SyncOutcome::Unchanged));
        }
        let result = self.with_id_lock(id, || self.sync_locked(id));
        self.finish(id, "sync", result)
    }

    /// Replaces the local replica of `id` with the remote copy.
    ///
    /// Reports `RejectedStale` and transfers nothing when the local replica
    /// is newer than the remote one.
    pub fn download(&self, id: &Uuid) -> SyncOutcome {
        if self.is_offline() {
            return self.finish(id, "download", Ok(SyncOutcome::Unchanged));
        }
        let result = self.with_id_lock(id, || self.download_checked(id));
        self.finish(id, "download", result)
    }

    /// Sends the local replica of `id` to the server.
    ///
    /// Reports `Unchanged` when the remote already holds the same version.
    pub fn upload(&self, id: &Uuid) -> SyncOutcome {
        if self.is_offline() {
            return self.finish(id, "upload", Ok(SyncOutcome::Unchanged));
        }
        let result = self.with_id_lock(id, || self.upload_checked(id));
        self.finish(id, "upload", result)
    }

    /// Deletes `id` on the server and locally.
    ///
    /// A record the server does not know is still removed locally. Offline,
    /// only the local replica is removed.
    pub fn delete(&self, id: &Uuid) -> SyncOutcome {
        let result = self.with_id_lock(id, || self.delete_locked(id));
        self.finish(id, "delete", result)
    }

    /// Compares the local replica of `id` with the remote summary.
    ///
    /// Offline, a local replica is always reported `Same`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if neither side knows `id`, or the
    /// transport's error.
    pub fn is_up_to_date(&self, id: &Uuid) -> SyncResult<Freshness> {
        let local = self.local_record(id)?;
        if self.is_offline() {
            return Ok(if local.is_some() {
                Freshness::Same
            } else {
                Freshness::NoLocal
            });
        }
        let remote = self.transport.fetch_summary(self.credential()?, id)?;
        self.remember(id, remote.as_ref());
        match (local, remote) {
            (None, None) => Err(SyncError::NotFound(*id)),
            (None, Some(_)) => Ok(Freshness::NoLocal),
            (Some(_), None) => Ok(Freshness::NoRemote),
            (Some(local), Some(remote)) => {
                Ok(Freshness::compare(local.time_modified, remote.time_modify))
            }
        }
    }

    /// The replica state of `id`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncEngine::is_up_to_date`].
    pub fn replica_state(&self, id: &Uuid) -> SyncResult<ReplicaState> {
        Ok(self.is_up_to_date(id)?.replica_state())
    }

    /// Returns true if every local replica matches its remote copy.
    ///
    /// # Errors
    ///
    /// Returns the first comparison error.
    pub fn all_up_to_date(&self) -> SyncResult<bool> {
        for id in self.store.list_ids()? {
            if self.is_up_to_date(&id)? != Freshness::Same {
                debug!(%id, "Not up to date");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Refreshes the remote summary cache with every record carrying all
    /// of `tags`. Offline, returns nothing.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub fn fetch_remote_list(&self, tags: &TagSet) -> SyncResult<Vec<RecordSummary>> {
        if self.is_offline() {
            return Ok(Vec::new());
        }
        let list = self.transport.list(self.credential()?, tags)?;
        let mut cache = self.remote_cache.write();
        for summary in &list {
            cache.insert(summary.uuid, summary.clone());
        }
        info!("Fetched {} remote summaries", list.len());
        Ok(list)
    }

    /// Cached remote summary of `id`.
    pub fn remote_summary(&self, id: &Uuid) -> Option<RecordSummary> {
        self.remote_cache.read().get(id).cloned()
    }

    /// Cached remote ids with no local record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remote_only_ids(&self) -> SyncResult<Vec<Uuid>> {
        let local = self.store.list_ids()?;
        let mut ids: Vec<Uuid> = self
            .remote_cache
            .read()
            .keys()
            .filter(|id| !local.contains(id))
            .copied()
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Returns an accessor for `id`: local when a record exists, otherwise
    /// virtual over the remote summary.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if neither the store, the cache nor
    /// the server knows `id`.
    pub fn manipulator(&self, id: &Uuid) -> SyncResult<VirtualFileManipulator<'_, T>> {
        if self.store.contains(id)? {
            return VirtualFileManipulator::local(self, *id);
        }
        if let Some(summary) = self.remote_summary(id) {
            return Ok(VirtualFileManipulator::remote(self, summary));
        }
        if !self.is_offline() {
            if let Some(summary) = self.transport.fetch_summary(self.credential()?, id)? {
                self.remember(id, Some(&summary));
                return Ok(VirtualFileManipulator::remote(self, summary));
            }
        }
        Err(SyncError::NotFound(*id))
    }

    /// Fetches the notes of a remote record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`], [`SyncError::NotFound`], or the
    /// transport's error.
    pub fn fetch_notes(&self, id: &Uuid) -> SyncResult<String> {
        if self.is_offline() {
            return Err(SyncError::Offline);
        }
        self.transport
            .fetch_notes(self.credential()?, id)?
            .ok_or(SyncError::NotFound(*id))
    }

    /// Replaces one field of the remote copy directly.
    ///
    /// The local replica is not touched; a later sync downloads the edit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`], or the transport's error.
    pub fn update_remote(&self, update: FieldUpdate) -> SyncResult<()> {
        if self.is_offline() {
            return Err(SyncError::Offline);
        }
        let id = update.uuid;
        info!(%id, cmd = %update.command, "Remote field edit");
        self.transport.update_field(self.credential()?, update)?;
        self.remote_cache.write().remove(&id);
        Ok(())
    }

    fn sync_locked(&self, id: &Uuid) -> SyncResult<SyncOutcome> {
        let key = self.credential()?;
        let Some(local) = self.local_record(id)? else {
            let found = self.download_locked(key, id)?;
            let outcome = if found {
                SyncOutcome::UpdatedFromRemote
            } else {
                SyncOutcome::NotFound
            };
            info!(%id, %outcome, "No local replica");
            return Ok(outcome);
        };

        let remote = self.transport.fetch_summary(key, id)?;
        self.remember(id, remote.as_ref());
        let Some(remote) = remote else {
            self.upload_locked(key, &local, None)?;
            info!(%id, local = local.time_modified, "Uploaded record unknown to remote");
            return Ok(SyncOutcome::UploadedToRemote);
        };

        let outcome = match local.time_modified.partial_cmp(&remote.time_modify) {
            Some(Ordering::Equal) => SyncOutcome::Unchanged,
            Some(Ordering::Greater) => {
                self.upload_locked(key, &local, Some(remote.time_modify))?;
                SyncOutcome::UploadedToRemote
            }
            Some(Ordering::Less) => {
                if self.download_locked(key, id)? {
                    SyncOutcome::UpdatedFromRemote
                } else {
                    SyncOutcome::NotFound
                }
            }
            None => {
                return Err(SyncError::Protocol(format!(
                    "incomparable timestamps {} and {}",
                    local.time_modified, remote.time_modify
                )))
            }
        };
        info!(
            %id,
            local = local.time_modified,
            remote = remote.time_modify,
            %outcome,
            "Synced"
        );
        Ok(outcome)
    }

    fn download_checked(&self, id: &Uuid) -> SyncResult<SyncOutcome> {
        let key = self.credential()?;
        if let Some(local) = self.local_record(id)? {
            let remote = self.transport.fetch_summary(key, id)?;
            self.remember(id, remote.as_ref());
            let Some(remote) = remote else {
                return Ok(SyncOutcome::NotFound);
            };
            if local.time_modified > remote.time_modify {
                return Err(SyncError::StaleWrite(format!(
                    "local copy of {id} at {} is newer than remote {}",
                    local.time_modified, remote.time_modify
                )));
            }
        }
        Ok(if self.download_locked(key, id)? {
            SyncOutcome::UpdatedFromRemote
        } else {
            SyncOutcome::NotFound
        })
    }

    fn upload_checked(&self, id: &Uuid) -> SyncResult<SyncOutcome> {
        let key = self.credential()?;
        let local = self.local_record(id)?.ok_or(SyncError::NotFound(*id))?;
        let remote = self.transport.fetch_summary(key, id)?;
        self.remember(id, remote.as_ref());
        let base = remote.map(|r| r.time_modify);
        if base == Some(local.time_modified) {
            return Ok(SyncOutcome::Unchanged);
        }
        self.upload_locked(key, &local, base)?;
        Ok(SyncOutcome::UploadedToRemote)
    }

    fn delete_locked(&self, id: &Uuid) -> SyncResult<SyncOutcome> {
        let remote_found = if self.is_offline() {
            false
        } else {
            self.transport.delete(self.credential()?, id)?
        };
        let local_found = self.store.delete(id)?;
        self.remote_cache.write().remove(id);
        info!(%id, remote_found, local_found, "Deleted");
        Ok(if remote_found || local_found {
            SyncOutcome::Deleted
        } else {
            SyncOutcome::NotFound
        })
    }

    /// Downloads into a staging directory and swaps it in. Returns false if
    /// the server does not know `id`; the live replica is untouched on any
    /// failure.
    fn download_locked(&self, key: &CredentialHash, id: &Uuid) -> SyncResult<bool> {
        let Some(archive) = self.transport.download(key, id)? else {
            return Ok(false);
        };

        let staging = self.staging_root();
        fs::create_dir_all(&staging)?;
        let staged = staging.join(format!("{id}.download"));
        if staged.exists() {
            fs::remove_dir_all(&staged)?;
        }

        let adopted = unpack_bytes(&archive, &staged)
            .map_err(SyncError::from)
            .and_then(|_| Ok(self.store.adopt_replica(id, &staged)?));
        if staged.exists() {
            if let Err(err) = fs::remove_dir_all(&staged) {
                warn!(%id, "Could not clean staging directory: {}", err);
            }
        }
        let record = adopted?;

        if !self.store.has_replica(id)? {
            return Err(SyncError::LocalIntegrity(format!(
                "replica of {id} missing after download"
            )));
        }
        self.remote_cache.write().remove(id);
        info!(
            %id,
            time_modified = record.time_modified,
            bytes = archive.len(),
            "Downloaded replica"
        );
        Ok(true)
    }

    fn upload_locked(
        &self,
        key: &CredentialHash,
        record: &DocumentRecord,
        base: Option<f64>,
    ) -> SyncResult<()> {
        let id = record.id;
        let archive = self.store.with_replica(&id, pack_to_vec)??;
        let bytes = archive.len();
        self.transport
            .upload(key, UploadRequest::new(id, base, archive))?;
        self.remote_cache.write().remove(&id);
        debug!(%id, ?base, bytes, "Uploaded replica");
        Ok(())
    }

    fn local_record(&self, id: &Uuid) -> SyncResult<Option<DocumentRecord>> {
        if self.store.has_replica(id)? {
            Ok(self.store.get(id)?)
        } else {
            Ok(None)
        }
    }

    fn credential(&self) -> SyncResult<&CredentialHash> {
        self.config
            .credential
            .as_ref()
            .ok_or_else(|| SyncError::Unauthorized("no access key configured".into()))
    }

    fn staging_root(&self) -> PathBuf {
        self.config
            .staging_dir
            .clone()
            .unwrap_or_else(|| self.store.staging_dir())
    }

    fn remember(&self, id: &Uuid, summary: Option<&RecordSummary>) {
        let mut cache = self.remote_cache.write();
        match summary {
            Some(summary) => cache.insert(*id, summary.clone()),
            None => cache.remove(id),
        };
    }

    /// Runs `f` holding the lock for `id`. The lock entry is dropped again
    /// once no other caller holds it.
    fn with_id_lock<R>(&self, id: &Uuid, f: impl FnOnce() -> R) -> R {
        let lock = Arc::clone(self.locks.lock().entry(*id).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        let unused = locks.get(id).is_some_and(|held| Arc::ptr_eq(held, &lock))
            && Arc::strong_count(&lock) == 2;
        if unused {
            locks.remove(id);
        }
        // Released under the map lock so the last holder always sees a count of 2.
        drop(lock);
        result
    }

    fn finish(&self, id: &Uuid, op: &str, result: SyncResult<SyncOutcome>) -> SyncOutcome {
        let mut stats = self.stats.write();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                let outcome = outcome_for(&err);
                warn!(%id, %outcome, "{} failed: {}", op, err);
                stats.last_error = Some(err.to_string());
                outcome
            }
        };
        stats.record(outcome);
        outcome
    }
}

fn outcome_for(err: &SyncError) -> SyncOutcome {
    match err {
        SyncError::Unauthorized(_) | SyncError::Forbidden(_) => SyncOutcome::FailedAuth,
        SyncError::StaleWrite(_) => SyncOutcome::RejectedStale,
        SyncError::NotFound(_) => SyncOutcome::NotFound,
        SyncError::Offline => SyncOutcome::Unchanged,
        err if err.is_local() => SyncOutcome::FailedLocal,
        _ => SyncOutcome::FailedConnection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use std::thread;
    use tempfile::{tempdir, TempDir};

    struct Setup {
        _dir: TempDir,
        remote: Store,
        engine: SyncEngine<MockTransport>,
    }

    impl Setup {
        fn new(config: SyncConfig) -> Self {
            let dir = tempdir().unwrap();
            let local = Arc::new(Store::open_in_memory(dir.path().join("local")).unwrap());
            let remote = Store::open_in_memory(dir.path().join("remote")).unwrap();
            let engine = SyncEngine::new(config, local, MockTransport::new());
            Self {
                _dir: dir,
                remote,
                engine,
            }
        }

        fn online() -> Self {
            Self::new(SyncConfig::new("http://mock").with_access_key("k"))
        }

        fn publish(&self, id: &Uuid) {
            let summary = self.remote.summary(id).unwrap().unwrap();
            let archive = pack_to_vec(&self.remote.doc_dir(id)).unwrap();
            self.engine.transport().set_summary(summary);
            self.engine.transport().set_archive(*id, archive);
        }

        fn remote_record(&self, bibtex: &str) -> Uuid {
            let id = self.remote.create(bibtex, None).unwrap();
            self.publish(&id);
            id
        }

        fn local(&self) -> &Store {
            self.engine.store()
        }
    }

    #[test]
    fn offline_sync_is_noop() {
        let setup = Setup::new(SyncConfig::offline());
        let id = setup.remote.create("@misc{r}", None).unwrap();
        setup.publish(&id);

        assert_eq!(setup.engine.sync(&id), SyncOutcome::Unchanged);
        assert_eq!(setup.engine.transport().downloads(), 0);
        assert!(!setup.engine.has_local(&id).unwrap());
    }

    #[test]
    fn fresh_download() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{fresh}");

        assert_eq!(setup.engine.sync(&id), SyncOutcome::UpdatedFromRemote);
        assert!(setup.engine.has_local(&id).unwrap());
        assert_eq!(
            setup.local().get(&id).unwrap(),
            setup.remote.get(&id).unwrap()
        );
        assert!(!setup.local().staging_dir().join(format!("{id}.download")).exists());
    }

    #[test]
    fn resync_transfers_nothing() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{again}");

        assert_eq!(setup.engine.sync(&id), SyncOutcome::UpdatedFromRemote);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::Unchanged);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::Unchanged);
        assert_eq!(setup.engine.transport().downloads(), 1);
        assert!(setup.engine.transport().uploads().is_empty());
    }

    #[test]
    fn local_edit_uploads_with_base() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{edit}");
        setup.engine.sync(&id);
        let remote_time = setup.remote.get(&id).unwrap().unwrap().time_modified;

        setup.local().update_bibtex(&id, "@misc{edited}").unwrap();
        assert_eq!(setup.engine.sync(&id), SyncOutcome::UploadedToRemote);

        let uploads = setup.engine.transport().uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].uuid, id);
        assert_eq!(uploads[0].base_time_modified, Some(remote_time));
    }

    #[test]
    fn local_only_record_uploads_without_base() {
        let setup = Setup::online();
        let id = setup.local().create("@misc{mine}", None).unwrap();

        assert_eq!(setup.engine.sync(&id), SyncOutcome::UploadedToRemote);
        assert_eq!(setup.engine.transport().uploads()[0].base_time_modified, None);
    }

    #[test]
    fn remote_edit_downloads() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{behind}");
        setup.engine.sync(&id);

        setup.remote.update_comments(&id, "remote note").unwrap();
        setup.publish(&id);
        assert_eq!(setup.engine.is_up_to_date(&id).unwrap(), Freshness::Behind);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::UpdatedFromRemote);
        assert_eq!(setup.local().get(&id).unwrap().unwrap().comments, "remote note");
        assert_eq!(setup.engine.is_up_to_date(&id).unwrap(), Freshness::Same);
    }

    #[test]
    fn stale_upload_is_reported() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{stale}");
        setup.engine.sync(&id);
        let edited = setup.local().update_bibtex(&id, "@misc{mine}").unwrap();

        setup.engine.transport().set_reject_uploads(true);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::RejectedStale);
        assert_eq!(setup.local().get(&id).unwrap(), Some(edited));
        assert_eq!(setup.engine.stats().rejected_stale, 1);
    }

    #[test]
    fn auth_failures() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{auth}");
        setup.engine.transport().set_permission(None);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::FailedAuth);

        let keyless = Setup::new(SyncConfig::new("http://mock"));
        assert_eq!(keyless.engine.sync(&id), SyncOutcome::FailedAuth);
        assert!(keyless.engine.stats().last_error.is_some());
    }

    #[test]
    fn connection_failure_keeps_local() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{conn}");
        setup.engine.sync(&id);
        let before = setup.local().get(&id).unwrap();

        setup.engine.transport().set_connected(false);
        assert_eq!(setup.engine.sync(&id), SyncOutcome::FailedConnection);
        assert_eq!(setup.local().get(&id).unwrap(), before);
        assert_eq!(setup.engine.stats().failed_connection, 1);
    }

    #[test]
    fn unknown_id() {
        let setup = Setup::online();
        let id = Uuid::new_v4();
        assert_eq!(setup.engine.sync(&id), SyncOutcome::NotFound);
        assert!(matches!(
            setup.engine.is_up_to_date(&id),
            Err(SyncError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_archive_leaves_replica_intact() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{corrupt}");
        setup.engine.sync(&id);
        let before = setup.local().get(&id).unwrap();

        setup.remote.update_bibtex(&id, "@misc{newer}").unwrap();
        setup.publish(&id);
        setup.engine.transport().set_archive(id, b"not a zip".to_vec());

        assert_eq!(setup.engine.sync(&id), SyncOutcome::FailedLocal);
        assert_eq!(setup.local().get(&id).unwrap(), before);
        assert!(setup.engine.has_local(&id).unwrap());
    }

    #[test]
    fn delete_removes_both_sides() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{gone}");
        setup.engine.sync(&id);

        assert_eq!(setup.engine.delete(&id), SyncOutcome::Deleted);
        assert!(setup.local().get(&id).unwrap().is_none());
        assert!(!setup.local().doc_dir(&id).exists());
        assert_eq!(
            setup
                .engine
                .transport()
                .fetch_summary(&CredentialHash::from_secret("k"), &id)
                .unwrap(),
            None
        );
        assert_eq!(setup.engine.delete(&id), SyncOutcome::NotFound);
    }

    #[test]
    fn explicit_upload_and_download() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{explicit}");
        assert_eq!(setup.engine.download(&id), SyncOutcome::UpdatedFromRemote);
        assert_eq!(setup.engine.upload(&id), SyncOutcome::Unchanged);

        setup.local().update_url(&id, "https://example.org").unwrap();
        assert_eq!(setup.engine.upload(&id), SyncOutcome::UploadedToRemote);
        assert_eq!(setup.engine.download(&Uuid::new_v4()), SyncOutcome::NotFound);
    }

    #[test]
    fn download_keeps_newer_local_edit() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{ahead}");
        assert_eq!(setup.engine.sync(&id), SyncOutcome::UpdatedFromRemote);
        let edited = setup
            .local()
            .update_comments(&id, "unsynced local edit")
            .unwrap();

        assert_eq!(setup.engine.download(&id), SyncOutcome::RejectedStale);
        assert_eq!(setup.engine.transport().downloads(), 1);
        assert_eq!(setup.local().get(&id).unwrap(), Some(edited));
        assert_eq!(setup.engine.stats().rejected_stale, 1);

        assert_eq!(setup.engine.sync(&id), SyncOutcome::UploadedToRemote);
    }

    #[test]
    fn download_of_current_replica_refetches() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{current}");
        setup.engine.sync(&id);

        assert_eq!(setup.engine.download(&id), SyncOutcome::UpdatedFromRemote);
        assert_eq!(setup.engine.transport().downloads(), 2);
        assert_eq!(setup.engine.is_up_to_date(&id).unwrap(), Freshness::Same);
    }

    #[test]
    fn freshness_of_local_only_record() {
        let setup = Setup::online();
        let id = setup.local().create("@misc{solo}", None).unwrap();
        assert_eq!(setup.engine.is_up_to_date(&id).unwrap(), Freshness::NoRemote);
        assert_eq!(setup.engine.replica_state(&id).unwrap(), ReplicaState::LocalAhead);
        assert!(!setup.engine.all_up_to_date().unwrap());
    }

    #[test]
    fn remote_list_feeds_cache() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{listed}");

        let list = setup.engine.fetch_remote_list(&TagSet::new()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(setup.engine.remote_only_ids().unwrap(), vec![id]);
        assert!(setup.engine.remote_summary(&id).is_some());

        setup.engine.sync(&id);
        assert!(setup.engine.remote_only_ids().unwrap().is_empty());
    }

    #[test]
    fn concurrent_syncs_of_one_id_transfer_once() {
        let setup = Setup::online();
        let id = setup.remote_record("@misc{race}");

        let outcomes: Vec<SyncOutcome> = thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| setup.engine.sync(&id))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(setup.engine.transport().downloads(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == SyncOutcome::UpdatedFromRemote)
                .count(),
            1
        );
        assert_eq!(setup.engine.stats().unchanged, 3);
        assert!(setup.engine.locks.lock().is_empty());
    }
}
