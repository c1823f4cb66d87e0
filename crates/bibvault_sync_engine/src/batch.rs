//! Bounded fan-out of per-document syncs.

use crate::engine::SyncEngine;
use crate::outcome::SyncOutcome;
use crate::transport::RemoteTransport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;
use uuid::Uuid;

/// Cancels a running batch from another thread.
///
/// Cancellation is checked between documents; a transfer already in
/// flight runs to completion.
#[derive(Debug, Clone)]
pub struct BatchHandle {
    cancelled: Arc<AtomicBool>,
}

impl BatchHandle {
    /// Stops workers from picking up further documents.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Per-document outcomes in completion order.
    pub results: Vec<(Uuid, SyncOutcome)>,
    /// True if the batch stopped before every id was synced.
    pub cancelled: bool,
}

impl BatchReport {
    /// Number of documents that ended with `outcome`.
    pub fn count(&self, outcome: SyncOutcome) -> usize {
        self.results.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Ids whose sync did not succeed.
    pub fn failures(&self) -> Vec<Uuid> {
        self.results
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Runs [`SyncEngine::sync`] over many ids on a bounded worker pool.
pub struct BatchSync<'e, T: RemoteTransport> {
    engine: &'e SyncEngine<T>,
    pool_size: usize,
    cancelled: Arc<AtomicBool>,
}

impl<'e, T: RemoteTransport> BatchSync<'e, T> {
    /// Creates a batch runner sized by the engine's configuration.
    pub fn new(engine: &'e SyncEngine<T>) -> Self {
        Self {
            engine,
            pool_size: engine.config().pool_size.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the worker count. Zero is treated as one.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// A handle that cancels this batch.
    pub fn handle(&self) -> BatchHandle {
        BatchHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Syncs every id in `ids`.
    pub fn sync_all(&self, ids: &[Uuid]) -> BatchReport {
        let next = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(ids.len()));
        let workers = self.pool_size.min(ids.len()).max(1);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if self.cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(id) = ids.get(index) else {
                        break;
                    };
                    let outcome = self.engine.sync(id);
                    results.lock().push((*id, outcome));
                });
            }
        });

        let results = results.into_inner();
        let cancelled = results.len() < ids.len();
        info!(
            total = ids.len(),
            done = results.len(),
            cancelled,
            "Batch sync finished"
        );
        BatchReport { results, cancelled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::transport::MockTransport;
    use bibvault_archive::pack_to_vec;
    use bibvault_store::Store;
    use tempfile::tempdir;

    #[test]
    fn syncs_every_id() {
        let dir = tempdir().unwrap();
        let local = Arc::new(Store::open_in_memory(dir.path().join("local")).unwrap());
        let remote = Store::open_in_memory(dir.path().join("remote")).unwrap();
        let config = SyncConfig::new("http://mock").with_access_key("k").with_pool_size(3);
        let engine = SyncEngine::new(config, local, MockTransport::new());

        let mut ids = Vec::new();
        for i in 0..8 {
            let id = remote.create(&format!("@misc{{r{i}}}"), None).unwrap();
            engine.transport().set_summary(remote.summary(&id).unwrap().unwrap());
            engine
                .transport()
                .set_archive(id, pack_to_vec(&remote.doc_dir(&id)).unwrap());
            ids.push(id);
        }
        ids.push(Uuid::new_v4());

        let report = BatchSync::new(&engine).sync_all(&ids);
        assert!(!report.cancelled);
        assert_eq!(report.results.len(), 9);
        assert_eq!(report.count(SyncOutcome::UpdatedFromRemote), 8);
        assert_eq!(report.failures().len(), 1);
        assert_eq!(engine.store().list_ids().unwrap().len(), 8);
    }

    #[test]
    fn cancelled_batch_stops_early() {
        let dir = tempdir().unwrap();
        let local = Arc::new(Store::open_in_memory(dir.path()).unwrap());
        let engine = SyncEngine::new(SyncConfig::offline(), local, MockTransport::new());

        let batch = BatchSync::new(&engine).with_pool_size(2);
        let handle = batch.handle();
        handle.cancel();
        assert!(handle.is_cancelled());

        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let report = batch.sync_all(&ids);
        assert!(report.cancelled);
        assert!(report.results.is_empty());
    }

    #[test]
    fn empty_batch() {
        let dir = tempdir().unwrap();
        let local = Arc::new(Store::open_in_memory(dir.path()).unwrap());
        let engine = SyncEngine::new(SyncConfig::offline(), local, MockTransport::new());

        let report = BatchSync::new(&engine).sync_all(&[]);
        assert!(!report.cancelled);
        assert!(report.results.is_empty());
    }
}
