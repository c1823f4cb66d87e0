//! Stress helpers for concurrent sync.
//!
//! These drive many documents through the batch runner against an
//! in-process server.

use bibvault_sync_engine::BatchSync;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::harness::{SyncWorld, TestEngine};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Documents attempted.
    pub total: usize,
    /// Documents that synced successfully.
    pub successful: usize,
    /// Documents that failed.
    pub failed: usize,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl StressResult {
    /// Documents per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Documents: {}", self.total);
        println!("Successful: {}", self.successful);
        println!("Failed: {}", self.failed);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} docs/sec", self.throughput());
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of documents.
    pub documents: usize,
    /// Batch worker count.
    pub workers: usize,
    /// Size of each attached file in bytes; zero for no attachment.
    pub attachment_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            documents: 50,
            workers: 4,
            attachment_size: 4096,
        }
    }
}

/// Uploads `config.documents` new records from one client, then pulls them
/// all into a second client. Returns the result of each phase.
pub fn stress_upload_then_download(
    world: &SyncWorld,
    config: &StressConfig,
) -> (StressResult, StressResult) {
    let writer = world.client("stress-writer");
    let reader = world.client("stress-reader");
    let source_dir = world.path().join("stress-sources");
    std::fs::create_dir_all(&source_dir).expect("Failed to create source directory");

    let mut ids = Vec::with_capacity(config.documents);
    for i in 0..config.documents {
        let bibtex = format!("@misc{{stress{i}}}");
        let id = if config.attachment_size > 0 {
            let source = source_dir.join(format!("{i}.pdf"));
            let body = vec![(i % 251) as u8; config.attachment_size];
            std::fs::write(&source, body).expect("Failed to write attachment");
            writer.store().create(&bibtex, Some(source.as_path()))
        } else {
            writer.store().create(&bibtex, None)
        }
        .expect("Failed to create record");
        ids.push(id);
    }

    let upload = run_batch(&writer, &ids, config.workers);
    let download = run_batch(&reader, &ids, config.workers);
    (upload, download)
}

/// Syncs one remote-only id from `threads` threads at once on one client
/// and returns how many archive transfers reached the server.
pub fn stress_same_id_contention(world: &SyncWorld, threads: usize) -> usize {
    let id = world.seed_remote("@misc{contended}", 100.0);
    let client = world.client("stress-contention");

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| client.sync(&id));
        }
    });
    client.transport().client().archive_transfers()
}

fn run_batch(engine: &TestEngine, ids: &[Uuid], workers: usize) -> StressResult {
    let start = Instant::now();
    let report = BatchSync::new(engine).with_pool_size(workers).sync_all(ids);
    let failed = report.failures().len();
    StressResult {
        total: ids.len(),
        successful: report.results.len() - failed,
        failed,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_round_trip() {
        let world = SyncWorld::new();
        let config = StressConfig {
            documents: 12,
            workers: 3,
            attachment_size: 256,
        };
        let (upload, download) = stress_upload_then_download(&world, &config);
        assert_eq!(upload.successful, 12);
        assert_eq!(download.successful, 12);
        assert_eq!(world.remote().list_ids().unwrap().len(), 12);
    }

    #[test]
    fn test_same_id_downloads_once() {
        let world = SyncWorld::new();
        assert_eq!(stress_same_id_contention(&world, 6), 1);
    }
}
