//! Sync command implementation.

use bibvault_store::{Store, TagSet};
use bibvault_sync_engine::{BatchSync, HttpTransport, ReqwestClient, SyncConfig, SyncEngine};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::CliError;

/// Flags accepted by `bibvault sync`.
#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Local store root.
    pub data: Option<PathBuf>,
    /// Server base URL.
    pub server: Option<String>,
    /// Raw access key.
    pub key: Option<String>,
    /// Client configuration file.
    pub config: Option<PathBuf>,
    /// Worker count.
    pub pool: Option<usize>,
}

/// Merges the configuration file (if any) with the flags, returning the
/// engine configuration and the local store root.
pub fn resolve(options: SyncOptions) -> Result<(SyncConfig, PathBuf), Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => SyncConfig::from_json_file(path)?,
        None => SyncConfig::offline(),
    };
    if let Some(server) = options.server {
        config.server_url = Some(server.trim_end_matches('/').to_string());
    }
    if let Some(key) = options.key.as_deref() {
        config = config.with_access_key(key);
    }
    if let Some(pool) = options.pool {
        config = config.with_pool_size(pool);
    }
    let data = options
        .data
        .or_else(|| config.database.clone())
        .ok_or_else(|| CliError::Usage("--data or a configuration with \"database\" required".into()))?;
    if !config.is_offline() && config.credential.is_none() {
        return Err(CliError::Usage("--key required when syncing with a server".into()).into());
    }
    Ok((config, data))
}

/// Opens the local store and builds an engine over a reqwest transport.
pub fn engine(
    config: SyncConfig,
    data: PathBuf,
) -> Result<SyncEngine<HttpTransport<ReqwestClient>>, Box<dyn std::error::Error>> {
    let store = Arc::new(Store::open(data)?);
    let url = config.server_url.clone().unwrap_or_default();
    let transport = HttpTransport::new(url, ReqwestClient::new()?)
        .with_timeouts(config.metadata_timeout, config.transfer_timeout);
    Ok(SyncEngine::new(config, store, transport))
}

/// Every local id plus every id only the server holds.
pub fn all_ids<T: bibvault_sync_engine::RemoteTransport>(
    engine: &SyncEngine<T>,
) -> Result<Vec<Uuid>, Box<dyn std::error::Error>> {
    let mut ids: BTreeSet<Uuid> = engine.store().list_ids()?;
    if !engine.is_offline() {
        let remote = engine.fetch_remote_list(&TagSet::new())?;
        debug!("Server lists {} records", remote.len());
        ids.extend(engine.remote_only_ids()?);
    }
    Ok(ids.into_iter().collect())
}

/// Runs the sync command.
pub fn run(options: SyncOptions, ids: &[Uuid]) -> Result<(), Box<dyn std::error::Error>> {
    let (config, data) = resolve(options)?;
    let engine = engine(config, data)?;
    if engine.is_offline() {
        info!("No server configured; nothing to sync");
    }

    let ids = if ids.is_empty() {
        all_ids(&engine)?
    } else {
        ids.to_vec()
    };

    let report = BatchSync::new(&engine).sync_all(&ids);
    for (id, outcome) in &report.results {
        println!("{id}  {outcome}");
    }

    let failed = report.failures().len();
    if failed > 0 {
        return Err(CliError::SyncFailures {
            failed,
            total: ids.len(),
        }
        .into());
    }
    info!("Synced {} documents", ids.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibvault_sync_engine::SyncOutcome;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn flags_override_config_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("client.json");
        std::fs::write(
            &file,
            r#"{"host": "10.0.0.2", "port": 9000, "access_key": "a", "database": "/lib"}"#,
        )
        .unwrap();

        let (config, data) = resolve(SyncOptions {
            config: Some(file.clone()),
            ..SyncOptions::default()
        })
        .unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://10.0.0.2:9000"));
        assert_eq!(data, PathBuf::from("/lib"));

        let (config, data) = resolve(SyncOptions {
            config: Some(file),
            data: Some(dir.path().to_path_buf()),
            server: Some("http://other:1/".into()),
            pool: Some(0),
            ..SyncOptions::default()
        })
        .unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://other:1"));
        assert_eq!(config.pool_size, 1);
        assert_eq!(data, dir.path());
    }

    #[test]
    fn server_without_key_is_rejected() {
        let result = resolve(SyncOptions {
            data: Some(PathBuf::from("/lib")),
            server: Some("http://localhost:8080".into()),
            ..SyncOptions::default()
        });
        assert!(result.is_err());
        assert!(resolve(SyncOptions::default()).is_err());
    }

    #[test]
    fn offline_sync_leaves_library_alone() {
        let dir = tempdir().unwrap();
        let (config, data) = resolve(SyncOptions {
            data: Some(dir.path().to_path_buf()),
            ..SyncOptions::default()
        })
        .unwrap();
        let engine = engine(config, data).unwrap();
        let id = engine.store().create("@misc{offline}", None).unwrap();

        assert_eq!(all_ids(&engine).unwrap(), vec![id]);
        assert_eq!(engine.sync(&id), SyncOutcome::Unchanged);
        assert!(engine.store().has_replica(&id).unwrap());
    }

    #[test]
    fn engine_uses_configured_timeouts() {
        let dir = tempdir().unwrap();
        let config = SyncConfig::new("http://localhost:1")
            .with_access_key("k")
            .with_metadata_timeout(Duration::from_millis(200));
        let engine = engine(config, dir.path().to_path_buf()).unwrap();
        assert_eq!(engine.transport().base_url(), "http://localhost:1");
        assert!(!engine.is_offline());
    }
}
