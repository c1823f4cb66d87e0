//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use bibvault_sync_protocol::CredentialHash;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

/// Configuration for sync operations.
///
/// A configuration without a server URL is offline: every sync is a no-op
/// that reports [`crate::SyncOutcome::Unchanged`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the sync server, or `None` for offline mode.
    pub server_url: Option<String>,
    /// Hash of the access key. The raw secret is never kept.
    pub credential: Option<CredentialHash>,
    /// Local store root named by a client configuration file.
    pub database: Option<PathBuf>,
    /// Directory for staging downloaded archives. Defaults to the store's
    /// own staging directory.
    pub staging_dir: Option<PathBuf>,
    /// Timeout for auth, listing and metadata calls.
    pub metadata_timeout: Duration,
    /// Timeout for archive uploads and downloads.
    pub transfer_timeout: Duration,
    /// Worker count for batch sync.
    pub pool_size: usize,
}

impl SyncConfig {
    /// Creates a configuration syncing against `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Self::offline()
        }
    }

    /// Creates an offline configuration.
    pub fn offline() -> Self {
        Self {
            server_url: None,
            credential: None,
            database: None,
            staging_dir: None,
            metadata_timeout: Duration::from_secs(5),
            transfer_timeout: Duration::from_secs(120),
            pool_size: 4,
        }
    }

    /// Hashes and sets the access key.
    pub fn with_access_key(mut self, secret: &str) -> Self {
        self.credential = Some(CredentialHash::from_secret(secret));
        self
    }

    /// Sets an already hashed credential.
    pub fn with_credential(mut self, credential: CredentialHash) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the staging directory. It must be on the same filesystem as
    /// the store root.
    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(path.into());
        self
    }

    /// Sets the metadata call timeout.
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Sets the archive transfer timeout.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Sets the batch worker count. Zero is treated as one.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Returns true when no remote is configured.
    pub fn is_offline(&self) -> bool {
        self.server_url.is_none()
    }

    /// Loads a client configuration file.
    ///
    /// ```json
    /// { "host": "192.168.1.10", "port": 8080, "access_key": "secret",
    ///   "database": "/home/me/papers" }
    /// ```
    ///
    /// An empty or missing `host` yields an offline configuration. A host
    /// given with a scheme is used as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read(path)?;
        let file: ClientFile = serde_json::from_slice(&raw)
            .map_err(|e| SyncError::Protocol(format!("{}: {e}", path.display())))?;

        let host = file.host.trim().to_string();
        let mut config = if host.is_empty() {
            Self::offline()
        } else if host.starts_with("http://") || host.starts_with("https://") {
            Self::new(format!("{}:{}", host.trim_end_matches('/'), file.port))
        } else {
            Self::new(format!("http://{host}:{}", file.port))
        };
        let access_key = Zeroizing::new(file.access_key);
        if !access_key.is_empty() {
            config = config.with_access_key(&access_key);
        }
        config.database = file.database;
        Ok(config)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::offline()
    }
}

#[derive(Deserialize)]
struct ClientFile {
    #[serde(default)]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    access_key: String,
    database: Option<PathBuf>,
}

fn default_port() -> u16 {
    8080
}
