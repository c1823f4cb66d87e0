//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the credential file under the data root.
pub const DEFAULT_KEY_FILE: &str = "keys.txt";

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Root of the server's record store.
    pub data_root: PathBuf,
    /// Credential file.
    pub key_file: PathBuf,
    /// Directory for unpacking uploads before they are swapped in.
    pub staging_dir: PathBuf,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Creates a configuration serving the store at `data_root`.
    pub fn new(bind_addr: SocketAddr, data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Self {
            bind_addr,
            key_file: data_root.join(DEFAULT_KEY_FILE),
            staging_dir: data_root.join(bibvault_store::STAGING_DIR),
            data_root,
            request_timeout: Duration::from_secs(120),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }

    /// Sets the credential file.
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = path.into();
        self
    }

    /// Sets the staging directory. It must be on the same filesystem as
    /// the data root.
    pub fn with_staging_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.staging_dir = path.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum upload size.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Loads a configuration from a JSON file.
    ///
    /// ```json
    /// { "host": "0.0.0.0", "port": 8080, "database": "/srv/bibvault",
    ///   "key_file": "/srv/keys.txt", "max_upload_mb": 256 }
    /// ```
    ///
    /// Only `port` and `database` are required.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read(path)?;
        let file: FileConfig = serde_json::from_slice(&raw)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        let host = if file.host.is_empty() {
            "0.0.0.0".to_string()
        } else {
            file.host
        };
        let bind_addr: SocketAddr = format!("{host}:{}", file.port)
            .parse()
            .map_err(|e| ServerError::Config(format!("bad address {host}:{}: {e}", file.port)))?;

        let mut config = Self::new(bind_addr, file.database);
        if let Some(key_file) = file.key_file {
            config = config.with_key_file(key_file);
        }
        if let Some(staging) = file.staging_dir {
            config = config.with_staging_dir(staging);
        }
        if let Some(mb) = file.max_upload_mb {
            config = config.with_max_upload_bytes(mb.saturating_mul(1024 * 1024));
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)), "bibvault-data")
    }
}

#[derive(Deserialize)]
struct FileConfig {
    #[serde(default)]
    host: String,
    port: u16,
    database: PathBuf,
    key_file: Option<PathBuf>,
    staging_dir: Option<PathBuf>,
    max_upload_mb: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.key_file, PathBuf::from("bibvault-data").join(DEFAULT_KEY_FILE));
        assert!(config.staging_dir.starts_with(&config.data_root));
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap(), "/srv/data")
            .with_key_file("/etc/keys")
            .with_max_upload_bytes(10)
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.key_file, PathBuf::from("/etc/keys"));
        assert_eq!(config.max_upload_bytes, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(
            &path,
            r#"{"host": "", "port": 9090, "database": "/srv/lib", "max_upload_mb": 2}"#,
        )
        .unwrap();

        let config = ServerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(config.data_root, PathBuf::from("/srv/lib"));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            ServerConfig::from_json_file(&path),
            Err(ServerError::Config(_))
        ));
    }
}
