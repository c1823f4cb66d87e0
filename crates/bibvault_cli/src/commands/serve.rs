//! Serve command implementation.

use bibvault_sync_server::{serve, ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::CliError;

/// Builds a server configuration from command-line flags.
pub fn from_flags(
    host: &str,
    port: u16,
    data: PathBuf,
    keys: Option<PathBuf>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let bind_addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| CliError::Usage(format!("bad address {host}:{port}: {e}")))?;
    let mut config = ServerConfig::new(bind_addr, data);
    if let Some(keys) = keys {
        config = config.with_key_file(keys);
    }
    Ok(config)
}

/// Loads a server configuration file.
pub fn load(path: &Path) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig::from_json_file(path)?)
}

/// Runs the server until interrupted.
pub fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(SyncServer::open(config)?);
    if server.keys().is_empty()? {
        info!("No access keys registered; every request will be refused");
    }
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(server))?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_config() {
        let config = from_flags("127.0.0.1", 9000, PathBuf::from("/srv/lib"), None).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.key_file, PathBuf::from("/srv/lib").join("keys.txt"));

        let config = from_flags(
            "0.0.0.0",
            8080,
            PathBuf::from("/srv/lib"),
            Some(PathBuf::from("/etc/keys.txt")),
        )
        .unwrap();
        assert_eq!(config.key_file, PathBuf::from("/etc/keys.txt"));
    }

    #[test]
    fn bad_host_is_a_usage_error() {
        assert!(from_flags("not a host", 80, PathBuf::from("x"), None).is_err());
    }
}
