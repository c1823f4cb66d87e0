//! Main sync server.

use crate::auth::{AuthGate, KeyStore};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler};
use bibvault_store::Store;
use bibvault_sync_protocol::{LoopbackServer, Request, Response};
use std::sync::Arc;
use tracing::info;

/// The sync server.
///
/// Owns the server-side record store and the credential file and answers
/// transport-neutral [`Request`]s. The HTTP layer in [`crate::router`]
/// and the in-process loopback both funnel into [`SyncServer::handle`].
///
/// # Example
///
/// ```
/// use bibvault_sync_server::{ServerConfig, SyncServer};
/// use bibvault_sync_protocol::{CredentialHash, Request};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path());
/// let server = SyncServer::open(config).unwrap();
/// server.keys().register_key("secret").unwrap();
///
/// let response = server.handle(&Request::auth(&CredentialHash::from_secret("secret"), false));
/// assert_eq!(response.status, 200);
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Opens the store, credential file and staging directory named by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of them cannot be opened or created.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(Store::open(&config.data_root)?);
        let keys = KeyStore::open(&config.key_file)?;
        info!(
            "Serving store {:?} with keys from {:?}",
            config.data_root, config.key_file
        );
        Self::with_parts(config, store, keys)
    }

    /// Creates a server over an existing store and key store.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging directory cannot be created.
    pub fn with_parts(config: ServerConfig, store: Arc<Store>, keys: KeyStore) -> ServerResult<Self> {
        std::fs::create_dir_all(&config.staging_dir)?;
        let context = Arc::new(HandlerContext::new(config, store, AuthGate::new(keys)));
        let handler = RequestHandler::new(Arc::clone(&context));
        Ok(Self { handler, context })
    }

    /// Handles one request.
    pub fn handle(&self, request: &Request) -> Response {
        self.handler.handle(request)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// The server's record store.
    pub fn store(&self) -> &Arc<Store> {
        &self.context.store
    }

    /// The credential file.
    pub fn keys(&self) -> &KeyStore {
        self.context.gate.keys()
    }
}

impl LoopbackServer for SyncServer {
    fn handle_request(&self, request: &Request) -> Response {
        self.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibvault_sync_protocol::CredentialHash;

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path().join("srv"));
        let server = SyncServer::open(config).unwrap();

        assert!(server.config().key_file.exists());
        assert!(server.config().staging_dir.is_dir());
        assert!(server.store().list_ids().unwrap().is_empty());
    }

    #[test]
    fn loopback_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), dir.path());
        let server = Arc::new(SyncServer::open(config).unwrap());
        server.keys().register_key("k").unwrap();

        let request = Request::auth(&CredentialHash::from_secret("k"), false);
        let response = server.handle_request(&request);
        assert_eq!(response.text_body(), "Success");
    }
}
