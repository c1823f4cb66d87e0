//! In-process server and clients.
//!
//! A [`SyncWorld`] owns a sync server over a temporary directory and hands
//! out engines that reach it through the loopback transport, so whole
//! client/server exchanges run without sockets.

use bibvault_store::{Store, TagSet};
use bibvault_sync_engine::{HttpTransport, LoopbackClient, SyncConfig, SyncEngine};
use bibvault_sync_protocol::{CredentialHash, Permission};
use bibvault_sync_server::{ServerConfig, SyncServer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::fixtures::record_at;

/// Transport used by harness clients.
pub type LoopbackTransport = HttpTransport<LoopbackClient<Arc<SyncServer>>>;

/// Engine used by harness clients.
pub type TestEngine = SyncEngine<LoopbackTransport>;

/// Secret registered with admin permission in every world.
pub const ADMIN_SECRET: &str = "testkit-admin-secret";

const LOOPBACK_URL: &str = "http://loopback";

/// A sync server plus a scratch area for clients.
pub struct SyncWorld {
    /// The server.
    pub server: Arc<SyncServer>,
    temp_dir: TempDir,
}

impl SyncWorld {
    /// Creates a server over an empty SQLite store with [`ADMIN_SECRET`]
    /// registered.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = ServerConfig::new(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            temp_dir.path().join("server"),
        );
        let server = SyncServer::open(config).expect("Failed to open server");
        server
            .keys()
            .register_key(ADMIN_SECRET)
            .expect("Failed to register admin key");
        Self {
            server: Arc::new(server),
            temp_dir,
        }
    }

    /// Root of the world's temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The server's record store.
    pub fn remote(&self) -> &Arc<Store> {
        self.server.store()
    }

    /// Creates a client named `name` holding the admin key.
    ///
    /// Each name must be used once per world; its library persists in
    /// SQLite under the world's directory.
    pub fn client(&self, name: &str) -> TestEngine {
        self.client_with_key(name, ADMIN_SECRET)
    }

    /// Creates a client named `name` holding `secret`.
    pub fn client_with_key(&self, name: &str, secret: &str) -> TestEngine {
        let store = Store::open(self.path().join("clients").join(name))
            .expect("Failed to open client store");
        let config = SyncConfig::new(LOOPBACK_URL).with_access_key(secret);
        let transport =
            HttpTransport::new(LOOPBACK_URL, LoopbackClient::new(Arc::clone(&self.server)));
        SyncEngine::new(config, Arc::new(store), transport)
    }

    /// Creates a client with no server configured.
    pub fn offline_client(&self, name: &str) -> TestEngine {
        let store = Store::open(self.path().join("clients").join(name))
            .expect("Failed to open client store");
        let transport =
            HttpTransport::new(LOOPBACK_URL, LoopbackClient::new(Arc::clone(&self.server)));
        SyncEngine::new(SyncConfig::offline(), Arc::new(store), transport)
    }

    /// Registers `secret` restricted to records carrying every tag in
    /// `tags`.
    pub fn register_restricted(&self, secret: &str, tags: &[&str]) {
        let tags: TagSet = tags.iter().collect();
        self.server
            .keys()
            .register_hash(
                &CredentialHash::from_secret(secret),
                Some(&Permission::restricted(tags)),
            )
            .expect("Failed to register restricted key");
    }

    /// Creates a record directly on the server, modified at `time`.
    pub fn seed_remote(&self, bibtex: &str, time: f64) -> Uuid {
        record_at(self.remote(), bibtex, time)
    }

    /// Modification time the server holds for `id`.
    pub fn remote_time(&self, id: &Uuid) -> Option<f64> {
        self.remote()
            .get(id)
            .expect("Failed to read server record")
            .map(|r| r.time_modified)
    }
}

impl Default for SyncWorld {
    fn default() -> Self {
        Self::new()
    }
}
