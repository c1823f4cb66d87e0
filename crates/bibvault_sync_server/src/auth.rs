//! Authentication gate and credential file.
//!
//! Registered keys live in a flat, newline-delimited file. Each line is
//! either `<hash>` for an admin key or `<hash> <permission json>` for a
//! key restricted to records carrying certain tags. Only hashes are ever
//! stored; raw secrets are hashed on arrival and dropped.
//!
//! The file is scanned linearly on every check, which is fine for the
//! handful of keys a personal or small-team deployment registers.

use crate::error::{ServerError, ServerResult};
use bibvault_sync_protocol::{field, CredentialHash, Permission, Request};
use fs2::FileExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// A parsed credential file line.
#[derive(Debug, Clone, PartialEq)]
struct KeyEntry {
    hash: CredentialHash,
    permission: Permission,
}

impl KeyEntry {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (hash, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(h, r)| (h, r.trim()));
        let hash = match CredentialHash::parse(hash) {
            Ok(hash) => hash,
            Err(_) => {
                warn!("Skipping malformed credential line");
                return None;
            }
        };
        let permission = if rest.is_empty() {
            Permission::admin()
        } else {
            match serde_json::from_str(rest) {
                Ok(permission) => permission,
                Err(e) => {
                    warn!("Skipping credential {} with bad permission: {}", hash.prefix(), e);
                    return None;
                }
            }
        };
        Some(Self { hash, permission })
    }

    fn render(hash: &CredentialHash, permission: Option<&Permission>) -> ServerResult<String> {
        Ok(match permission {
            None => hash.to_string(),
            Some(p) if p.is_admin && p.mandatory_tags.is_empty() => hash.to_string(),
            Some(p) => format!(
                "{hash} {}",
                serde_json::to_string(p).map_err(|e| ServerError::Internal(e.to_string()))?
            ),
        })
    }
}

/// The registered set of credential hashes, backed by a flat file.
///
/// Writers take an exclusive advisory lock on the file, readers a shared
/// one, so a CLI `key` command and a running server can share the file.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// Opens the credential file, creating it (and its directory) if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path })
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hashes and registers a raw secret with admin permission.
    ///
    /// Returns `false` if the key was already registered; registering twice
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn register_key(&self, secret: &str) -> ServerResult<bool> {
        self.register_hash(&CredentialHash::from_secret(secret), None)
    }

    /// Registers a hash, optionally restricted by `permission`.
    ///
    /// Returns `false` if the hash was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn register_hash(
        &self,
        hash: &CredentialHash,
        permission: Option<&Permission>,
    ) -> ServerResult<bool> {
        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;
        let result = (|| -> ServerResult<bool> {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            if contents
                .lines()
                .filter_map(KeyEntry::parse)
                .any(|e| &e.hash == hash)
            {
                return Ok(false);
            }
            let mut line = KeyEntry::render(hash, permission)?;
            if !contents.is_empty() && !contents.ends_with('\n') {
                line.insert(0, '\n');
            }
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.sync_all()?;
            Ok(true)
        })();
        file.unlock()?;
        if matches!(result, Ok(true)) {
            info!("Registered key {}", hash.prefix());
        }
        result
    }

    /// Returns the permission of a registered hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn lookup(&self, hash: &CredentialHash) -> ServerResult<Option<Permission>> {
        let mut file = File::open(&self.path)?;
        file.lock_shared()?;
        let entries = read_entries(&mut file);
        file.unlock()?;
        Ok(entries?
            .into_iter()
            .find(|e| &e.hash == hash)
            .map(|e| e.permission))
    }

    /// Returns true iff the hash is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn verify(&self, hash: &CredentialHash) -> ServerResult<bool> {
        Ok(self.lookup(hash)?.is_some())
    }

    /// Removes every line for `hash`, rewriting the file. Returns whether
    /// anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn revoke(&self, hash: &CredentialHash) -> ServerResult<bool> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.lock_exclusive()?;
        let result = (|| -> ServerResult<bool> {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let kept: Vec<&str> = contents
                .lines()
                .filter(|line| {
                    KeyEntry::parse(line).map_or(true, |entry| &entry.hash != hash)
                })
                .filter(|line| !line.trim().is_empty())
                .collect();
            let removed = kept.len() != contents.lines().filter(|l| !l.trim().is_empty()).count();
            if removed {
                let mut rewritten = kept.join("\n");
                if !rewritten.is_empty() {
                    rewritten.push('\n');
                }
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(rewritten.as_bytes())?;
                file.sync_all()?;
            }
            Ok(removed)
        })();
        file.unlock()?;
        if matches!(result, Ok(true)) {
            info!("Revoked key {}", hash.prefix());
        }
        result
    }

    /// Hashes a raw secret and revokes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn revoke_key(&self, secret: &str) -> ServerResult<bool> {
        self.revoke(&CredentialHash::from_secret(secret))
    }

    /// Generates a random alphanumeric secret, registers it, and returns it.
    /// This is the only time the raw secret is available.
    ///
    /// # Errors
    ///
    /// Returns an error if `length` is zero or the file cannot be written.
    pub fn generate_key(
        &self,
        length: usize,
        permission: Option<&Permission>,
    ) -> ServerResult<Zeroizing<String>> {
        if length == 0 {
            return Err(ServerError::InvalidRequest("key length must be positive".into()));
        }
        let secret: Zeroizing<String> = Zeroizing::new(
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect(),
        );
        self.register_hash(&CredentialHash::from_secret(&secret), permission)?;
        Ok(secret)
    }

    /// Number of registered keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn len(&self) -> ServerResult<usize> {
        let mut file = File::open(&self.path)?;
        file.lock_shared()?;
        let entries = read_entries(&mut file);
        file.unlock()?;
        Ok(entries?.len())
    }

    /// Returns true if no keys are registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn is_empty(&self) -> ServerResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn read_entries(file: &mut File) -> ServerResult<Vec<KeyEntry>> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents.lines().filter_map(KeyEntry::parse).collect())
}

/// Checks the `key` field of every request before anything else runs.
#[derive(Debug, Clone)]
pub struct AuthGate {
    keys: KeyStore,
}

impl AuthGate {
    /// Creates a gate over a key store.
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    /// The underlying key store.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Resolves the request's credential to its permission.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Unauthorized`] if the key is missing,
    /// malformed, or not registered.
    pub fn authorize(&self, request: &Request) -> ServerResult<Permission> {
        let raw = request
            .field(field::KEY)
            .ok_or_else(|| ServerError::Unauthorized("missing key".into()))?;
        let hash = CredentialHash::parse(raw)
            .map_err(|_| ServerError::Unauthorized("malformed key".into()))?;
        match self.keys.lookup(&hash)? {
            Some(permission) => {
                debug!("Authorized key {}", hash.prefix());
                Ok(permission)
            }
            None => {
                warn!("Rejected unregistered key {}", hash.prefix());
                Err(ServerError::Unauthorized("unregistered key".into()))
            }
        }
    }
}
