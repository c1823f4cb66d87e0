//! Key management command implementation.

use bibvault_sync_protocol::{CredentialHash, Permission};
use bibvault_sync_server::KeyStore;
use std::path::Path;
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::tag_set;

fn permission(tags: &[String]) -> Option<Permission> {
    let tags = tag_set(tags);
    (!tags.is_empty()).then(|| Permission::restricted(tags))
}

/// Generates and registers a key, returning the raw secret.
pub fn generate(
    keys: &Path,
    length: usize,
    tags: &[String],
) -> Result<Zeroizing<String>, Box<dyn std::error::Error>> {
    let store = KeyStore::open(keys)?;
    let secret = store.generate_key(length, permission(tags).as_ref())?;
    info!("Generated a {length}-character key in {:?}", keys);
    Ok(secret)
}

/// Registers a secret.
pub fn register(keys: &Path, secret: &str, tags: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let store = KeyStore::open(keys)?;
    let hash = CredentialHash::from_secret(secret);
    if !store.register_hash(&hash, permission(tags).as_ref())? {
        warn!("Key {} was already registered", hash.prefix());
    }
    Ok(())
}

/// Revokes a secret.
pub fn delete(keys: &Path, secret: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = KeyStore::open(keys)?;
    if !store.revoke_key(secret)? {
        warn!("Key was not registered");
    }
    Ok(())
}
