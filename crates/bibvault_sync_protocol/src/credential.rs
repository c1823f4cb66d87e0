//! Credential hashes and key permissions.

use crate::error::{ProtocolError, ProtocolResult};
use bibvault_store::TagSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// One-way hash of a shared secret: lowercase hex SHA-256.
///
/// This is the only form in which a secret crosses the wire or is stored.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Hashes a raw secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        let digest = Zeroizing::new(Sha256::digest(secret.as_bytes()).to_vec());
        Self(hex::encode(digest.as_slice()))
    }

    /// Parses a hash received from a peer or read from a key file.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCredential`] unless `raw` is 64 hex
    /// digits. Upper-case digits are normalised.
    pub fn parse(raw: &str) -> ProtocolResult<Self> {
        let raw = raw.trim();
        if raw.len() != 64 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidCredential);
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// The hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to log.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialHash({}…)", self.prefix())
    }
}

/// What a registered key may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Admin keys bypass tag restrictions.
    pub is_admin: bool,
    /// Tags a record must carry (counting parents) for this key to touch it.
    #[serde(default)]
    pub mandatory_tags: TagSet,
}

impl Permission {
    /// Unrestricted permission.
    #[must_use]
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            mandatory_tags: TagSet::new(),
        }
    }

    /// Permission limited to records carrying every tag in `tags`.
    #[must_use]
    pub fn restricted(tags: TagSet) -> Self {
        Self {
            is_admin: false,
            mandatory_tags: tags,
        }
    }

    /// Returns true if a record tagged `record_tags` is within reach.
    #[must_use]
    pub fn allows(&self, record_tags: &TagSet) -> bool {
        self.is_admin || record_tags.with_parents().contains_all(&self.mandatory_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_lowercase_sha256_hex() {
        let hash = CredentialHash::from_secret("abc");
        assert_eq!(
            hash.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(CredentialHash::parse(&hash.as_str().to_uppercase()).unwrap(), hash);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(CredentialHash::parse("secret").is_err());
        assert!(CredentialHash::parse(&"z".repeat(64)).is_err());
    }

    #[test]
    fn debug_does_not_print_full_hash() {
        let hash = CredentialHash::from_secret("abc");
        assert!(!format!("{hash:?}").contains(hash.as_str()));
    }

    #[test]
    fn restricted_permission_counts_parent_tags() {
        let permission = Permission::restricted(["shared"].into_iter().collect());
        assert!(permission.allows(&["shared->physics"].into_iter().collect()));
        assert!(!permission.allows(&["private"].into_iter().collect()));
        assert!(Permission::admin().allows(&TagSet::new()));
    }

    #[test]
    fn permission_json_shape() {
        let permission = Permission::restricted(["a"].into_iter().collect());
        let json = serde_json::to_value(&permission).unwrap();
        assert_eq!(json, serde_json::json!({"is_admin": false, "mandatory_tags": ["a"]}));
    }
}
