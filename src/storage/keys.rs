//! Identifiers and the Redis key layout.
//!
//! Every key is namespaced by instance id so that several installations can
//! share one physical keyspace:
//! - Record: `{instance}{fingerprint}` holds the encoded blob
//! - Index: `INSTANCE:{instance}` is a set of the instance's fingerprint ids

use std::fmt;

use sha2::{Digest, Sha256};

use super::{Result, StoreError};

/// Length of a fingerprint id in hex characters (a 128-bit digest).
pub const FINGERPRINT_ID_LEN: usize = 32;

/// Prefix of every per-instance index set.
pub const INDEX_KEY_PREFIX: &str = "INSTANCE:";

/// Content identifier of a fingerprint: 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FingerprintId(String);

impl FingerprintId {
    /// Parse a fingerprint id, normalizing to lowercase.
    pub fn parse(id: &str) -> Result<Self> {
        if id.len() != FINGERPRINT_ID_LEN || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::InvalidIdentifier(format!(
                "fingerprint id must be {} hex characters, got {:?}",
                FINGERPRINT_ID_LEN, id
            )));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Build an id from raw digest bytes.
    pub fn from_digest(digest: [u8; 16]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FingerprintId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for FingerprintId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FingerprintId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Namespace of one installation within the shared keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    /// Use an explicit instance id.
    ///
    /// Must be non-empty and free of `:` and whitespace, which keeps record
    /// keys disjoint from index keys.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(StoreError::InvalidIdentifier(
                "instance id must not be empty".to_string(),
            ));
        }
        if id.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(StoreError::InvalidIdentifier(format!(
                "instance id must not contain ':' or whitespace, got {:?}",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Derive the instance id from the deployment's public identity key.
    ///
    /// First 16 bytes of the SHA-256 digest, lowercase hex.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        Self(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure key mapping for one instance.
///
/// Record keys never contain `:` (instance ids reject it, fingerprint ids are
/// hex), while index keys always do, so the two key families cannot meet.
/// Fingerprint ids are fixed length, so `(instance, fingerprint) -> record_key`
/// is injective across instances as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScheme {
    instance: InstanceId,
}

impl KeyScheme {
    pub fn new(instance: InstanceId) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Key holding the encoded blob of a fingerprint.
    pub fn record_key(&self, id: &FingerprintId) -> String {
        format!("{}{}", self.instance, id)
    }

    /// Key of the set indexing every fingerprint of this instance.
    pub fn index_key(&self) -> String {
        format!("{}{}", INDEX_KEY_PREFIX, self.instance)
    }
}
