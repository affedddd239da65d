//! Mock storage implementation for testing.
//!
//! Emulates the Redis layout in memory: encoded blobs under record keys and a
//! per-instance index set, in a keyspace that several stores can share.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::fingerprint_store::decode_record;
use super::{
    BlobCodec, FingerprintId, FingerprintStore, Fingerprinted, InstanceId, KeyScheme, LoadOutcome,
    Result, ScanCursor, ScanPage, StoreError,
};

/// Marks mock cursor tokens so that no member can be mistaken for the start token.
const CURSOR_PREFIX: char = '>';

#[derive(Default)]
struct KeyspaceData {
    values: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-memory keyspace, cheap to clone and share between mock stores.
#[derive(Clone, Default)]
pub struct MockKeyspace {
    data: Arc<RwLock<KeyspaceData>>,
}

impl MockKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value, bypassing any codec.
    pub async fn set_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data
            .write()
            .await
            .values
            .insert(key.into(), value.into());
    }

    pub async fn get_raw(&self, key: &str) -> Option<String> {
        self.data.read().await.values.get(key).cloned()
    }

    /// Add a raw member to a set.
    pub async fn add_member(&self, key: impl Into<String>, member: impl Into<String>) {
        self.data
            .write()
            .await
            .sets
            .entry(key.into())
            .or_default()
            .insert(member.into());
    }

    pub async fn members(&self, key: &str) -> BTreeSet<String> {
        self.data
            .read()
            .await
            .sets
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn value_count(&self) -> usize {
        self.data.read().await.values.len()
    }
}

/// Mock fingerprint store that keeps encoded fingerprints in memory.
pub struct MockFingerprintStore<C> {
    keyspace: MockKeyspace,
    keys: KeyScheme,
    codec: C,
    unavailable: RwLock<bool>,
}

impl<C: BlobCodec> MockFingerprintStore<C> {
    pub fn new(instance: InstanceId, codec: C) -> Self {
        Self::with_keyspace(MockKeyspace::new(), instance, codec)
    }

    /// Create a store over an existing (possibly shared) keyspace.
    pub fn with_keyspace(keyspace: MockKeyspace, instance: InstanceId, codec: C) -> Self {
        Self {
            keyspace,
            keys: KeyScheme::new(instance),
            codec,
            unavailable: RwLock::new(false),
        }
    }

    pub fn keyspace(&self) -> &MockKeyspace {
        &self.keyspace
    }

    pub fn keys(&self) -> &KeyScheme {
        &self.keys
    }

    /// Make every subsequent operation fail with `Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn check_available(&self) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(StoreError::Unavailable(
                "mock store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: BlobCodec> FingerprintStore for MockFingerprintStore<C> {
    type Record = C::Record;

    async fn save(&self, record: &C::Record) -> Result<()> {
        self.check_available().await?;
        let id = record.fingerprint_id();
        let blob = self.codec.encode(record);

        let mut data = self.keyspace.data.write().await;
        data.values.insert(self.keys.record_key(id), blob);
        data.sets
            .entry(self.keys.index_key())
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    async fn load(&self, id: &FingerprintId) -> Result<Option<C::Record>> {
        self.check_available().await?;
        let Some(blob) = self.keyspace.get_raw(&self.keys.record_key(id)).await else {
            return Ok(None);
        };

        decode_record(&self.codec, id, &blob)
            .map(Some)
            .map_err(|source| StoreError::CorruptRecord {
                id: id.to_string(),
                source,
            })
    }

    async fn delete(&self, id: &FingerprintId) -> Result<()> {
        self.check_available().await?;
        let mut data = self.keyspace.data.write().await;
        data.values.remove(&self.keys.record_key(id));

        let index_key = self.keys.index_key();
        if let Some(index) = data.sets.get_mut(&index_key) {
            index.remove(id.as_str());
            if index.is_empty() {
                data.sets.remove(&index_key);
            }
        }
        Ok(())
    }

    async fn is_ready(&self) -> Result<bool> {
        self.check_available().await?;
        let data = self.keyspace.data.read().await;
        Ok(data
            .sets
            .get(&self.keys.index_key())
            .is_some_and(|index| !index.is_empty()))
    }

    async fn bulk_load(&self, ids: &[FingerprintId]) -> Result<Vec<LoadOutcome<C::Record>>> {
        self.check_available().await?;
        let data = self.keyspace.data.read().await;

        Ok(ids
            .iter()
            .map(|id| match data.values.get(&self.keys.record_key(id)) {
                None => LoadOutcome::Absent,
                Some(blob) => match decode_record(&self.codec, id, blob) {
                    Ok(record) => LoadOutcome::Found(record),
                    Err(e) => LoadOutcome::Corrupt(e),
                },
            })
            .collect())
    }

    /// Ordered scan; the cursor is the last member returned.
    async fn scan_index(&self, cursor: &ScanCursor, batch_size: usize) -> Result<ScanPage> {
        self.check_available().await?;
        let data = self.keyspace.data.read().await;
        let Some(index) = data.sets.get(&self.keys.index_key()) else {
            return Ok(ScanPage {
                cursor: ScanCursor::START,
                ids: Vec::new(),
            });
        };

        let lower = match cursor.as_str().strip_prefix(CURSOR_PREFIX) {
            Some(last) if !cursor.is_start() => Bound::Excluded(last.to_string()),
            _ => Bound::Unbounded,
        };

        let mut remaining = index.range((lower, Bound::Unbounded));
        let ids: Vec<String> = remaining.by_ref().take(batch_size.max(1)).cloned().collect();

        let cursor = match (ids.last(), remaining.next()) {
            (Some(last), Some(_)) => ScanCursor::new(format!("{}{}", CURSOR_PREFIX, last)),
            _ => ScanCursor::START,
        };

        Ok(ScanPage { cursor, ids })
    }
}

#[cfg(test)]
mod tests;
