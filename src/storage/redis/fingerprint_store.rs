//! Redis FingerprintStore implementation.
//!
//! Key format: see [`KeyScheme`]. Writes touch the record key and the index
//! set inside one MULTI/EXEC transaction, so a fingerprint id is in the index
//! iff its record exists.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::pool::{ConnectionParams, ConnectionPoolManager};
use crate::storage::fingerprint_store::decode_record;
use crate::storage::{
    BlobCodec, FingerprintId, FingerprintStore, Fingerprinted, InstanceId, KeyScheme, LoadOutcome,
    Result, ScanCursor, ScanPage, StoreError,
};

/// Redis fingerprint store.
///
/// Stores each fingerprint as a string value and indexes it in a per-instance
/// set. Several instances may share one Redis database.
pub struct RedisFingerprintStore<C> {
    pool: Arc<ConnectionPoolManager>,
    keys: KeyScheme,
    codec: C,
    /// Serializes encode + transaction of concurrent saves.
    save_lock: Mutex<()>,
}

impl<C: BlobCodec> RedisFingerprintStore<C> {
    /// Create a store on top of a pool manager.
    ///
    /// # Arguments
    /// * `pool` - Connection pool, possibly shared with other stores
    /// * `instance` - Namespace of this installation
    /// * `codec` - Record serialization
    pub fn new(pool: Arc<ConnectionPoolManager>, instance: InstanceId, codec: C) -> Self {
        Self {
            pool,
            keys: KeyScheme::new(instance),
            codec,
            save_lock: Mutex::new(()),
        }
    }

    /// Create a store with its own pool.
    pub fn connect(params: ConnectionParams, instance: InstanceId, codec: C) -> Result<Self> {
        let pool = ConnectionPoolManager::new(params)?;
        Ok(Self::new(Arc::new(pool), instance, codec))
    }

    pub fn instance_id(&self) -> &InstanceId {
        self.keys.instance()
    }

    pub fn keys(&self) -> &KeyScheme {
        &self.keys
    }

    pub fn pool(&self) -> &Arc<ConnectionPoolManager> {
        &self.pool
    }

    /// Point the store at new connection parameters.
    pub async fn reconfigure(&self, params: ConnectionParams) -> Result<()> {
        self.pool.configure(params).await
    }
}

#[async_trait]
impl<C: BlobCodec> FingerprintStore for RedisFingerprintStore<C> {
    type Record = C::Record;

    async fn save(&self, record: &C::Record) -> Result<()> {
        let id = record.fingerprint_id();
        let _guard = self.save_lock.lock().await;

        let blob = self.codec.encode(record);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(self.keys.record_key(id), blob)
            .ignore()
            .sadd(self.keys.index_key(), id.as_str())
            .ignore();

        let result: Result<()> = async {
            let mut conn = self.pool.acquire().await?;
            conn.pipeline(&pipe).await
        }
        .await;

        match result {
            Ok(()) => {
                debug!(instance = %self.keys.instance(), fingerprint = %id, "Stored fingerprint in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(instance = %self.keys.instance(), fingerprint = %id, error = %e, "Failed to save fingerprint");
                Err(e)
            }
        }
    }

    async fn load(&self, id: &FingerprintId) -> Result<Option<C::Record>> {
        let blob: Option<String> = {
            let mut conn = self.pool.acquire().await?;
            conn.query(redis::cmd("GET").arg(self.keys.record_key(id)))
                .await
                .inspect_err(|e| {
                    warn!(fingerprint = %id, error = %e, "Failed to load fingerprint");
                })?
        };

        let Some(blob) = blob else {
            return Ok(None);
        };

        match decode_record(&self.codec, id, &blob) {
            Ok(record) => {
                debug!(fingerprint = %id, "Retrieved fingerprint from Redis");
                Ok(Some(record))
            }
            Err(source) => {
                warn!(fingerprint = %id, error = %source, "Stored fingerprint is corrupt");
                Err(StoreError::CorruptRecord {
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    async fn delete(&self, id: &FingerprintId) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.keys.record_key(id))
            .ignore()
            .srem(self.keys.index_key(), id.as_str())
            .ignore();

        let mut conn = self.pool.acquire().await?;
        conn.pipeline::<()>(&pipe).await.inspect_err(|e| {
            warn!(fingerprint = %id, error = %e, "Failed to delete fingerprint");
        })?;

        debug!(fingerprint = %id, "Deleted fingerprint from Redis");
        Ok(())
    }

    async fn is_ready(&self) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let count: u64 = conn
            .query(redis::cmd("SCARD").arg(self.keys.index_key()))
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to read fingerprint index"))?;
        Ok(count > 0)
    }

    async fn bulk_load(&self, ids: &[FingerprintId]) -> Result<Vec<LoadOutcome<C::Record>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let record_keys: Vec<String> = ids.iter().map(|id| self.keys.record_key(id)).collect();
        let blobs: Vec<Option<String>> = {
            let mut conn = self.pool.acquire().await?;
            conn.query(redis::cmd("MGET").arg(&record_keys))
                .await
                .inspect_err(|e| warn!(count = ids.len(), error = %e, "Failed to bulk load fingerprints"))?
        };

        if blobs.len() != ids.len() {
            return Err(StoreError::Unavailable(format!(
                "MGET returned {} values for {} keys",
                blobs.len(),
                ids.len()
            )));
        }

        let outcomes = ids
            .iter()
            .zip(blobs)
            .map(|(id, blob)| match blob {
                None => LoadOutcome::Absent,
                Some(blob) => match decode_record(&self.codec, id, &blob) {
                    Ok(record) => LoadOutcome::Found(record),
                    Err(e) => LoadOutcome::Corrupt(e),
                },
            })
            .collect();

        debug!(count = ids.len(), "Bulk loaded fingerprints from Redis");
        Ok(outcomes)
    }

    async fn scan_index(&self, cursor: &ScanCursor, batch_size: usize) -> Result<ScanPage> {
        let mut conn = self.pool.acquire().await?;

        let (next, ids): (String, Vec<String>) = conn
            .query(
                redis::cmd("SSCAN")
                    .arg(self.keys.index_key())
                    .arg(cursor.as_str())
                    .arg("COUNT")
                    .arg(batch_size.max(1)),
            )
            .await
            .inspect_err(|e| warn!(cursor = %cursor.as_str(), error = %e, "Failed to scan fingerprint index"))?;

        debug!(cursor = %cursor.as_str(), next = %next, count = ids.len(), "Scanned fingerprint index");
        Ok(ScanPage {
            cursor: ScanCursor::new(next),
            ids,
        })
    }
}
