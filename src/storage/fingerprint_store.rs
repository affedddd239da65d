//! Fingerprint storage interface.

use async_trait::async_trait;

use super::codec::{BlobCodec, DecodeError, Fingerprinted};
use super::keys::FingerprintId;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection could not be acquired, or a command or transaction failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt fingerprint {id}: {source}")]
    CorruptRecord {
        id: String,
        #[source]
        source: DecodeError,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        StoreError::Unavailable(format!("Failed to get connection from pool: {}", e))
    }
}

/// Outcome of reading one slot of a bulk load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<R> {
    Found(R),
    Absent,
    Corrupt(DecodeError),
}

impl<R> LoadOutcome<R> {
    pub fn found(self) -> Option<R> {
        match self {
            LoadOutcome::Found(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, LoadOutcome::Absent)
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, LoadOutcome::Corrupt(_))
    }
}

/// Resume position of an index scan.
///
/// Opaque to callers. [`ScanCursor::START`] both begins a scan and marks its
/// completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanCursor(String);

impl ScanCursor {
    pub const START_TOKEN: &'static str = "0";

    pub const START: ScanCursor = ScanCursor(String::new());

    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token == Self::START_TOKEN {
            Self::START
        } else {
            Self(token)
        }
    }

    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire form of the cursor.
    pub fn as_str(&self) -> &str {
        if self.is_start() {
            Self::START_TOKEN
        } else {
            &self.0
        }
    }
}

impl Default for ScanCursor {
    fn default() -> Self {
        Self::START
    }
}

/// One step of an index scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Where to resume; [`ScanCursor::START`] once the index has wrapped.
    pub cursor: ScanCursor,
    /// Raw index members. Not validated: the index may hold foreign entries.
    pub ids: Vec<String>,
}

/// Interface for fingerprint persistence.
///
/// Implementations:
/// - `RedisFingerprintStore`: Redis storage
/// - `MockFingerprintStore`: in-memory storage for tests
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    type Record: Fingerprinted + Send + Sync;

    /// Store a fingerprint and index it, atomically.
    async fn save(&self, record: &Self::Record) -> Result<()>;

    /// Load a fingerprint.
    ///
    /// Returns `None` if nothing is stored under the id, and
    /// [`StoreError::CorruptRecord`] if the stored blob does not decode.
    async fn load(&self, id: &FingerprintId) -> Result<Option<Self::Record>>;

    /// Delete a fingerprint and its index entry, atomically. Idempotent.
    async fn delete(&self, id: &FingerprintId) -> Result<()>;

    /// True iff this instance's index is non-empty.
    async fn is_ready(&self) -> Result<bool>;

    /// Load a batch of fingerprints in one round trip, preserving input order.
    async fn bulk_load(&self, ids: &[FingerprintId]) -> Result<Vec<LoadOutcome<Self::Record>>>;

    /// Incrementally scan this instance's index.
    ///
    /// `batch_size` bounds the work per call. Ids present for the whole scan
    /// are returned at least once; duplicates are possible.
    async fn scan_index(&self, cursor: &ScanCursor, batch_size: usize) -> Result<ScanPage>;
}

/// Decode a blob stored under `id`, rejecting blobs that belong to another id.
pub(crate) fn decode_record<C: BlobCodec>(
    codec: &C,
    id: &FingerprintId,
    blob: &str,
) -> std::result::Result<C::Record, DecodeError> {
    let record = codec.decode(blob)?;
    if record.fingerprint_id() != id {
        return Err(DecodeError(format!(
            "blob stored under {} holds fingerprint {}",
            id,
            record.fingerprint_id()
        )));
    }
    Ok(record)
}
