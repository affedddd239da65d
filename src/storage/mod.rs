//! Storage implementations.
//!
//! [`FingerprintStore`] is the storage strategy owned by callers; backends:
//! - [`RedisFingerprintStore`]: Redis, shared across instances
//! - [`MockFingerprintStore`]: in memory, for tests

mod codec;
mod fingerprint_store;
mod keys;
mod record;

pub mod mock;
pub mod redis;

pub use codec::{BlobCodec, DecodeError, Fingerprinted, JsonCodec};
pub use fingerprint_store::{
    FingerprintStore, LoadOutcome, Result, ScanCursor, ScanPage, StoreError,
};
pub use keys::{FingerprintId, InstanceId, KeyScheme, FINGERPRINT_ID_LEN, INDEX_KEY_PREFIX};
pub use mock::MockFingerprintStore;
pub use record::{BuildRef, FingerprintRecord};
pub use self::redis::{ConnectionParams, ConnectionPoolManager, RedisFingerprintStore};
