//! Redis storage implementation.

mod fingerprint_store;
mod pool;

pub use fingerprint_store::RedisFingerprintStore;
pub use pool::{ConnectionParams, ConnectionPoolManager, PoolStatus, PooledConnection};
