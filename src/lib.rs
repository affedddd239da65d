//! fingerprint-redis - Redis fingerprint storage
//!
//! Persists build-artifact fingerprints in a shared Redis keyspace, partitioned
//! per installation, with a transactional per-instance index and a bounded,
//! cursor-driven cleanup sweep.

pub mod cleanup;
pub mod config;
pub mod credentials;
pub mod storage;
pub mod utils;
