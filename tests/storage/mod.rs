//! Shared storage integration tests.
//!
//! Tests the FingerprintStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod fingerprint_store_tests;
