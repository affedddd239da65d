//! Blob codec boundary.
//!
//! The engine never looks inside a fingerprint: it hands records to a
//! [`BlobCodec`] and stores whatever string comes back.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use super::FingerprintId;

/// Failure to turn a stored blob back into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unexpected fingerprint blob: {0}")]
pub struct DecodeError(pub String);

/// A record addressable by fingerprint id.
pub trait Fingerprinted {
    fn fingerprint_id(&self) -> &FingerprintId;
}

/// Converts records to and from their stored text form.
pub trait BlobCodec: Send + Sync + 'static {
    type Record: Fingerprinted + Send + Sync + 'static;

    /// Encode a record. Records reaching this boundary are well formed.
    fn encode(&self, record: &Self::Record) -> String;

    /// Decode a blob, failing when it is not a record of the expected shape.
    fn decode(&self, blob: &str) -> Result<Self::Record, DecodeError>;
}

/// JSON codec for any serde record.
pub struct JsonCodec<R> {
    _record: PhantomData<fn() -> R>,
}

impl<R> JsonCodec<R> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<R> Default for JsonCodec<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for JsonCodec<R> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<R> BlobCodec for JsonCodec<R>
where
    R: Serialize + DeserializeOwned + Fingerprinted + Send + Sync + 'static,
{
    type Record = R;

    fn encode(&self, record: &R) -> String {
        // Serializing a plain serde struct with string map keys cannot fail.
        serde_json::to_string(record).unwrap_or_default()
    }

    fn decode(&self, blob: &str) -> Result<R, DecodeError> {
        serde_json::from_str(blob).map_err(|e| DecodeError(e.to_string()))
    }
}
