//! Fingerprint record shipped with the crate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FingerprintId, Fingerprinted};

/// Build that produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    pub job: String,
    pub number: u32,
}

/// Identity record of one build artifact.
///
/// Tracks where the artifact came from and which builds used it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: FingerprintId,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    #[serde(default)]
    pub original: Option<BuildRef>,
    /// Build numbers that used the artifact, by job name.
    #[serde(default)]
    pub usages: BTreeMap<String, BTreeSet<u32>>,
}

impl FingerprintRecord {
    pub fn new(id: FingerprintId, file_name: impl Into<String>) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            file_name: file_name.into(),
            original: None,
            usages: BTreeMap::new(),
        }
    }

    pub fn with_original(mut self, job: impl Into<String>, number: u32) -> Self {
        self.original = Some(BuildRef {
            job: job.into(),
            number,
        });
        self
    }

    pub fn add_usage(&mut self, job: impl Into<String>, number: u32) {
        self.usages.entry(job.into()).or_default().insert(number);
    }

    /// Drop a job's usages, e.g. after the job was deleted.
    pub fn remove_job(&mut self, job: &str) -> bool {
        self.usages.remove(job).is_some()
    }

    /// True when no build references the artifact any more.
    pub fn is_unused(&self) -> bool {
        self.usages.values().all(BTreeSet::is_empty)
    }
}

impl Fingerprinted for FingerprintRecord {
    fn fingerprint_id(&self) -> &FingerprintId {
        &self.id
    }
}
