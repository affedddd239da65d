//! Fingerprint cleanup sweep.
//!
//! Walks one instance's index with bounded scans, bulk loads each batch, and
//! asks a [`CleanupPolicy`] whether every decodable record should stay. The
//! sweep ends when the scan cursor wraps back to the start.
//!
//! States: `Idle -> Scanning -> Loading -> Processing -> Scanning ... -> Idle | Failed`.
//!
//! Corrupt, absent, and malformed entries are logged and skipped. A store
//! failure aborts the whole sweep; it is not retried mid-sweep.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::storage::{
    FingerprintId, FingerprintStore, LoadOutcome, Result, ScanCursor, StoreError,
};

/// Ids requested per scan step. Small on purpose: bounds memory and keeps each
/// server-side SSCAN/MGET short.
pub const DEFAULT_CLEANUP_BATCH_SIZE: usize = 100;

/// Decision for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    Retain,
    Purge,
}

/// Host-defined retention check.
///
/// A record may be offered more than once per sweep, so implementations must be
/// idempotent.
#[async_trait]
pub trait CleanupPolicy<R>: Send + Sync {
    async fn check(&self, record: &R) -> CleanupAction;
}

/// Where a sweep currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupState {
    Idle,
    Scanning { cursor: ScanCursor },
    Loading { batch: usize },
    Processing { batch: usize },
    Failed { reason: String },
}

/// Counters of one completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Scan steps taken.
    pub batches: usize,
    /// Records offered to the policy.
    pub visited: usize,
    pub retained: usize,
    pub purged: usize,
    /// Indexed ids whose record was gone by the time it was loaded.
    pub absent: usize,
    /// Records that failed to decode.
    pub corrupt: usize,
    /// Index members that are not fingerprint ids.
    pub malformed: usize,
}

/// Drives cleanup sweeps over one store.
pub struct CleanupDriver<S> {
    store: Arc<S>,
    batch_size: usize,
    state: Mutex<CleanupState>,
    sweep: tokio::sync::Mutex<()>,
}

impl<S: FingerprintStore> CleanupDriver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
            state: Mutex::new(CleanupState::Idle),
            sweep: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> CleanupState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_state(&self, state: CleanupState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Run one full sweep. Concurrent calls run one after another.
    pub async fn run<P>(&self, policy: &P) -> Result<CleanupReport>
    where
        P: CleanupPolicy<S::Record> + ?Sized,
    {
        let _sweep = self.sweep.lock().await;
        info!(batch_size = self.batch_size, "Starting fingerprint cleanup");

        match self.sweep(policy).await {
            Ok(report) => {
                self.set_state(CleanupState::Idle);
                info!(
                    batches = report.batches,
                    visited = report.visited,
                    purged = report.purged,
                    corrupt = report.corrupt,
                    "Fingerprint cleanup finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(CleanupState::Failed {
                    reason: e.to_string(),
                });
                warn!(error = %e, "Fingerprint cleanup failed");
                Err(e)
            }
        }
    }

    async fn sweep<P>(&self, policy: &P) -> Result<CleanupReport>
    where
        P: CleanupPolicy<S::Record> + ?Sized,
    {
        let mut report = CleanupReport::default();
        let mut cursor = ScanCursor::START;

        loop {
            self.set_state(CleanupState::Scanning {
                cursor: cursor.clone(),
            });
            let page = self.store.scan_index(&cursor, self.batch_size).await?;
            report.batches += 1;

            let ids = parse_ids(page.ids, &mut report);

            self.set_state(CleanupState::Loading { batch: ids.len() });
            let outcomes = self.store.bulk_load(&ids).await?;

            self.set_state(CleanupState::Processing { batch: ids.len() });
            for (id, outcome) in ids.iter().zip(outcomes) {
                self.process(policy, id, outcome, &mut report).await?;
            }

            cursor = page.cursor;
            if cursor.is_start() {
                return Ok(report);
            }
        }
    }

    async fn process<P>(
        &self,
        policy: &P,
        id: &FingerprintId,
        outcome: LoadOutcome<S::Record>,
        report: &mut CleanupReport,
    ) -> Result<()>
    where
        P: CleanupPolicy<S::Record> + ?Sized,
    {
        let record = match outcome {
            LoadOutcome::Found(record) => record,
            LoadOutcome::Absent => {
                debug!(fingerprint = %id, "Indexed fingerprint vanished before cleanup");
                report.absent += 1;
                return Ok(());
            }
            LoadOutcome::Corrupt(e) => {
                warn!(fingerprint = %id, error = %e, "Skipping malformed fingerprint");
                report.corrupt += 1;
                return Ok(());
            }
        };

        report.visited += 1;
        match policy.check(&record).await {
            CleanupAction::Retain => report.retained += 1,
            CleanupAction::Purge => {
                self.store.delete(id).await?;
                debug!(fingerprint = %id, "Purged fingerprint");
                report.purged += 1;
            }
        }
        Ok(())
    }
}

fn parse_ids(raw: Vec<String>, report: &mut CleanupReport) -> Vec<FingerprintId> {
    raw.into_iter()
        .filter_map(|raw| match FingerprintId::parse(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(member = %raw, error = %e, "Skipping malformed index entry");
                report.malformed += 1;
                None
            }
        })
        .collect()
}

/// Keeps every record. Useful for audits.
pub struct RetainAll;

#[async_trait]
impl<R: Sync> CleanupPolicy<R> for RetainAll {
    async fn check(&self, _record: &R) -> CleanupAction {
        CleanupAction::Retain
    }
}
