//! fingerprint-audit: sweep one instance's fingerprints in Redis
//!
//! Connects with the configured Redis parameters, reports whether the
//! instance's index is populated, and walks it with the cleanup driver.
//!
//! ## Configuration
//! - `--config <path>` or FINGERPRINT_CONFIG: YAML configuration file
//! - FINGERPRINT__REDIS__HOST etc.: environment overrides
//! - FINGERPRINT_LOG: tracing filter (default "info")
//! - FINGERPRINT_AUDIT_PURGE_OLDER_THAN_DAYS: when set, purge fingerprints
//!   older than this many days that no build uses any more. Without it the
//!   sweep only reports.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use fingerprint_redis::cleanup::{CleanupAction, CleanupDriver, CleanupPolicy, RetainAll};
use fingerprint_redis::config::Config;
use fingerprint_redis::credentials::StaticCredentialProvider;
use fingerprint_redis::storage::{
    ConnectionParams, ConnectionPoolManager, FingerprintRecord, FingerprintStore, JsonCodec,
    RedisFingerprintStore,
};
use fingerprint_redis::utils::bootstrap::{
    connect_with_retry, init_tracing, parse_config_path, RetryPolicy,
};

const PURGE_ENV_VAR: &str = "FINGERPRINT_AUDIT_PURGE_OLDER_THAN_DAYS";

/// Purges unused fingerprints created before a cutoff.
struct PurgeStale {
    cutoff: DateTime<Utc>,
}

#[async_trait]
impl CleanupPolicy<FingerprintRecord> for PurgeStale {
    async fn check(&self, record: &FingerprintRecord) -> CleanupAction {
        if record.timestamp < self.cutoff && record.is_unused() {
            CleanupAction::Purge
        } else {
            CleanupAction::Retain
        }
    }
}

fn purge_policy() -> Result<Option<PurgeStale>, Box<dyn std::error::Error>> {
    let Ok(raw) = std::env::var(PURGE_ENV_VAR) else {
        return Ok(None);
    };
    let days: i64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("{} must be a number of days: {}", PURGE_ENV_VAR, e))?;
    Ok(Some(PurgeStale {
        cutoff: Utc::now() - Duration::days(days),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let instance = config.instance.resolve()?;
    let provider = StaticCredentialProvider::from(config.credentials.clone());
    let params = ConnectionParams::resolve(&config.redis, &provider)?;
    let address = params.address();

    info!(instance = %instance, address = %address, "Starting fingerprint audit");

    connect_with_retry("redis", &address, RetryPolicy::default(), || {
        ConnectionPoolManager::test_connection(&params)
    })
    .await?;

    let store = Arc::new(RedisFingerprintStore::connect(
        params,
        instance,
        JsonCodec::<FingerprintRecord>::new(),
    )?);

    if !store.is_ready().await? {
        info!("No fingerprints recorded for this instance");
        return Ok(());
    }

    let driver = CleanupDriver::new(store.clone());
    let report = match purge_policy()? {
        Some(policy) => {
            info!(cutoff = %policy.cutoff, "Purging stale unused fingerprints");
            driver.run(&policy).await?
        }
        None => driver.run(&RetainAll).await?,
    };

    println!("batches:   {}", report.batches);
    println!("visited:   {}", report.visited);
    println!("retained:  {}", report.retained);
    println!("purged:    {}", report.purged);
    println!("absent:    {}", report.absent);
    println!("corrupt:   {}", report.corrupt);
    println!("malformed: {}", report.malformed);

    Ok(())
}
