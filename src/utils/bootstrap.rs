//! Bootstrap utilities for fingerprint binaries.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the FINGERPRINT_LOG environment variable.
///
/// Defaults to "info" level if FINGERPRINT_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Config file path from `--config <path>` or `--config=<path>`.
pub fn parse_config_path() -> Option<String> {
    config_path_from(std::env::args().skip(1))
}

fn config_path_from(mut args: impl Iterator<Item = String>) -> Option<String> {
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Backoff schedule for [`connect_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Attempt a connection with exponential backoff.
///
/// # Arguments
/// * `target` - Human-readable name for logging (e.g. "redis")
/// * `address` - Address being connected to, for logging
/// * `policy` - Attempt count and delays
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connection on success, or the last error once attempts run out.
pub async fn connect_with_retry<T, E, F, Fut>(
    target: &str,
    address: &str,
    policy: RetryPolicy,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(conn) => {
                tracing::info!(target_name = target, address, "Connected");
                return Ok(conn);
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    "Failed to connect to {} at {} (attempt {}/{}): {}. Retrying in {:?}...",
                    target, address, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
            }
            Err(e) => {
                tracing::error!(
                    "Failed to connect to {} at {} after {} attempts: {}",
                    target,
                    address,
                    max_attempts,
                    e
                );
                return Err(e);
            }
        }
    }
}
