//! Redis connection pool with live reconfiguration.
//!
//! Exactly one pool is active at a time. Reconfiguring swaps in a freshly
//! built pool and closes the previous one: its idle connections are dropped
//! immediately, and connections still checked out finish their work and are
//! dropped when released.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use deadpool_redis::{Manager, Pool, PoolError, Runtime};
use redis::{FromRedisValue, IntoConnectionInfo};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::credentials::{resolve_credentials, CredentialProvider, UsernamePassword};
use crate::storage::{Result, StoreError};

/// Attempts at checking out a connection while pools are being swapped.
const ACQUIRE_ATTEMPTS: usize = 3;

/// Fully resolved connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub redis: RedisConfig,
    pub credentials: UsernamePassword,
}

impl ConnectionParams {
    pub fn new(redis: RedisConfig, credentials: UsernamePassword) -> Self {
        Self { redis, credentials }
    }

    /// Resolve the configured credential id and validate the result.
    pub fn resolve(redis: &RedisConfig, provider: &dyn CredentialProvider) -> Result<Self> {
        redis.validate()?;
        let credentials_id = Some(redis.credentials_id.as_str());
        Ok(Self {
            redis: redis.clone(),
            credentials: resolve_credentials(provider, credentials_id),
        })
    }

    /// Address of the server, for logs. Never includes credentials.
    pub fn address(&self) -> String {
        let scheme = if self.redis.tls { "rediss" } else { "redis" };
        let host = if self.redis.host.contains(':') {
            format!("[{}]", self.redis.host)
        } else {
            self.redis.host.clone()
        };
        format!("{}://{}:{}/{}", scheme, host, self.redis.port, self.redis.database)
    }

    /// Build client connection info.
    ///
    /// AUTH is only sent when a password is configured.
    pub fn connection_info(&self) -> Result<redis::ConnectionInfo> {
        self.redis.validate()?;

        let mut info = self.address().as_str().into_connection_info().map_err(|e| {
            StoreError::InvalidConfiguration(format!("Invalid Redis address: {}", e))
        })?;

        if !self.credentials.password.is_empty() {
            info.redis.username = Some(self.credentials.username.clone());
            info.redis.password = Some(self.credentials.password.clone());
        }

        Ok(info)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("address", &self.address())
            .field("username", &self.credentials.username)
            .field("connection_timeout_ms", &self.redis.connection_timeout_ms)
            .field("socket_timeout_ms", &self.redis.socket_timeout_ms)
            .field("max_connections", &self.redis.max_connections)
            .finish()
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
}

/// Connection checked out of a pool.
///
/// Every round trip is bounded by the socket timeout. Dropping the handle
/// returns it to the pool it came from.
pub struct PooledConnection {
    conn: deadpool_redis::Connection,
    socket_timeout: Duration,
}

impl PooledConnection {
    /// Run a single command.
    pub async fn query<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> Result<T> {
        let timeout = self.socket_timeout;
        bounded(timeout, cmd.query_async(&mut self.conn)).await
    }

    /// Run a pipeline; atomic pipelines execute as MULTI/EXEC.
    pub async fn pipeline<T: FromRedisValue>(&mut self, pipe: &redis::Pipeline) -> Result<T> {
        let timeout = self.socket_timeout;
        bounded(timeout, pipe.query_async(&mut self.conn)).await
    }
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Unavailable(format!(
            "Redis did not respond within {}ms",
            timeout.as_millis()
        ))),
    }
}

struct ActivePool {
    pool: Pool,
    params: ConnectionParams,
}

/// Owns the active Redis connection pool.
pub struct ConnectionPoolManager {
    active: RwLock<ActivePool>,
}

impl ConnectionPoolManager {
    /// Create a manager with an initial pool.
    ///
    /// No connection is opened until the first `acquire`.
    pub fn new(params: ConnectionParams) -> Result<Self> {
        let pool = build_pool(&params)?;
        info!(address = %params.address(), "Created Redis connection pool");

        Ok(Self {
            active: RwLock::new(ActivePool { pool, params }),
        })
    }

    /// Replace the active pool.
    ///
    /// Invalid parameters are rejected here and leave the current pool in
    /// place. Unchanged parameters keep the current pool.
    pub async fn configure(&self, params: ConnectionParams) -> Result<()> {
        let mut active = self.active.write().await;

        if active.params == params {
            debug!(address = %params.address(), "Redis parameters unchanged, keeping pool");
            return Ok(());
        }

        let pool = build_pool(&params)?;
        let previous = std::mem::replace(&mut *active, ActivePool { pool, params });
        drop(active);

        previous.pool.close();
        info!(
            previous = %previous.params.address(),
            "Recreated Redis connection pool"
        );

        Ok(())
    }

    /// Check out a connection from the active pool.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let mut last_error = None;

        for _ in 0..ACQUIRE_ATTEMPTS {
            let (pool, socket_timeout) = {
                let active = self.active.read().await;
                (active.pool.clone(), active.params.redis.socket_timeout())
            };

            match pool.get().await {
                Ok(conn) => {
                    return Ok(PooledConnection {
                        conn,
                        socket_timeout,
                    })
                }
                // Swapped out between the read and the checkout.
                Err(PoolError::Closed) => last_error = Some(PoolError::Closed),
                Err(e) => {
                    warn!(error = %e, "Failed to acquire Redis connection");
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map_or_else(
            || StoreError::Unavailable("Redis pool closed".to_string()),
            StoreError::from,
        ))
    }

    /// Parameters of the active pool.
    pub async fn params(&self) -> ConnectionParams {
        self.active.read().await.params.clone()
    }

    pub async fn status(&self) -> PoolStatus {
        let status = self.active.read().await.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
        }
    }

    /// Open a single unpooled connection and PING.
    ///
    /// Connecting authenticates and selects the database, so bad credentials
    /// and database indexes are reported as well.
    pub async fn test_connection(params: &ConnectionParams) -> Result<()> {
        let info = params.connection_info()?;
        let client = redis::Client::open(info).map_err(|e| {
            StoreError::InvalidConfiguration(format!("Invalid Redis parameters: {}", e))
        })?;

        let connect_timeout = params.redis.connection_timeout();
        let mut conn = bounded(connect_timeout, client.get_multiplexed_async_connection()).await?;

        let pong: String = bounded(
            params.redis.socket_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await?;

        debug!(address = %params.address(), reply = %pong, "Redis connection test succeeded");
        Ok(())
    }
}

fn build_pool(params: &ConnectionParams) -> Result<Pool> {
    let info = params.connection_info()?;
    let manager = Manager::new(info).map_err(|e| {
        StoreError::InvalidConfiguration(format!("Invalid Redis parameters: {}", e))
    })?;

    let connect_timeout = Some(params.redis.connection_timeout());
    Pool::builder(manager)
        .max_size(params.redis.max_connections)
        .wait_timeout(connect_timeout)
        .create_timeout(connect_timeout)
        .recycle_timeout(connect_timeout)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| StoreError::InvalidConfiguration(format!("Failed to create pool: {}", e)))
}
