//! Redis connection and instance configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::storage::{InstanceId, Result, StoreError};

/// Redis connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis host name or address.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Logical database index (SELECT).
    pub database: i64,
    /// Connect with TLS (rediss://).
    pub tls: bool,
    /// Bound on establishing a connection and on waiting for a pooled one.
    pub connection_timeout_ms: u64,
    /// Bound on every command round trip.
    pub socket_timeout_ms: u64,
    /// Credential id resolved through a `CredentialProvider`. Empty means none.
    pub credentials_id: String,
    /// Maximum pooled connections.
    pub max_connections: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            tls: false,
            connection_timeout_ms: 2000,
            socket_timeout_ms: 2000,
            credentials_id: String::new(),
            max_connections: 8,
        }
    }
}

impl RedisConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Check the connection parameters for values no pool could use.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(StoreError::InvalidConfiguration(msg));

        if self.host.trim().is_empty() {
            return invalid("host must not be empty".to_string());
        }
        if self.host.chars().any(char::is_whitespace) {
            return invalid(format!("host must not contain whitespace: {:?}", self.host));
        }
        if self.port == 0 {
            return invalid("port must be non-zero".to_string());
        }
        if self.database < 0 {
            return invalid(format!("database index must be >= 0, got {}", self.database));
        }
        if self.connection_timeout_ms == 0 || self.socket_timeout_ms == 0 {
            return invalid("timeouts must be greater than zero".to_string());
        }
        if self.max_connections == 0 {
            return invalid("max_connections must be greater than zero".to_string());
        }
        if self.tls && !cfg!(feature = "tls") {
            return invalid("tls requested but the 'tls' feature is not enabled".to_string());
        }
        Ok(())
    }
}

/// Identity of this installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Explicit instance id. Takes precedence over `identity_path`.
    pub id: Option<String>,
    /// Public identity key of the installation; the instance id is derived
    /// from its bytes.
    pub identity_path: Option<PathBuf>,
}

impl InstanceConfig {
    pub fn resolve(&self) -> Result<InstanceId> {
        if let Some(id) = &self.id {
            return InstanceId::new(id.clone());
        }
        if let Some(path) = &self.identity_path {
            let key = std::fs::read(path).map_err(|e| {
                StoreError::InvalidConfiguration(format!(
                    "cannot read identity key {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(InstanceId::from_public_key(&key));
        }
        Err(StoreError::InvalidConfiguration(
            "instance.id or instance.identity_path must be set".to_string(),
        ))
    }
}
