//! Redis configuration

use redis::aio::MultiplexedConnection;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::revocation::RedisRevocationStore;

/// Redis configuration (revocation list and song-action stream)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Key prefix for revoked token ids
    #[serde(default = "default_revocation_key_prefix")]
    pub revocation_key_prefix: String,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Revocation store on `conn` using the configured key prefix
    pub fn revocation_store(&self, conn: MultiplexedConnection) -> RedisRevocationStore {
        RedisRevocationStore::new(conn).with_key_prefix(self.revocation_key_prefix.clone())
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.revocation_key_prefix.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__REVOCATION_KEY_PREFIX"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout(),
            revocation_key_prefix: default_revocation_key_prefix(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_revocation_key_prefix() -> String {
    "tunewave:revoked".to_string()
}
