//! Outbox relay configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::OutboxRelayConfig;

/// Outbox relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    /// Run the relay loop in this process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Rows claimed per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Sleep after an empty claim, in milliseconds
    #[serde(default = "default_empty_poll_backoff")]
    pub empty_poll_backoff_ms: u64,

    /// Publish attempts per row, including the first
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,

    /// First retry delay in milliseconds, doubled per retry
    #[serde(default = "default_publish_backoff")]
    pub publish_backoff_ms: u64,
}

impl RelaySettings {
    pub fn to_relay_config(&self) -> OutboxRelayConfig {
        OutboxRelayConfig::default()
            .with_batch_size(self.batch_size)
            .with_empty_poll_backoff(Duration::from_millis(self.empty_poll_backoff_ms))
            .with_publish_attempts(self.publish_attempts)
            .with_publish_backoff(Duration::from_millis(self.publish_backoff_ms))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.publish_attempts == 0 {
            return Err(ValidationError::InvalidPublishAttempts);
        }
        Ok(())
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            batch_size: default_batch_size(),
            empty_poll_backoff_ms: default_empty_poll_backoff(),
            publish_attempts: default_publish_attempts(),
            publish_backoff_ms: default_publish_backoff(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_batch_size() -> u32 {
    20
}

fn default_empty_poll_backoff() -> u64 {
    5_000
}

fn default_publish_attempts() -> u32 {
    3
}

fn default_publish_backoff() -> u64 {
    500
}
