//! Song-action consumer configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::broker::RedisStreamSourceConfig;
use crate::adapters::IdempotentConsumerConfig;
use crate::domain::outbox::SONG_ACTIONS_TOPIC;

/// Song-action consumer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSettings {
    /// Run the consumer loop in this process
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Topic (stream name) the relay publishes to and the consumer reads
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group name
    #[serde(default = "default_group")]
    pub group: String,

    /// Consumer name within the group; falls back to the instance id
    pub consumer_name: Option<String>,

    /// Longest blocking read, in milliseconds
    #[serde(default = "default_read_wait")]
    pub read_wait_ms: u64,

    /// Interval between re-reads of unacknowledged messages, in seconds
    #[serde(default = "default_pending_retry_after")]
    pub pending_retry_after_secs: u64,

    /// Apply attempts per message before it is skipped
    #[serde(default = "default_apply_attempts")]
    pub apply_attempts: u32,

    /// First apply retry delay in milliseconds, doubled per retry
    #[serde(default = "default_apply_backoff")]
    pub apply_backoff_ms: u64,
}

impl ConsumerSettings {
    pub fn read_wait(&self) -> Duration {
        Duration::from_millis(self.read_wait_ms)
    }

    pub fn to_consumer_config(&self) -> IdempotentConsumerConfig {
        IdempotentConsumerConfig::default()
            .with_read_wait(self.read_wait())
            .with_apply_attempts(self.apply_attempts)
            .with_apply_backoff(Duration::from_millis(self.apply_backoff_ms))
    }

    /// Stream reader settings, naming the consumer `instance_id` unless
    /// `consumer_name` is set.
    pub fn to_source_config(&self, instance_id: &str) -> RedisStreamSourceConfig {
        RedisStreamSourceConfig {
            stream: self.topic.clone(),
            group: self.group.clone(),
            consumer: self
                .consumer_name
                .clone()
                .unwrap_or_else(|| instance_id.to_string()),
            pending_retry_after: Duration::from_secs(self.pending_retry_after_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic.is_empty() {
            return Err(ValidationError::MissingRequired("CONSUMER__TOPIC"));
        }
        if self.group.is_empty() {
            return Err(ValidationError::MissingRequired("CONSUMER__GROUP"));
        }
        if self.read_wait_ms == 0 {
            return Err(ValidationError::InvalidReadWait);
        }
        if self.apply_attempts == 0 {
            return Err(ValidationError::InvalidApplyAttempts);
        }
        Ok(())
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            topic: default_topic(),
            group: default_group(),
            consumer_name: None,
            read_wait_ms: default_read_wait(),
            pending_retry_after_secs: default_pending_retry_after(),
            apply_attempts: default_apply_attempts(),
            apply_backoff_ms: default_apply_backoff(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_topic() -> String {
    SONG_ACTIONS_TOPIC.to_string()
}

fn default_group() -> String {
    "liked-tracks".to_string()
}

fn default_read_wait() -> u64 {
    500
}

fn default_pending_retry_after() -> u64 {
    30
}

fn default_apply_attempts() -> u32 {
    3
}

fn default_apply_backoff() -> u64 {
    100
}
