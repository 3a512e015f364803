//! Redis Streams broker.
//!
//! One stream per topic. Each entry carries two fields, `key` (the outbox
//! row id) and `payload`. Consumers read through a consumer group and
//! acknowledge with `XACK`; entries that were read but never acknowledged
//! stay in the group's pending list and are read again on the next backlog
//! pass.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::domain::foundation::DomainError;
use crate::ports::{DeliveredMessage, MessagePublisher, MessageSource};

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Publishes payloads with `XADD`.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
}

impl RedisStreamPublisher {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl MessagePublisher for RedisStreamPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();

        let entry_id: String = conn
            .xadd(
                topic,
                "*",
                &[(KEY_FIELD, key.as_bytes()), (PAYLOAD_FIELD, payload)],
            )
            .await
            .map_err(|e: redis::RedisError| DomainError::broker("Failed to publish message", e))?;

        tracing::trace!(topic, key, entry_id = %entry_id, "Message appended to stream");
        Ok(())
    }
}

impl std::fmt::Debug for RedisStreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamPublisher").finish_non_exhaustive()
    }
}

/// Settings for a consumer-group reader.
#[derive(Debug, Clone)]
pub struct RedisStreamSourceConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    /// How long to wait before re-reading unacknowledged entries.
    pub pending_retry_after: Duration,
}

struct BacklogState {
    /// Id after which the current backlog pass continues. `None` when no
    /// pass is running.
    cursor: Option<String>,
    next_pass_at: Instant,
}

/// Reads a stream through a consumer group.
pub struct RedisStreamSource {
    conn: MultiplexedConnection,
    config: RedisStreamSourceConfig,
    backlog: Mutex<BacklogState>,
}

impl RedisStreamSource {
    /// Connects the reader, creating the stream and group when missing.
    ///
    /// The first `receive` starts with a backlog pass so that entries left
    /// pending by a previous run are processed before new ones.
    pub async fn connect(
        conn: MultiplexedConnection,
        config: RedisStreamSourceConfig,
    ) -> Result<Self, DomainError> {
        let mut setup = conn.clone();
        let created: Result<(), redis::RedisError> = setup
            .xgroup_create_mkstream(&config.stream, &config.group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(stream = %config.stream, group = %config.group, "Created consumer group");
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                tracing::debug!(stream = %config.stream, group = %config.group, "Consumer group already exists");
            }
            Err(e) => return Err(DomainError::broker("Failed to create consumer group", e)),
        }

        Ok(Self {
            conn,
            config,
            backlog: Mutex::new(BacklogState {
                cursor: Some("0".to_string()),
                next_pass_at: Instant::now(),
            }),
        })
    }

    async fn read(
        &self,
        start_id: &str,
        block: Option<Duration>,
    ) -> Result<Option<StreamId>, DomainError> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(1);
        if let Some(block) = block {
            options = options.block(block.as_millis().max(1) as usize);
        }

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.config.stream], &[start_id], &options)
            .await
            .map_err(|e: redis::RedisError| DomainError::broker("Failed to read stream", e))?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|k| k.ids.into_iter().next()))
    }

    /// Next entry of the running backlog pass, if one is due.
    async fn next_pending(&self) -> Result<Option<StreamId>, DomainError> {
        let mut backlog = self.backlog.lock().await;

        if backlog.cursor.is_none() {
            if Instant::now() < backlog.next_pass_at {
                return Ok(None);
            }
            backlog.cursor = Some("0".to_string());
        }

        let cursor = backlog.cursor.clone().unwrap_or_else(|| "0".to_string());
        match self.read(&cursor, None).await? {
            Some(entry) => {
                backlog.cursor = Some(entry.id.clone());
                Ok(Some(entry))
            }
            None => {
                backlog.cursor = None;
                backlog.next_pass_at = Instant::now() + self.config.pending_retry_after;
                Ok(None)
            }
        }
    }

    fn to_message(&self, entry: StreamId) -> DeliveredMessage {
        message_from_entry(&self.config.stream, entry)
    }
}

#[async_trait]
impl MessageSource for RedisStreamSource {
    async fn receive(&self, wait: Duration) -> Result<Option<DeliveredMessage>, DomainError> {
        if let Some(entry) = self.next_pending().await? {
            tracing::debug!(entry_id = %entry.id, "Redelivering pending entry");
            return Ok(Some(self.to_message(entry)));
        }

        Ok(self.read(">", Some(wait)).await?.map(|e| self.to_message(e)))
    }

    async fn acknowledge(&self, message: &DeliveredMessage) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();

        let _: i64 = conn
            .xack(&self.config.stream, &self.config.group, &[&message.delivery_id])
            .await
            .map_err(|e: redis::RedisError| DomainError::broker("Failed to acknowledge message", e))?;

        Ok(())
    }
}

impl std::fmt::Debug for RedisStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Convert a stream entry into a delivery.
///
/// A missing field becomes empty rather than an error, so the consumer sees
/// the entry, rejects the payload and acknowledges it instead of stalling on
/// it forever.
fn message_from_entry(stream: &str, entry: StreamId) -> DeliveredMessage {
    let key: Option<String> = entry.get(KEY_FIELD);
    let payload: Option<Vec<u8>> = entry.get(PAYLOAD_FIELD);

    if key.is_none() {
        tracing::warn!(stream, delivery_id = %entry.id, "Stream entry has no key field");
    }
    if payload.is_none() {
        tracing::warn!(stream, delivery_id = %entry.id, "Stream entry has no payload field");
    }

    DeliveredMessage {
        topic: stream.to_string(),
        key: key.unwrap_or_default(),
        payload: payload.unwrap_or_default(),
        delivery_id: entry.id,
    }
}
