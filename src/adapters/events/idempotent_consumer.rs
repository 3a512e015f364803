//! IdempotentConsumer - Applies relayed song actions to the liked-tracks
//! relation.
//!
//! ## Usage
//!
//! ```ignore
//! let consumer = IdempotentConsumer::new(source, liked_tracks);
//! tokio::spawn(async move { consumer.run(shutdown_rx).await });
//! ```
//!
//! ## How It Works
//!
//! 1. Wait a bounded time for the next message; on timeout, poll again
//! 2. Parse the payload; malformed payloads and unknown actions are logged,
//!    acknowledged and skipped, since they can never succeed
//! 3. Apply the action in its own transaction; `like` inserts if absent,
//!    `dislike` deletes if present
//! 4. Acknowledge after a successful apply
//!
//! ## Error Handling
//!
//! - A failed apply is retried in place, with doubling backoff, before
//!   anything newer is read. Later actions for the same track therefore
//!   never overtake an earlier one
//! - Once the attempts are used up the message is logged, acknowledged and
//!   skipped
//! - One bad message never stops the loop
//! - Duplicate deliveries are harmless because both operations are
//!   idempotent

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::foundation::DomainError;
use crate::domain::outbox::{ApplyOutcome, PayloadError, SongAction};
use crate::ports::{DeliveredMessage, LikedTrackStore, MessageSource};

/// What happened to one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Applied and acknowledged.
    Applied(ApplyOutcome),
    /// Payload could not be parsed. Acknowledged and dropped.
    SkippedMalformed,
    /// Well-formed payload with an action this consumer does not know.
    /// Acknowledged and dropped.
    SkippedUnknownAction,
    /// Every apply attempt failed. Acknowledged and dropped.
    Failed,
}

#[derive(Debug, Clone)]
pub struct IdempotentConsumerConfig {
    /// Longest single wait for a message, and the backoff after a broker
    /// error. Bounds how long shutdown can take.
    pub read_wait: Duration,

    /// Apply attempts per message, including the first.
    pub apply_attempts: u32,

    /// Delay before the first apply retry. Doubles on each further retry.
    pub apply_backoff: Duration,
}

impl Default for IdempotentConsumerConfig {
    fn default() -> Self {
        Self {
            read_wait: Duration::from_millis(500),
            apply_attempts: 3,
            apply_backoff: Duration::from_millis(100),
        }
    }
}

impl IdempotentConsumerConfig {
    pub fn with_read_wait(mut self, wait: Duration) -> Self {
        self.read_wait = wait;
        self
    }

    pub fn with_apply_attempts(mut self, attempts: u32) -> Self {
        self.apply_attempts = attempts;
        self
    }

    pub fn with_apply_backoff(mut self, backoff: Duration) -> Self {
        self.apply_backoff = backoff;
        self
    }

    /// Delay after failed attempt number `attempt` (1-based).
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.apply_backoff.saturating_mul(factor)
    }
}

pub struct IdempotentConsumer {
    source: Arc<dyn MessageSource>,
    store: Arc<dyn LikedTrackStore>,
    config: IdempotentConsumerConfig,
}

impl IdempotentConsumer {
    pub fn new(source: Arc<dyn MessageSource>, store: Arc<dyn LikedTrackStore>) -> Self {
        Self::with_config(source, store, IdempotentConsumerConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn MessageSource>,
        store: Arc<dyn LikedTrackStore>,
        config: IdempotentConsumerConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Consume until shutdown is signalled.
    ///
    /// The message in hand is always finished before the flag is checked.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        tracing::info!(read_wait_ms = self.config.read_wait.as_millis() as u64, "Consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                tracing::warn!(error = %e, "Broker unavailable, backing off");
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.config.read_wait) => {}
                }
            }
        }

        tracing::info!("Consumer stopped");
        Ok(())
    }

    /// Receive and handle at most one message.
    ///
    /// Returns `None` when the wait timed out. Errors come only from the
    /// broker itself (receive or acknowledge).
    pub async fn poll_once(&self) -> Result<Option<ConsumeOutcome>, DomainError> {
        match self.source.receive(self.config.read_wait).await? {
            Some(message) => self.handle(&message).await.map(Some),
            None => Ok(None),
        }
    }

    async fn handle(&self, message: &DeliveredMessage) -> Result<ConsumeOutcome, DomainError> {
        let action = match SongAction::from_payload(&message.payload) {
            Ok(action) => action,
            Err(PayloadError::Malformed(reason)) => {
                tracing::warn!(key = %message.key, %reason, "Skipping malformed message");
                self.source.acknowledge(message).await?;
                return Ok(ConsumeOutcome::SkippedMalformed);
            }
            Err(PayloadError::UnknownAction(action)) => {
                tracing::warn!(key = %message.key, %action, "Skipping message with unknown action");
                self.source.acknowledge(message).await?;
                return Ok(ConsumeOutcome::SkippedUnknownAction);
            }
        };

        let attempts = self.config.apply_attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.apply(&action).await {
                Ok(outcome) => {
                    tracing::debug!(
                        key = %message.key,
                        user_id = %action.user_id,
                        track_id = %action.track_id,
                        action = %action.action,
                        attempt,
                        ?outcome,
                        "Song action applied"
                    );
                    self.source.acknowledge(message).await?;
                    return Ok(ConsumeOutcome::Applied(outcome));
                }
                Err(e) => {
                    tracing::warn!(
                        key = %message.key,
                        user_id = %action.user_id,
                        track_id = %action.track_id,
                        attempt,
                        error = %e,
                        "Failed to apply song action"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(
            key = %message.key,
            user_id = %action.user_id,
            track_id = %action.track_id,
            action = %action.action,
            attempts,
            "Giving up on song action, skipping"
        );
        self.source.acknowledge(message).await?;
        Ok(ConsumeOutcome::Failed)
    }
}
