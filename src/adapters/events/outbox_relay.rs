//! OutboxRelay - Background service draining the outbox into the broker.
//!
//! Second half of the Transactional Outbox Pattern:
//! 1. Handlers write outbox rows in the same transaction as their changes
//! 2. **OutboxRelay claims rows, publishes them, deletes them** ← This module
//!
//! ## Delivery Guarantee
//!
//! A row is deleted inside the claiming transaction only after the broker
//! accepted its payload, and the transaction commits once the whole batch
//! went through. A crash before commit re-delivers the batch; nothing is
//! ever lost. Several relays may run against the same table: the claim
//! skips rows another relay holds.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `batch_size` | 20 | Max rows claimed per cycle |
//! | `empty_poll_backoff` | 5s | Idle wait after an empty claim |
//! | `publish_attempts` | 3 | Tries per row before the batch fails |
//! | `publish_backoff` | 500ms | First retry delay, doubled per retry |
//!
//! ## Failure Policy
//!
//! Exhausting the publish attempts rolls the batch back and stops the relay
//! with `ErrorCode::PublishFailed`. Claim and commit failures are logged
//! and retried after the idle backoff.
//!
//! ## Graceful Shutdown
//!
//! Shutdown is observed between batches and during the idle wait. A batch
//! that has started always runs to commit or rollback.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::outbox::OutboxTask;
use crate::ports::{MessagePublisher, OutboxClaimer};

/// Configuration for the OutboxRelay service.
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// Maximum rows to claim per cycle.
    pub batch_size: u32,

    /// How long to sleep after a claim returned nothing.
    pub empty_poll_backoff: Duration,

    /// Publish attempts per row, including the first.
    pub publish_attempts: u32,

    /// Delay before the first retry. Doubles on each further retry.
    pub publish_backoff: Duration,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            empty_poll_backoff: Duration::from_secs(5),
            publish_attempts: 3,
            publish_backoff: Duration::from_millis(500),
        }
    }
}

impl OutboxRelayConfig {
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_empty_poll_backoff(mut self, backoff: Duration) -> Self {
        self.empty_poll_backoff = backoff;
        self
    }

    pub fn with_publish_attempts(mut self, attempts: u32) -> Self {
        self.publish_attempts = attempts;
        self
    }

    pub fn with_publish_backoff(mut self, backoff: Duration) -> Self {
        self.publish_backoff = backoff;
        self
    }

    /// Delay after failed attempt number `attempt` (1-based).
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.publish_backoff.saturating_mul(factor)
    }
}

/// Background service that moves outbox rows to the broker.
pub struct OutboxRelay {
    claimer: Arc<dyn OutboxClaimer>,
    publisher: Arc<dyn MessagePublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    /// Create a relay with default configuration.
    pub fn new(claimer: Arc<dyn OutboxClaimer>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self::with_config(claimer, publisher, OutboxRelayConfig::default())
    }

    pub fn with_config(
        claimer: Arc<dyn OutboxClaimer>,
        publisher: Arc<dyn MessagePublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        Self {
            claimer,
            publisher,
            config,
        }
    }

    /// Run the relay loop until shutdown or a fatal error.
    ///
    /// # Returns
    ///
    /// `Ok(())` on graceful shutdown, or the fatal error that stopped the
    /// relay.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        tracing::info!(
            batch_size = self.config.batch_size,
            publish_attempts = self.config.publish_attempts,
            "Outbox relay started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.process_batch().await {
                Ok(0) => true,
                Ok(_) => false,
                Err(e) if e.code.is_fatal() => {
                    tracing::error!(error = %e, "Outbox relay stopping on fatal error");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Outbox relay cycle failed, backing off");
                    true
                }
            };

            if idle {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.config.empty_poll_backoff) => {}
                }
            }
        }

        tracing::info!("Outbox relay stopped");
        Ok(())
    }

    /// Claim, publish and delete a single batch.
    ///
    /// Returns the number of rows published and deleted; zero means the
    /// claim came back empty.
    pub async fn process_batch(&self) -> Result<usize, DomainError> {
        let mut batch = self.claimer.claim_batch(self.config.batch_size).await?;

        if batch.tasks().is_empty() {
            batch.rollback().await?;
            tracing::trace!("Outbox empty");
            return Ok(0);
        }

        let tasks = batch.tasks().to_vec();
        for task in &tasks {
            if let Err(e) = self.publish_with_retry(task).await {
                if let Err(rollback_err) = batch.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back outbox batch");
                }
                return Err(e);
            }
            batch.delete(task.id).await?;
        }

        batch.commit().await?;
        tracing::debug!(count = tasks.len(), "Outbox batch relayed");

        Ok(tasks.len())
    }

    /// Run exactly one cycle (for testing).
    pub async fn poll_once(&self) -> Result<usize, DomainError> {
        self.process_batch().await
    }

    async fn publish_with_retry(&self, task: &OutboxTask) -> Result<(), DomainError> {
        let attempts = self.config.publish_attempts.max(1);
        let key = task.key();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.publisher.publish(&task.topic, &key, &task.payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        task_id = %task.id,
                        topic = %task.topic,
                        attempt,
                        error = %e,
                        "Failed to publish outbox task"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay(attempt)).await;
                    }
                }
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Err(DomainError::new(
            ErrorCode::PublishFailed,
            format!("Giving up on outbox task after {} attempts: {}", attempts, cause),
        )
        .with_detail("task_id", task.id.to_string())
        .with_detail("topic", task.topic.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::broker::InMemoryBroker;
    use crate::adapters::storage::InMemoryOutbox;
    use crate::ports::OutboxWriter;

    fn fast_config() -> OutboxRelayConfig {
        OutboxRelayConfig::default()
            .with_publish_backoff(Duration::from_millis(1))
            .with_empty_poll_backoff(Duration::from_millis(10))
    }

    async fn outbox_with(n: usize) -> Arc<InMemoryOutbox> {
        let outbox = Arc::new(InMemoryOutbox::new());
        for i in 0..n {
            let task = OutboxTask::new("songs_actions", format!("payload-{}", i).into_bytes());
            outbox.write(&task).await.unwrap();
        }
        outbox
    }

    #[tokio::test]
    async fn poll_once_publishes_and_deletes_pending_tasks() {
        let outbox = outbox_with(2).await;
        let broker = Arc::new(InMemoryBroker::new());
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        let count = relay.poll_once().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(broker.published_count().await, 2);
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn messages_are_keyed_by_row_id() {
        let outbox = outbox_with(1).await;
        let task_id = outbox.pending()[0].id;
        let broker = Arc::new(InMemoryBroker::new());
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        relay.poll_once().await.unwrap();

        let published = broker.published().await;
        assert_eq!(published[0].key, task_id.to_string());
        assert_eq!(published[0].topic, "songs_actions");
    }

    #[tokio::test]
    async fn poll_once_respects_batch_size() {
        let outbox = outbox_with(5).await;
        let broker = Arc::new(InMemoryBroker::new());
        let relay = OutboxRelay::with_config(
            outbox.clone(),
            broker.clone(),
            fast_config().with_batch_size(2),
        );

        assert_eq!(relay.poll_once().await.unwrap(), 2);
        assert_eq!(relay.poll_once().await.unwrap(), 2);
        assert_eq!(relay.poll_once().await.unwrap(), 1);
        assert_eq!(relay.poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn poll_once_with_no_pending_returns_zero() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let broker = Arc::new(InMemoryBroker::new());
        let relay = OutboxRelay::new(outbox.clone(), broker.clone());

        assert_eq!(relay.poll_once().await.unwrap(), 0);
        assert_eq!(outbox.locked_count(), 0);
    }

    #[tokio::test]
    async fn transient_publish_failures_are_retried() {
        let outbox = outbox_with(1).await;
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_next_publishes(2);
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        assert_eq!(relay.poll_once().await.unwrap(), 1);
        assert_eq!(broker.publish_attempts(), 3);
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_attempts_roll_back_the_whole_batch() {
        let outbox = outbox_with(3).await;
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_all_publishes(true);
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        let err = relay.poll_once().await.unwrap_err();

        assert_eq!(err.code, ErrorCode::PublishFailed);
        assert_eq!(broker.publish_attempts(), 3);
        assert_eq!(outbox.pending_count(), 3);
        assert_eq!(outbox.locked_count(), 0);
    }

    /// Publisher that accepts the first `ok` messages, then fails.
    struct FailAfter {
        ok: std::sync::atomic::AtomicU32,
        inner: InMemoryBroker,
    }

    #[async_trait::async_trait]
    impl MessagePublisher for FailAfter {
        async fn publish(
            &self,
            topic: &str,
            key: &str,
            payload: &[u8],
        ) -> Result<(), DomainError> {
            use std::sync::atomic::Ordering;
            if self
                .ok
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
            {
                return Err(DomainError::new(ErrorCode::BrokerError, "Publish failed"));
            }
            self.inner.publish(topic, key, payload).await
        }
    }

    #[tokio::test]
    async fn published_rows_survive_a_later_failure_in_the_batch() {
        let outbox = outbox_with(2).await;
        let publisher = Arc::new(FailAfter {
            ok: std::sync::atomic::AtomicU32::new(1),
            inner: InMemoryBroker::new(),
        });
        let relay = OutboxRelay::with_config(outbox.clone(), publisher.clone(), fast_config());

        assert!(relay.poll_once().await.is_err());

        // The first row reached the broker but is not deleted: it will be
        // delivered again on the next cycle.
        assert_eq!(publisher.inner.published_count().await, 1);
        assert_eq!(outbox.pending_count(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let outbox = outbox_with(1).await;
        let broker = Arc::new(InMemoryBroker::new());
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(broker.published_count().await, 1);
    }

    #[tokio::test]
    async fn run_returns_fatal_error_when_broker_is_down() {
        let outbox = outbox_with(1).await;
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_all_publishes(true);
        let relay = OutboxRelay::with_config(outbox.clone(), broker.clone(), fast_config());

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = relay.run(shutdown_rx).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::PublishFailed);
        assert_eq!(outbox.pending_count(), 1);
    }

    #[tokio::test]
    async fn run_rides_out_an_unavailable_outbox() {
        let outbox = outbox_with(1).await;
        outbox.set_unavailable(true);
        let broker = Arc::new(InMemoryBroker::new());
        let relay = Arc::new(OutboxRelay::with_config(
            outbox.clone(),
            broker.clone(),
            fast_config(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = relay.clone();
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        outbox.set_unavailable(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(broker.published_count().await, 1);
    }

    #[test]
    fn retry_delay_doubles() {
        let config = OutboxRelayConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(500));
        assert_eq!(config.retry_delay(2), Duration::from_millis(1000));
        assert_eq!(config.retry_delay(3), Duration::from_millis(2000));
    }

    #[test]
    fn config_defaults_match_relay_contract() {
        let config = OutboxRelayConfig::default();

        assert_eq!(config.batch_size, 20);
        assert_eq!(config.empty_poll_backoff, Duration::from_secs(5));
        assert_eq!(config.publish_attempts, 3);
        assert_eq!(config.publish_backoff, Duration::from_millis(500));
    }
}
