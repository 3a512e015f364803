//! In-memory broker for tests.
//!
//! Acts as both publisher and source. Messages sit in a FIFO queue until
//! received, then in an unacknowledged set until acknowledged. Publishing
//! can be made to fail on demand.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{DeliveredMessage, MessagePublisher, MessageSource};

#[derive(Debug, Default)]
struct BrokerState {
    next_id: u64,
    queue: VecDeque<DeliveredMessage>,
    unacked: HashMap<String, DeliveredMessage>,
    published: Vec<DeliveredMessage>,
    acknowledged: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    arrivals: Notify,
    publish_attempts: AtomicU32,
    failures_remaining: AtomicU32,
    fail_always: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` publish calls with a broker error.
    pub fn fail_next_publishes(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every publish call until turned off.
    pub fn fail_all_publishes(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Total publish calls, including failed ones.
    pub fn publish_attempts(&self) -> u32 {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Every message accepted so far, in publish order.
    pub async fn published(&self) -> Vec<DeliveredMessage> {
        self.state.lock().await.published.clone()
    }

    pub async fn published_count(&self) -> usize {
        self.state.lock().await.published.len()
    }

    /// Delivery ids acknowledged so far.
    pub async fn acknowledged(&self) -> Vec<String> {
        self.state.lock().await.acknowledged.clone()
    }

    pub async fn unacked_count(&self) -> usize {
        self.state.lock().await.unacked.len()
    }

    /// Put every received-but-unacknowledged message back on the queue.
    pub async fn redeliver_unacked(&self) {
        let mut state = self.state.lock().await;
        let mut pending: Vec<_> = state.unacked.drain().map(|(_, m)| m).collect();
        pending.sort_by(|a, b| a.delivery_id.cmp(&b.delivery_id));
        state.queue.extend(pending);
        drop(state);
        self.arrivals.notify_one();
    }

    /// Queue every published message a second time, as a broker would after
    /// losing its offsets.
    pub async fn replay_published(&self) {
        let mut state = self.state.lock().await;
        let replay = state.published.clone();
        state.queue.extend(replay);
        drop(state);
        self.arrivals.notify_one();
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            return Err(DomainError::new(
                ErrorCode::BrokerError,
                "Simulated broker failure",
            ));
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let message = DeliveredMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
            delivery_id: format!("{:020}", state.next_id),
        };
        state.published.push(message.clone());
        state.queue.push_back(message);
        drop(state);

        self.arrivals.notify_one();
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryBroker {
    async fn receive(&self, wait: Duration) -> Result<Option<DeliveredMessage>, DomainError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(message) = state.queue.pop_front() {
                    state
                        .unacked
                        .insert(message.delivery_id.clone(), message.clone());
                    return Ok(Some(message));
                }
            }

            if tokio::time::timeout_at(deadline, self.arrivals.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn acknowledge(&self, message: &DeliveredMessage) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.unacked.remove(&message.delivery_id);
        state.acknowledged.push(message.delivery_id.clone());
        Ok(())
    }
}
