//! MessageSource port - Receive side of the broker.
//!
//! Delivery is at-least-once. A message that is not acknowledged will be
//! delivered again, so everything downstream must be idempotent.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::foundation::DomainError;

/// A message read from the broker, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    /// Broker-specific handle used to acknowledge this delivery.
    pub delivery_id: String,
}

/// Port for consuming messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait up to `wait` for the next message. `None` on timeout.
    async fn receive(&self, wait: Duration) -> Result<Option<DeliveredMessage>, DomainError>;

    /// Mark a message as handled so it is not redelivered.
    async fn acknowledge(&self, message: &DeliveredMessage) -> Result<(), DomainError>;
}
