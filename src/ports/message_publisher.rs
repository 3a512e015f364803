//! MessagePublisher port - Hand a payload to the broker.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Port for publishing raw payloads.
///
/// `publish` returns only after the broker has durably accepted the
/// message. Messages with the same key on the same topic are delivered in
/// publish order.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), DomainError>;
}
