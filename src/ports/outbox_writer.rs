//! OutboxWriter port - Write side of the transactional outbox.
//!
//! Business handlers record the message they want delivered as a row in the
//! outbox table, in the same transaction as any direct state change. The
//! relay later moves rows to the broker.
//!
//! ## Pattern Overview
//!
//! 1. Handler writes its change AND the outbox row in one transaction
//! 2. `OutboxRelay` claims pending rows, publishes them, deletes them
//! 3. `IdempotentConsumer` applies each message to derived state

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::outbox::OutboxTask;

/// Port for appending tasks to the outbox.
///
/// # Example
///
/// ```ignore
/// let task = OutboxTask::new("songs_actions", action.to_payload()?);
/// outbox.write(&task).await?;
/// ```
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    /// Append a task. Rows are never updated afterwards.
    async fn write(&self, task: &OutboxTask) -> Result<(), DomainError>;
}
