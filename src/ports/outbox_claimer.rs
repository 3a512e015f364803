//! OutboxClaimer port - Exclusive batch claims for the relay.
//!
//! A claim locks rows for as long as the returned batch is alive and skips
//! rows another relay instance already holds. This is the only concurrency
//! control between relay instances.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OutboxTaskId};
use crate::domain::outbox::OutboxTask;

/// A set of rows locked by one relay instance.
///
/// Deletes are staged until `commit`. Dropping the batch without committing
/// releases the locks and keeps every row.
#[async_trait]
pub trait ClaimedBatch: Send {
    /// Claimed rows, oldest first.
    fn tasks(&self) -> &[OutboxTask];

    /// Delete a published row. Takes effect on commit.
    async fn delete(&mut self, id: OutboxTaskId) -> Result<(), DomainError>;

    /// Make the deletes durable and release the locks.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discard the deletes and release the locks.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Port for claiming pending outbox rows.
#[async_trait]
pub trait OutboxClaimer: Send + Sync {
    /// Claim up to `limit` unlocked rows ordered by creation time.
    ///
    /// An empty batch means nothing was available. It still has to be
    /// committed or rolled back.
    async fn claim_batch(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>, DomainError>;
}
