use crate::domain::foundation::{OutboxTaskId, Timestamp};

/// A pending message in the outbox table.
///
/// Rows are append-only. A row exists exactly as long as its payload has
/// not been acknowledged by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxTask {
    pub id: OutboxTaskId,
    pub topic: String,
    pub payload: Vec<u8>,
    pub created_at: Timestamp,
}

impl OutboxTask {
    /// Creates a new task with a fresh id, stamped now.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: OutboxTaskId::new(),
            topic: topic.into(),
            payload,
            created_at: Timestamp::now(),
        }
    }

    /// Broker key for this task. The row id keeps per-row ordering.
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}
