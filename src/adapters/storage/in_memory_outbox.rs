//! In-memory outbox table.
//!
//! Mirrors the PostgreSQL claim semantics: a claim locks the rows it
//! returns, later claims skip locked rows, deletes are staged until commit,
//! and a batch dropped without commit releases its rows untouched.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::foundation::{DomainError, ErrorCode, OutboxTaskId};
use crate::domain::outbox::OutboxTask;
use crate::ports::{ClaimedBatch, OutboxClaimer, OutboxWriter};

#[derive(Debug, Default)]
struct OutboxState {
    rows: Vec<OutboxTask>,
    locked: HashSet<OutboxTaskId>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOutbox {
    state: Arc<Mutex<OutboxState>>,
    unavailable: Arc<AtomicBool>,
}

// A panic while holding the lock leaves the rows intact, so poisoning is
// not treated as fatal.
fn lock(state: &Mutex<OutboxState>) -> MutexGuard<'_, OutboxState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Rows still waiting to be published, oldest first.
    pub fn pending(&self) -> Vec<OutboxTask> {
        let mut rows = lock(&self.state).rows.clone();
        rows.sort_by_key(|t| t.created_at);
        rows
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).rows.len()
    }

    /// Rows currently held by an open batch.
    pub fn locked_count(&self) -> usize {
        lock(&self.state).locked.len()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Outbox table unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxWriter for InMemoryOutbox {
    async fn write(&self, task: &OutboxTask) -> Result<(), DomainError> {
        self.check_available()?;
        lock(&self.state).rows.push(task.clone());
        Ok(())
    }
}

#[async_trait]
impl OutboxClaimer for InMemoryOutbox {
    async fn claim_batch(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>, DomainError> {
        self.check_available()?;
        let mut state = lock(&self.state);

        let mut available: Vec<OutboxTask> = state
            .rows
            .iter()
            .filter(|t| !state.locked.contains(&t.id))
            .cloned()
            .collect();
        available.sort_by_key(|t| t.created_at);
        available.truncate(limit as usize);

        for task in &available {
            state.locked.insert(task.id);
        }

        Ok(Box::new(InMemoryClaimedBatch {
            state: Arc::clone(&self.state),
            tasks: available,
            staged_deletes: Vec::new(),
            finished: false,
        }))
    }
}

struct InMemoryClaimedBatch {
    state: Arc<Mutex<OutboxState>>,
    tasks: Vec<OutboxTask>,
    staged_deletes: Vec<OutboxTaskId>,
    finished: bool,
}

impl InMemoryClaimedBatch {
    fn release(&mut self) {
        let mut state = lock(&self.state);
        for task in &self.tasks {
            state.locked.remove(&task.id);
        }
        self.finished = true;
    }
}

#[async_trait]
impl ClaimedBatch for InMemoryClaimedBatch {
    fn tasks(&self) -> &[OutboxTask] {
        &self.tasks
    }

    async fn delete(&mut self, id: OutboxTaskId) -> Result<(), DomainError> {
        if !self.tasks.iter().any(|t| t.id == id) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Task {} is not part of this batch", id),
            ));
        }
        self.staged_deletes.push(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let mut batch = self;
        {
            let mut state = lock(&batch.state);
            let deletes: HashSet<_> = batch.staged_deletes.iter().copied().collect();
            state.rows.retain(|t| !deletes.contains(&t.id));
        }
        batch.release();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        let mut batch = self;
        batch.release();
        Ok(())
    }
}

impl Drop for InMemoryClaimedBatch {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}
