//! PostgreSQL outbox table.
//!
//! Write side: `OutboxWriter::write` for handlers with no other state to
//! change, `write_in_txn` for handlers that enlist the insert in their own
//! transaction.
//!
//! Relay side: `claim_batch` opens a transaction and selects pending rows
//! with `FOR UPDATE SKIP LOCKED`, so concurrent relays get disjoint rows.
//! The returned batch owns that transaction; dropping it rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, OutboxTaskId, Timestamp};
use crate::domain::outbox::OutboxTask;
use crate::ports::{ClaimedBatch, OutboxClaimer, OutboxWriter};

pub struct PostgresOutboxRepository {
    pool: PgPool,
}

impl PostgresOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a task inside a caller-owned transaction.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut tx = pool.begin().await?;
    /// update_something(&mut tx).await?;
    /// outbox.write_in_txn(&task, &mut tx).await?;
    /// tx.commit().await?;
    /// ```
    pub async fn write_in_txn(
        &self,
        task: &OutboxTask,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), DomainError> {
        insert_task(task)
            .execute(&mut **tx)
            .await
            .map_err(|e| DomainError::database("Failed to write outbox task", e))?;
        Ok(())
    }
}

fn insert_task(
    task: &OutboxTask,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        r#"
        INSERT INTO outbox_tasks (id, topic, payload, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(*task.id.as_uuid())
    .bind(&task.topic)
    .bind(&task.payload)
    .bind(*task.created_at.as_datetime())
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    topic: String,
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl From<OutboxRow> for OutboxTask {
    fn from(row: OutboxRow) -> Self {
        OutboxTask {
            id: OutboxTaskId::from_uuid(row.id),
            topic: row.topic,
            payload: row.payload,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[async_trait]
impl OutboxWriter for PostgresOutboxRepository {
    async fn write(&self, task: &OutboxTask) -> Result<(), DomainError> {
        insert_task(task)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to write outbox task", e))?;
        Ok(())
    }
}

#[async_trait]
impl OutboxClaimer for PostgresOutboxRepository {
    async fn claim_batch(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin outbox transaction", e))?;

        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, topic, payload, created_at
            FROM outbox_tasks
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to claim outbox tasks", e))?;

        Ok(Box::new(PostgresClaimedBatch {
            tx,
            tasks: rows.into_iter().map(OutboxTask::from).collect(),
        }))
    }
}

struct PostgresClaimedBatch {
    tx: Transaction<'static, Postgres>,
    tasks: Vec<OutboxTask>,
}

#[async_trait]
impl ClaimedBatch for PostgresClaimedBatch {
    fn tasks(&self) -> &[OutboxTask] {
        &self.tasks
    }

    async fn delete(&mut self, id: OutboxTaskId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM outbox_tasks WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DomainError::database("Failed to delete outbox task", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit outbox batch", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DomainError::database("Failed to roll back outbox batch", e))
    }
}
