//! PostgreSQL implementation of LikedTrackStore.
//!
//! `like` is `INSERT ... ON CONFLICT DO NOTHING` and `dislike` is an
//! unconditional `DELETE`, so redelivered actions are harmless.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, TrackId, UserId};
use crate::domain::outbox::{ApplyOutcome, SongAction, SongActionKind};
use crate::ports::LikedTrackStore;

pub struct PostgresLikedTrackStore {
    pool: PgPool,
}

impl PostgresLikedTrackStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikedTrackStore for PostgresLikedTrackStore {
    async fn apply(&self, action: &SongAction) -> Result<ApplyOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let outcome = match action.action {
            SongActionKind::Like => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO liked_tracks (user_id, track_id, liked_at)
                    VALUES ($1, $2, NOW())
                    ON CONFLICT (user_id, track_id) DO NOTHING
                    "#,
                )
                .bind(action.user_id.as_str())
                .bind(action.track_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to insert liked track", e))?;

                if result.rows_affected() > 0 {
                    ApplyOutcome::Inserted
                } else {
                    ApplyOutcome::AlreadyPresent
                }
            }
            SongActionKind::Dislike => {
                let result = sqlx::query(
                    "DELETE FROM liked_tracks WHERE user_id = $1 AND track_id = $2",
                )
                .bind(action.user_id.as_str())
                .bind(action.track_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to delete liked track", e))?;

                if result.rows_affected() > 0 {
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::AlreadyAbsent
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit liked track change", e))?;

        Ok(outcome)
    }

    async fn is_liked(&self, user_id: &UserId, track_id: &TrackId) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM liked_tracks WHERE user_id = $1 AND track_id = $2)",
        )
        .bind(user_id.as_str())
        .bind(track_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to check liked track", e))
    }
}
