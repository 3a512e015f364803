//! In-memory liked-tracks relation.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, TrackId, UserId};
use crate::domain::outbox::{ApplyOutcome, SongAction, SongActionKind};
use crate::ports::LikedTrackStore;

/// `(user_id, track_id)` pairs with failure injection for the consumer tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLikedTracks {
    rows: Arc<RwLock<HashSet<(UserId, TrackId)>>>,
    failures_remaining: Arc<AtomicU32>,
}

impl InMemoryLikedTracks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` applies with a database error.
    pub fn fail_next_applies(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// All rows, sorted, for state comparisons in tests.
    pub async fn snapshot(&self) -> Vec<(UserId, TrackId)> {
        let mut rows: Vec<_> = self.rows.read().await.iter().cloned().collect();
        rows.sort_by(|a, b| (a.0.as_str(), a.1.as_str()).cmp(&(b.0.as_str(), b.1.as_str())));
        rows
    }
}

#[async_trait]
impl LikedTrackStore for InMemoryLikedTracks {
    async fn apply(&self, action: &SongAction) -> Result<ApplyOutcome, DomainError> {
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Simulated liked_tracks failure",
            ));
        }

        let key = (action.user_id.clone(), action.track_id.clone());
        let mut rows = self.rows.write().await;

        let outcome = match action.action {
            SongActionKind::Like => {
                if rows.insert(key) {
                    ApplyOutcome::Inserted
                } else {
                    ApplyOutcome::AlreadyPresent
                }
            }
            SongActionKind::Dislike => {
                if rows.remove(&key) {
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::AlreadyAbsent
                }
            }
        };

        Ok(outcome)
    }

    async fn is_liked(&self, user_id: &UserId, track_id: &TrackId) -> Result<bool, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .contains(&(user_id.clone(), track_id.clone())))
    }
}
