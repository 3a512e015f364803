//! LikedTrackStore port - The derived `(user_id, track_id)` relation.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TrackId, UserId};
use crate::domain::outbox::{ApplyOutcome, SongAction};

/// Port for the liked-tracks relation.
///
/// `apply` must be idempotent: `like` inserts only if absent, `dislike`
/// deletes unconditionally. Applying the same action twice leaves the same
/// state as applying it once.
#[async_trait]
pub trait LikedTrackStore: Send + Sync {
    /// Apply one action in its own transaction.
    async fn apply(&self, action: &SongAction) -> Result<ApplyOutcome, DomainError>;

    async fn is_liked(&self, user_id: &UserId, track_id: &TrackId) -> Result<bool, DomainError>;
}
