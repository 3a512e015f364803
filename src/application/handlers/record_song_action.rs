//! RecordSongActionHandler - Command handler for like/dislike requests.
//!
//! Writes the action to the outbox instead of touching the liked-tracks
//! relation directly. The relay and consumer carry it the rest of the way.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, TrackId};
use crate::domain::outbox::{OutboxTask, SongAction, SongActionKind, SONG_ACTIONS_TOPIC};
use crate::domain::session::AuthenticatedUser;
use crate::ports::OutboxWriter;

/// Command to like or dislike a track.
///
/// Carries no user id: the acting user always comes from the principal.
#[derive(Debug, Clone)]
pub struct RecordSongActionCommand {
    pub action: SongActionKind,
    pub track_id: TrackId,
}

/// Handler for song actions.
pub struct RecordSongActionHandler {
    outbox: Arc<dyn OutboxWriter>,
    topic: String,
}

impl RecordSongActionHandler {
    pub fn new(outbox: Arc<dyn OutboxWriter>) -> Self {
        Self {
            outbox,
            topic: SONG_ACTIONS_TOPIC.to_string(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub async fn handle(
        &self,
        principal: &AuthenticatedUser,
        cmd: RecordSongActionCommand,
    ) -> Result<OutboxTask, DomainError> {
        let action = SongAction::new(cmd.action, principal.id.clone(), cmd.track_id);
        let payload = action.to_payload().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to encode song action: {}", e),
            )
        })?;

        let task = OutboxTask::new(self.topic.clone(), payload);
        self.outbox.write(&task).await?;

        tracing::debug!(
            task_id = %task.id,
            user_id = %action.user_id,
            track_id = %action.track_id,
            action = %action.action,
            "Song action queued"
        );

        Ok(task)
    }
}
