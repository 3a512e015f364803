//! Outbox domain module.
//!
//! The outbox task row and the like/dislike payload it carries from the
//! request path to the liked-tracks relation.

mod song_action;
mod task;

pub use song_action::{ApplyOutcome, PayloadError, SongAction, SongActionKind, SONG_ACTIONS_TOPIC};
pub use task::OutboxTask;
