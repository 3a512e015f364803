//! Like/dislike payloads relayed through the outbox.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::{TrackId, UserId};

/// Topic the song actions are published on unless configured otherwise.
pub const SONG_ACTIONS_TOPIC: &str = "songs_actions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongActionKind {
    Like,
    Dislike,
}

impl SongActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SongActionKind::Like => "like",
            SongActionKind::Dislike => "dislike",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(SongActionKind::Like),
            "dislike" => Some(SongActionKind::Dislike),
            _ => None,
        }
    }
}

impl fmt::Display for SongActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire body: `{"action", "user_id", "track_id"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongAction {
    pub action: SongActionKind,
    pub user_id: UserId,
    pub track_id: TrackId,
}

/// Why a payload could not be turned into a `SongAction`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

#[derive(Deserialize)]
struct RawSongAction {
    action: String,
    user_id: String,
    track_id: String,
}

impl SongAction {
    pub fn new(action: SongActionKind, user_id: UserId, track_id: TrackId) -> Self {
        Self {
            action,
            user_id,
            track_id,
        }
    }

    /// Parses a broker payload.
    ///
    /// The action string is checked after the JSON shape, so a well-formed
    /// body with an unrecognized action reports `UnknownAction` rather than
    /// `Malformed`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawSongAction = serde_json::from_slice(payload)
            .map_err(|e| PayloadError::Malformed(e.to_string()))?;

        let user_id =
            UserId::new(raw.user_id).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        let track_id =
            TrackId::new(raw.track_id).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        let action = SongActionKind::parse(&raw.action)
            .ok_or(PayloadError::UnknownAction(raw.action))?;

        Ok(Self::new(action, user_id, track_id))
    }

    /// Serializes to the JSON body stored in the outbox.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Effect of applying an action to the liked-tracks relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// `like` added a new row.
    Inserted,
    /// `like` found the row already there.
    AlreadyPresent,
    /// `dislike` removed the row.
    Removed,
    /// `dislike` found nothing to remove.
    AlreadyAbsent,
}

impl ApplyOutcome {
    /// Returns true if the relation changed.
    pub fn changed(&self) -> bool {
        matches!(self, ApplyOutcome::Inserted | ApplyOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_like_payload() {
        let action =
            SongAction::from_payload(br#"{"action":"like","user_id":"u1","track_id":"t1"}"#)
                .unwrap();

        assert_eq!(action.action, SongActionKind::Like);
        assert_eq!(action.user_id.as_str(), "u1");
        assert_eq!(action.track_id.as_str(), "t1");
    }

    #[test]
    fn payload_serializes_to_wire_shape() {
        let action = SongAction::new(
            SongActionKind::Dislike,
            UserId::new("u1").unwrap(),
            TrackId::new("t9").unwrap(),
        );
        let value: serde_json::Value =
            serde_json::from_slice(&action.to_payload().unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"action": "dislike", "user_id": "u1", "track_id": "t9"})
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            SongAction::from_payload(b"not json"),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn missing_field_is_malformed() {
        assert!(matches!(
            SongAction::from_payload(br#"{"action":"like","user_id":"u1"}"#),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn empty_ids_are_malformed() {
        assert!(matches!(
            SongAction::from_payload(br#"{"action":"like","user_id":"","track_id":"t1"}"#),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn unrecognized_action_is_reported_separately() {
        assert_eq!(
            SongAction::from_payload(br#"{"action":"share","user_id":"u1","track_id":"t1"}"#),
            Err(PayloadError::UnknownAction("share".to_string()))
        );
    }

    #[test]
    fn only_insert_and_remove_change_state() {
        assert!(ApplyOutcome::Inserted.changed());
        assert!(ApplyOutcome::Removed.changed());
        assert!(!ApplyOutcome::AlreadyPresent.changed());
        assert!(!ApplyOutcome::AlreadyAbsent.changed());
    }
}
