//! Command handlers.

mod record_song_action;

pub use record_song_action::{RecordSongActionCommand, RecordSongActionHandler};
