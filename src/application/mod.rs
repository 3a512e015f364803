//! Application layer - Services and command handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod session;

pub use handlers::{RecordSongActionCommand, RecordSongActionHandler};
pub use session::{SessionManager, SessionManagerConfig, TokenCookie};
