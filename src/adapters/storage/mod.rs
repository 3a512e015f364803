//! In-memory storage adapters.
//!
//! Implementations of the storage ports that keep everything in process
//! memory. Used by the test suites and for running the pipeline locally
//! without PostgreSQL.
//!
//! ## Available Adapters
//!
//! - **InMemoryUserRepository** - Credential records
//! - **InMemoryOutbox** - Outbox table with skip-locked claim semantics
//! - **InMemoryLikedTracks** - Liked-tracks relation with failure injection
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{InMemoryOutbox, InMemoryLikedTracks};
//!
//! let outbox = Arc::new(InMemoryOutbox::new());
//! let relay = OutboxRelay::new(outbox.clone(), broker.clone());
//! ```

mod in_memory_liked_tracks;
mod in_memory_outbox;
mod in_memory_user_repository;

pub use in_memory_liked_tracks::InMemoryLikedTracks;
pub use in_memory_outbox::InMemoryOutbox;
pub use in_memory_user_repository::InMemoryUserRepository;
