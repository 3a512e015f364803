//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresUserRepository` - Credential records and generation counter
//! - `PostgresOutboxRepository` - Outbox writes and skip-locked batch claims
//! - `PostgresLikedTrackStore` - Idempotent like/dislike relation

mod liked_track_repository;
mod outbox_repository;
mod user_repository;

pub use liked_track_repository::PostgresLikedTrackStore;
pub use outbox_repository::PostgresOutboxRepository;
pub use user_repository::PostgresUserRepository;
