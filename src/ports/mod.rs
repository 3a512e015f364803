//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Session Ports
//!
//! - `UserRepository` - Credential records and the generation counter
//! - `RevocationStore` - Revoked token ids with self-expiring entries
//! - `TokenCodec` - Token signing and verification
//!
//! ## Outbox Ports
//!
//! - `OutboxWriter` - Append tasks on the request path
//! - `OutboxClaimer` / `ClaimedBatch` - Skip-locked batch claims for the relay
//! - `MessagePublisher` - Broker write side
//! - `MessageSource` - Broker read side with explicit acknowledgement
//! - `LikedTrackStore` - Derived like/dislike relation

mod liked_track_store;
mod message_publisher;
mod message_source;
mod outbox_claimer;
mod outbox_writer;
mod revocation_store;
mod token_codec;
mod user_repository;

pub use liked_track_store::LikedTrackStore;
pub use message_publisher::MessagePublisher;
pub use message_source::{DeliveredMessage, MessageSource};
pub use outbox_claimer::{ClaimedBatch, OutboxClaimer};
pub use outbox_writer::OutboxWriter;
pub use revocation_store::{RevocationStore, RevokeResult};
pub use token_codec::TokenCodec;
pub use user_repository::UserRepository;
