//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - HS256 token codec
//! - `revocation` - Revoked-token stores (Redis, in-memory)
//! - `broker` - Message broker (Redis Streams, in-memory)
//! - `postgres` - Credential, outbox and liked-tracks tables
//! - `storage` - In-memory stand-ins for the PostgreSQL adapters
//! - `events` - The outbox relay and idempotent consumer loops

pub mod auth;
pub mod broker;
pub mod events;
pub mod postgres;
pub mod revocation;
pub mod storage;

pub use events::{
    ConsumeOutcome, IdempotentConsumer, IdempotentConsumerConfig, OutboxRelay, OutboxRelayConfig,
};
