//! Long-running pipeline services.
//!
//! - `OutboxRelay` - Claims outbox rows and publishes them to the broker
//! - `IdempotentConsumer` - Applies broker messages to the liked-tracks relation
//!
//! Both loops take a `watch::Receiver<bool>` and return once it flips to
//! `true`, after finishing the work in hand.

mod idempotent_consumer;
mod outbox_relay;

pub use idempotent_consumer::{ConsumeOutcome, IdempotentConsumer, IdempotentConsumerConfig};
pub use outbox_relay::{OutboxRelay, OutboxRelayConfig};
