//! Tunewave - session credentials and the song-action outbox pipeline
//!
//! This crate issues and rotates signed access/refresh tokens with a
//! shared revocation list, and carries like/dislike actions from the
//! request path to the liked-tracks relation through a transactional
//! outbox, a message broker and an idempotent consumer.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
