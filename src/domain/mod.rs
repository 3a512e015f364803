//! Domain layer containing business types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `session` - Token claims, credential records and the session error taxonomy
//! - `outbox` - Outbox tasks and the like/dislike payloads they carry

pub mod foundation;
pub mod outbox;
pub mod session;
