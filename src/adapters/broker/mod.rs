//! Message broker adapters.
//!
//! - `redis_streams` - Redis Streams with consumer groups (production)
//! - `in_memory` - Single-process queue with failure injection (tests)

mod in_memory;
mod redis_streams;

pub use in_memory::InMemoryBroker;
pub use redis_streams::{RedisStreamPublisher, RedisStreamSource, RedisStreamSourceConfig};
