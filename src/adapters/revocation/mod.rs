//! Revocation store adapters.

mod in_memory;
mod redis;

pub use in_memory::InMemoryRevocationStore;
pub use self::redis::RedisRevocationStore;
