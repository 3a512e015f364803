//! Redis-backed revocation store.
//!
//! Each revoked token id becomes a key with a TTL equal to the token's
//! remaining lifetime, written with `SET NX PX` so that only the first of
//! several concurrent revocations reports `Revoked`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{DomainError, TokenId, Timestamp};
use crate::ports::{RevocationStore, RevokeResult};

/// Shortest TTL written, so an entry for an already-expired token still
/// blocks a racing rotation.
const MIN_TTL_MS: u64 = 1_000;

#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisRevocationStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: "tunewave:revoked".to_string(),
        }
    }

    /// Override the key namespace.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, token_id: &TokenId) -> String {
        format!("{}:{}", self.key_prefix, token_id)
    }
}

fn ttl_millis(expires_at: &Timestamp, now: &Timestamp) -> u64 {
    let remaining = expires_at.remaining_from(now).as_millis();
    u64::try_from(remaining).unwrap_or(u64::MAX).max(MIN_TTL_MS)
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(
        &self,
        token_id: &TokenId,
        expires_at: Timestamp,
    ) -> Result<RevokeResult, DomainError> {
        let key = self.key(token_id);
        let ttl = ttl_millis(&expires_at, &Timestamp::now());
        let mut conn = self.conn.clone();

        // SET returns nil when NX finds an existing key.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| DomainError::cache("Failed to revoke token", e))?;

        let result = match reply {
            Some(_) => RevokeResult::Revoked,
            None => RevokeResult::AlreadyRevoked,
        };
        tracing::debug!(token_id = %token_id, ttl_ms = ttl, ?result, "Token revocation written");

        Ok(result)
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();

        conn.exists(self.key(token_id))
            .await
            .map_err(|e: redis::RedisError| {
                DomainError::cache("Failed to check token revocation", e)
            })
    }
}

impl std::fmt::Debug for RedisRevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRevocationStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
