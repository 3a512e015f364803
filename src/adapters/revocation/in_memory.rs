//! In-memory revocation store for tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, TokenId, Timestamp};
use crate::ports::{RevocationStore, RevokeResult};

/// Revocation entries keyed by token id. Expired entries are treated as
/// absent and overwritten on the next revoke.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: RwLock<HashMap<TokenId, Timestamp>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn live_count(&self) -> usize {
        let now = Timestamp::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|exp| exp.is_after(&now))
            .count()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(
        &self,
        token_id: &TokenId,
        expires_at: Timestamp,
    ) -> Result<RevokeResult, DomainError> {
        let now = Timestamp::now();
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.get(token_id) {
            if existing.is_after(&now) {
                return Ok(RevokeResult::AlreadyRevoked);
            }
        }

        // Same floor as the Redis store: never write an entry that is
        // already dead.
        let expires_at = if expires_at.is_after(&now) {
            expires_at
        } else {
            now.plus_secs(1)
        };
        entries.insert(*token_id, expires_at);
        Ok(RevokeResult::Revoked)
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, DomainError> {
        let now = Timestamp::now();
        Ok(self
            .entries
            .read()
            .await
            .get(token_id)
            .is_some_and(|exp| exp.is_after(&now)))
    }
}
