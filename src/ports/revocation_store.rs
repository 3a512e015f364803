//! RevocationStore port - Token ids that must be rejected.
//!
//! Entries expire on their own once the revoked token would have expired
//! anyway. Nothing ever deletes an entry explicitly.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TokenId, Timestamp};

/// Outcome of an insert-if-absent revocation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeResult {
    /// This call created the entry.
    Revoked,
    /// An entry already existed.
    AlreadyRevoked,
}

/// Port for the revoked-token store.
///
/// `revoke` must be an atomic insert-if-absent so that exactly one of two
/// racing callers observes `Revoked`. Rotation relies on this to stay
/// single-use.
///
/// # Example
///
/// ```ignore
/// match store.revoke(&claims.jti, claims.expires_at()).await? {
///     RevokeResult::Revoked => { /* we own the rotation */ }
///     RevokeResult::AlreadyRevoked => return Err(SessionError::TokenRevoked),
/// }
/// ```
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Revoke a token until `expires_at`.
    ///
    /// A token that has already expired still gets a short-lived entry, so
    /// the result reflects whether this caller was first.
    async fn revoke(
        &self,
        token_id: &TokenId,
        expires_at: Timestamp,
    ) -> Result<RevokeResult, DomainError>;

    /// Returns true if the token id has a live revocation entry.
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, DomainError>;
}
