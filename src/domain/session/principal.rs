//! The authenticated principal.
//!
//! Handlers receive an `AuthenticatedUser` as an explicit argument once an
//! access token has been validated. Nothing looks the caller up from request
//! extensions or task-local state.
//!
//! # Example
//!
//! ```ignore
//! let principal = session_manager.authenticate(&access_token)?;
//! record_song_action.handle(&principal, cmd).await?;
//! ```

use super::TokenClaims;
use crate::domain::foundation::{TokenId, UserId};

/// User identity extracted from a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub role: String,
    /// Id of the access token the caller presented.
    pub token_id: TokenId,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, role: impl Into<String>, token_id: TokenId) -> Self {
        Self {
            id,
            role: role.into(),
            token_id,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl From<&TokenClaims> for AuthenticatedUser {
    fn from(claims: &TokenClaims) -> Self {
        Self::new(claims.sub.clone(), claims.role.clone(), claims.jti)
    }
}
