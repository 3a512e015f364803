//! TokenCodec port - Sign and verify session tokens.

use crate::domain::session::{SessionError, TokenClaims};

/// Port for turning claims into signed tokens and back.
///
/// `decode` verifies signature, issuer, `nbf` and `exp`. It does not check
/// the token type or consult any store; that is the session manager's job.
pub trait TokenCodec: Send + Sync {
    /// Sign claims into a compact token.
    ///
    /// # Errors
    ///
    /// - `Fatal` if the signing key is unusable
    fn encode(&self, claims: &TokenClaims) -> Result<String, SessionError>;

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` for any invalid, expired, foreign or malformed token
    fn decode(&self, token: &str) -> Result<TokenClaims, SessionError>;
}
