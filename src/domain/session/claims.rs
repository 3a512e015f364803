//! Token claims and issued token values.
//!
//! Claims are the signed body of a session token. Both token variants share
//! one shape and are told apart by the `type` claim, so a refresh token can
//! never be accepted where an access token is expected (and vice versa).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{SessionError, UserCredentials};
use crate::domain::foundation::{TokenId, Timestamp, UserId};

/// Token variant, serialized as the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user the token was issued to.
    pub sub: UserId,

    /// Unique token id, the key used by the revocation store.
    pub jti: TokenId,

    /// Role copied from the credential record at issue time.
    pub role: String,

    #[serde(rename = "type")]
    pub token_type: TokenType,

    /// Credential generation the token was minted under.
    pub version_credentials: i64,

    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims {
    /// Builds claims for a fresh token of the given type.
    ///
    /// The token is valid from `now` until `now + ttl_secs`, and gets a new
    /// random `jti`.
    pub fn for_user(
        user: &UserCredentials,
        token_type: TokenType,
        issuer: &str,
        now: Timestamp,
        ttl_secs: i64,
    ) -> Self {
        let iat = now.as_unix_secs();
        Self {
            sub: user.id.clone(),
            jti: TokenId::new(),
            role: user.role.clone(),
            token_type,
            version_credentials: user.version_credentials,
            iat,
            nbf: iat,
            exp: iat + ttl_secs,
            iss: issuer.to_string(),
        }
    }

    /// Fails with `WrongTokenType` unless the token has the expected type.
    pub fn require_type(&self, expected: TokenType) -> Result<(), SessionError> {
        if self.token_type != expected {
            return Err(SessionError::WrongTokenType {
                expected,
                actual: self.token_type,
            });
        }
        Ok(())
    }

    /// Expiry as a timestamp. Out-of-range values clamp to `now`.
    pub fn expires_at(&self) -> Timestamp {
        Timestamp::from_unix_secs(self.exp).unwrap_or_else(Timestamp::now)
    }

    /// Returns true once `now` has reached the expiry.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        now.as_unix_secs() >= self.exp
    }
}

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
}

/// Access and refresh token minted together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserCredentials {
        UserCredentials::new(UserId::new("u1").unwrap(), "alice", "listener", "hash", 3)
    }

    #[test]
    fn for_user_copies_role_and_version() {
        let now = Timestamp::from_unix_secs(1_000).unwrap();
        let claims = TokenClaims::for_user(&user(), TokenType::Refresh, "tunewave", now, 60);

        assert_eq!(claims.sub.as_str(), "u1");
        assert_eq!(claims.role, "listener");
        assert_eq!(claims.version_credentials, 3);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.nbf, 1_000);
        assert_eq!(claims.exp, 1_060);
        assert_eq!(claims.iss, "tunewave");
    }

    #[test]
    fn each_token_gets_a_fresh_id() {
        let now = Timestamp::now();
        let a = TokenClaims::for_user(&user(), TokenType::Access, "tunewave", now, 60);
        let b = TokenClaims::for_user(&user(), TokenType::Access, "tunewave", now, 60);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn require_type_rejects_mismatch() {
        let claims =
            TokenClaims::for_user(&user(), TokenType::Access, "tunewave", Timestamp::now(), 60);

        assert!(claims.require_type(TokenType::Access).is_ok());
        assert!(matches!(
            claims.require_type(TokenType::Refresh),
            Err(SessionError::WrongTokenType {
                expected: TokenType::Refresh,
                actual: TokenType::Access
            })
        ));
    }

    #[test]
    fn type_claim_serializes_lowercase() {
        let claims =
            TokenClaims::for_user(&user(), TokenType::Refresh, "tunewave", Timestamp::now(), 60);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
        assert!(json.get("token_type").is_none());
    }

    #[test]
    fn unknown_type_claim_fails_to_deserialize() {
        let json = serde_json::json!({
            "sub": "u1",
            "jti": TokenId::new().to_string(),
            "role": "listener",
            "type": "id",
            "version_credentials": 1,
            "iat": 0, "nbf": 0, "exp": 10, "iss": "tunewave"
        });
        assert!(serde_json::from_value::<TokenClaims>(json).is_err());
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Timestamp::from_unix_secs(1_000).unwrap();
        let claims = TokenClaims::for_user(&user(), TokenType::Access, "tunewave", now, 10);

        assert!(!claims.is_expired_at(&now.plus_secs(9)));
        assert!(claims.is_expired_at(&now.plus_secs(10)));
    }
}
