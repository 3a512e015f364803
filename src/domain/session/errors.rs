//! Credential error taxonomy.

use thiserror::Error;

use super::TokenType;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors returned by session operations.
///
/// Credential failures (`Unauthenticated` through `CredentialsChanged`) are
/// returned to the caller as-is and never retried: a retry cannot fix a
/// revoked or outdated token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Token missing, malformed, badly signed, expired or from another issuer.
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Wrong token type: expected {expected}, got {actual}")]
    WrongTokenType {
        expected: TokenType,
        actual: TokenType,
    },

    #[error("Token has been revoked")]
    TokenRevoked,

    /// The stored credential generation moved on since the token was issued.
    #[error("Credentials changed since the token was issued")]
    CredentialsChanged,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Credential or revocation store unavailable.
    #[error("Session store unavailable: {0}")]
    Transient(String),

    /// Misconfiguration, such as an unusable signing key.
    #[error("Fatal session error: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Returns true if the user must log in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            SessionError::Unauthenticated
                | SessionError::TokenRevoked
                | SessionError::CredentialsChanged
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Transient(_))
    }
}

impl From<DomainError> for SessionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => SessionError::ValidationFailed(err.message),
            ErrorCode::UserNotFound => SessionError::Unauthenticated,
            code if code.is_transient() => SessionError::Transient(err.to_string()),
            _ => SessionError::Fatal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_outages_become_transient() {
        let err: SessionError = DomainError::new(ErrorCode::CacheError, "down").into();
        assert!(err.is_transient());
        assert!(!err.requires_reauthentication());
    }

    #[test]
    fn signing_key_problems_become_fatal() {
        let err: SessionError = DomainError::new(ErrorCode::SigningKeyInvalid, "bad key").into();
        assert!(matches!(err, SessionError::Fatal(_)));
    }

    #[test]
    fn missing_user_is_unauthenticated() {
        let err: SessionError = DomainError::new(ErrorCode::UserNotFound, "gone").into();
        assert_eq!(err, SessionError::Unauthenticated);
    }

    #[test]
    fn revocation_and_version_mismatch_require_login() {
        assert!(SessionError::TokenRevoked.requires_reauthentication());
        assert!(SessionError::CredentialsChanged.requires_reauthentication());
        assert!(!SessionError::ValidationFailed("x".into()).requires_reauthentication());
    }

    #[test]
    fn wrong_type_display_names_both_types() {
        let err = SessionError::WrongTokenType {
            expected: TokenType::Refresh,
            actual: TokenType::Access,
        };
        assert_eq!(
            err.to_string(),
            "Wrong token type: expected refresh, got access"
        );
    }
}
