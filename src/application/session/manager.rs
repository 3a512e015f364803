//! SessionManager - Log in, issue, validate, rotate and revoke session tokens.
//!
//! The manager holds no state of its own. Credential generations and
//! password hashes live in the `UserRepository`, revoked token ids in the
//! `RevocationStore`, and it is safe to share one instance across any
//! number of tasks.
//!
//! bcrypt work runs on the blocking pool so a login never stalls the
//! runtime's worker threads.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{TokenId, Timestamp, UserId};
use crate::domain::session::{
    AuthenticatedUser, IssuedToken, SessionError, TokenClaims, TokenPair, TokenType,
    UserCredentials,
};
use crate::ports::{RevocationStore, RevokeResult, TokenCodec, UserRepository};

/// Lifetimes and issuer for minted tokens, and the bcrypt cost for new
/// password hashes.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            issuer: "tunewave".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

pub struct SessionManager {
    codec: Arc<dyn TokenCodec>,
    users: Arc<dyn UserRepository>,
    revocations: Arc<dyn RevocationStore>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(
        codec: Arc<dyn TokenCodec>,
        users: Arc<dyn UserRepository>,
        revocations: Arc<dyn RevocationStore>,
        config: SessionManagerConfig,
    ) -> Self {
        Self {
            codec,
            users,
            revocations,
            config,
        }
    }

    /// Check a username and password and mint a fresh pair.
    ///
    /// An unknown user, a wrong password and an unreadable stored hash all
    /// fail with `Unauthenticated`.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, SessionError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            tracing::info!(username, "Login for unknown user");
            return Err(SessionError::Unauthenticated);
        };

        let candidate = password.to_string();
        let stored = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &stored))
            .await
            .map_err(|e| SessionError::Fatal(format!("password check aborted: {}", e)))?;

        match verified {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(user_id = %user.id, "Login with wrong password");
                return Err(SessionError::Unauthenticated);
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
                return Err(SessionError::Unauthenticated);
            }
        }

        let pair = self.issue(&user)?;
        tracing::debug!(
            user_id = %user.id,
            token_id = %pair.refresh.claims.jti,
            "User logged in"
        );
        Ok(pair)
    }

    /// Mint an access/refresh pair for `user`.
    ///
    /// Both tokens carry the user's current role and credential generation
    /// and get fresh token ids. Pure signing: nothing is stored.
    pub fn issue(&self, user: &UserCredentials) -> Result<TokenPair, SessionError> {
        let now = Timestamp::now();
        Ok(TokenPair {
            access: self.mint(user, TokenType::Access, now, self.config.access_ttl)?,
            refresh: self.mint(user, TokenType::Refresh, now, self.config.refresh_ttl)?,
        })
    }

    fn mint(
        &self,
        user: &UserCredentials,
        token_type: TokenType,
        now: Timestamp,
        ttl: Duration,
    ) -> Result<IssuedToken, SessionError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = TokenClaims::for_user(user, token_type, &self.config.issuer, now, ttl_secs);
        let token = self.codec.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify an access token. No store is consulted.
    pub fn validate_access(&self, token: &str) -> Result<TokenClaims, SessionError> {
        self.validate(token, TokenType::Access)
    }

    /// Verify a refresh token's signature, issuer, expiry and type.
    ///
    /// Revocation and credential generation are checked by `rotate`.
    pub fn validate_refresh(&self, token: &str) -> Result<TokenClaims, SessionError> {
        self.validate(token, TokenType::Refresh)
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<TokenClaims, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::Unauthenticated);
        }
        let claims = self.codec.decode(token)?;
        claims.require_type(expected)?;
        Ok(claims)
    }

    /// Validate an access token and return the caller's principal.
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, SessionError> {
        let claims = self.validate_access(token)?;
        Ok(AuthenticatedUser::from(&claims))
    }

    /// Exchange a valid refresh token's claims for a new pair.
    ///
    /// The presented token is consumed: it is revoked before the new pair is
    /// minted, so replaying it afterwards fails with `TokenRevoked`. If two
    /// rotations of the same token race, only the one whose revocation write
    /// lands first succeeds.
    pub async fn rotate(&self, claims: &TokenClaims) -> Result<TokenPair, SessionError> {
        claims.require_type(TokenType::Refresh)?;

        if claims.is_expired_at(&Timestamp::now()) {
            tracing::debug!(token_id = %claims.jti, "Expired refresh claims presented");
            return Err(SessionError::Unauthenticated);
        }

        if self.revocations.is_revoked(&claims.jti).await? {
            tracing::warn!(
                token_id = %claims.jti,
                user_id = %claims.sub,
                "Revoked refresh token presented"
            );
            return Err(SessionError::TokenRevoked);
        }

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(SessionError::Unauthenticated)?;

        if !user.is_current_version(claims.version_credentials) {
            tracing::info!(
                user_id = %user.id,
                token_version = claims.version_credentials,
                current_version = user.version_credentials,
                "Refresh token predates credential change"
            );
            return Err(SessionError::CredentialsChanged);
        }

        match self.revocations.revoke(&claims.jti, claims.expires_at()).await? {
            RevokeResult::Revoked => {}
            RevokeResult::AlreadyRevoked => {
                tracing::warn!(
                    token_id = %claims.jti,
                    user_id = %claims.sub,
                    "Concurrent rotation of the same refresh token"
                );
                return Err(SessionError::TokenRevoked);
            }
        }

        let pair = self.issue(&user)?;
        tracing::debug!(
            user_id = %user.id,
            old_token_id = %claims.jti,
            new_token_id = %pair.refresh.claims.jti,
            "Refresh token rotated"
        );
        Ok(pair)
    }

    /// Validate a raw refresh token and rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.validate_refresh(refresh_token)?;
        self.rotate(&claims).await
    }

    /// Revoke a token id until `expires_at`. Revoking twice is not an error.
    pub async fn revoke(
        &self,
        token_id: &TokenId,
        expires_at: Timestamp,
    ) -> Result<(), SessionError> {
        self.revocations.revoke(token_id, expires_at).await?;
        Ok(())
    }

    /// End the session behind a refresh token.
    pub async fn logout(&self, claims: &TokenClaims) -> Result<(), SessionError> {
        claims.require_type(TokenType::Refresh)?;
        self.revoke(&claims.jti, claims.expires_at()).await?;
        tracing::debug!(user_id = %claims.sub, token_id = %claims.jti, "Session logged out");
        Ok(())
    }

    /// Invalidate every outstanding refresh token of a user by bumping the
    /// stored credential generation. Returns the new generation.
    ///
    /// Outstanding access tokens stay valid until they expire.
    pub async fn revoke_all_sessions(&self, user_id: &UserId) -> Result<i64, SessionError> {
        let version = self.users.increment_version_credentials(user_id).await?;
        tracing::info!(user_id = %user_id, version, "All sessions revoked");
        Ok(version)
    }

    /// Replace a user's password. The stored generation is bumped in the
    /// same write, so every refresh token issued before the change fails
    /// with `CredentialsChanged`. Returns the new generation.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        new_password: &str,
    ) -> Result<i64, SessionError> {
        if new_password.is_empty() {
            return Err(SessionError::ValidationFailed(
                "password must not be empty".to_string(),
            ));
        }

        let password = new_password.to_string();
        let cost = self.config.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| SessionError::Fatal(format!("password hashing aborted: {}", e)))?
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Failed to hash password");
                SessionError::Fatal(format!("password hashing failed: {}", e))
            })?;

        let version = self.users.update_password(user_id, &hash).await?;
        tracing::info!(user_id = %user_id, version, "Password changed");
        Ok(version)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::JwtCodec;
    use crate::adapters::revocation::InMemoryRevocationStore;
    use crate::adapters::storage::InMemoryUserRepository;
    use secrecy::SecretString;

    struct Fixture {
        users: Arc<InMemoryUserRepository>,
        revocations: Arc<InMemoryRevocationStore>,
        manager: SessionManager,
    }

    const TEST_COST: u32 = 4;

    async fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        users.insert(alice()).await;
        users.insert(bob("opensesame")).await;
        let revocations = Arc::new(InMemoryRevocationStore::new());
        let codec = Arc::new(JwtCodec::new(
            &SecretString::new("unit-test-secret-with-enough-bytes-1234".to_string()),
            "tunewave",
            0,
        ));
        let manager = SessionManager::new(
            codec,
            users.clone(),
            revocations.clone(),
            SessionManagerConfig {
                bcrypt_cost: TEST_COST,
                ..Default::default()
            },
        );
        Fixture {
            users,
            revocations,
            manager,
        }
    }

    fn alice() -> UserCredentials {
        UserCredentials::new(UserId::new("u1").unwrap(), "alice", "listener", "h", 1)
    }

    fn bob(password: &str) -> UserCredentials {
        let hash = bcrypt::hash(password, TEST_COST).unwrap();
        UserCredentials::new(UserId::new("u2").unwrap(), "bob", "listener", hash, 1)
    }

    #[tokio::test]
    async fn login_with_correct_password_issues_pair() {
        let f = fixture().await;

        let pair = f.manager.login("bob", "opensesame").await.unwrap();

        assert_eq!(pair.refresh.claims.sub.as_str(), "u2");
        assert_eq!(pair.refresh.claims.version_credentials, 1);
        assert!(f.manager.authenticate(&pair.access.token).is_ok());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let f = fixture().await;

        assert_eq!(
            f.manager.login("bob", "wrong").await.unwrap_err(),
            SessionError::Unauthenticated
        );
        assert_eq!(
            f.manager.login("carol", "opensesame").await.unwrap_err(),
            SessionError::Unauthenticated
        );
        // alice's stored hash is not a bcrypt hash
        assert_eq!(
            f.manager.login("alice", "h").await.unwrap_err(),
            SessionError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn login_surfaces_store_outage_as_transient() {
        let f = fixture().await;
        f.users.set_unavailable(true);

        let err = f.manager.login("bob", "opensesame").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn change_password_invalidates_earlier_refresh_tokens() {
        let f = fixture().await;
        let before = f.manager.login("bob", "opensesame").await.unwrap();
        let bob_id = UserId::new("u2").unwrap();

        let version = f.manager.change_password(&bob_id, "newsesame").await.unwrap();
        assert_eq!(version, 2);

        assert_eq!(
            f.manager.rotate(&before.refresh.claims).await.unwrap_err(),
            SessionError::CredentialsChanged
        );
        assert_eq!(
            f.manager.login("bob", "opensesame").await.unwrap_err(),
            SessionError::Unauthenticated
        );

        let after = f.manager.login("bob", "newsesame").await.unwrap();
        assert_eq!(after.refresh.claims.version_credentials, 2);
        assert!(f.manager.rotate(&after.refresh.claims).await.is_ok());
    }

    #[tokio::test]
    async fn change_password_rejects_empty_password() {
        let f = fixture().await;
        let err = f
            .manager
            .change_password(&UserId::new("u2").unwrap(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn change_password_for_unknown_user_fails() {
        let f = fixture().await;
        let err = f
            .manager
            .change_password(&UserId::new("ghost").unwrap(), "pw")
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Unauthenticated);
    }

    #[tokio::test]
    async fn issue_mints_two_distinct_tokens() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        assert_eq!(pair.access.claims.token_type, TokenType::Access);
        assert_eq!(pair.refresh.claims.token_type, TokenType::Refresh);
        assert_ne!(pair.access.claims.jti, pair.refresh.claims.jti);
        assert!(pair.refresh.claims.exp > pair.access.claims.exp);
        assert_eq!(pair.refresh.claims.version_credentials, 1);
    }

    #[tokio::test]
    async fn access_and_refresh_are_not_interchangeable() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        assert!(f.manager.validate_access(&pair.access.token).is_ok());
        assert!(f.manager.validate_refresh(&pair.refresh.token).is_ok());
        assert!(matches!(
            f.manager.validate_access(&pair.refresh.token),
            Err(SessionError::WrongTokenType { .. })
        ));
        assert!(matches!(
            f.manager.validate_refresh(&pair.access.token),
            Err(SessionError::WrongTokenType { .. })
        ));
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let f = fixture().await;
        assert_eq!(
            f.manager.validate_access("  "),
            Err(SessionError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn authenticate_returns_principal() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        let principal = f.manager.authenticate(&pair.access.token).unwrap();

        assert_eq!(principal.id, alice().id);
        assert_eq!(principal.role, "listener");
        assert_eq!(principal.token_id, pair.access.claims.jti);
    }

    #[tokio::test]
    async fn rotate_consumes_the_presented_token() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        let next = f.manager.rotate(&pair.refresh.claims).await.unwrap();

        assert_ne!(next.refresh.claims.jti, pair.refresh.claims.jti);
        assert!(f.revocations.is_revoked(&pair.refresh.claims.jti).await.unwrap());
        assert_eq!(
            f.manager.rotate(&pair.refresh.claims).await.unwrap_err(),
            SessionError::TokenRevoked
        );
    }

    #[tokio::test]
    async fn rotate_rejects_outdated_generation() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        f.manager.revoke_all_sessions(&alice().id).await.unwrap();

        assert_eq!(
            f.manager.rotate(&pair.refresh.claims).await.unwrap_err(),
            SessionError::CredentialsChanged
        );
        // The failed attempt does not consume the token.
        assert!(!f.revocations.is_revoked(&pair.refresh.claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_rejects_expired_claims() {
        let f = fixture().await;
        let issued_at = Timestamp::now().plus_secs(-120);
        let claims =
            TokenClaims::for_user(&alice(), TokenType::Refresh, "tunewave", issued_at, 60);

        assert_eq!(
            f.manager.rotate(&claims).await.unwrap_err(),
            SessionError::Unauthenticated
        );
        assert!(!f.revocations.is_revoked(&claims.jti).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_rejects_access_claims() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        assert!(matches!(
            f.manager.rotate(&pair.access.claims).await,
            Err(SessionError::WrongTokenType { .. })
        ));
    }

    #[tokio::test]
    async fn rotate_for_deleted_user_is_unauthenticated() {
        let f = fixture().await;
        let ghost = UserCredentials::new(UserId::new("ghost").unwrap(), "ghost", "listener", "h", 1);
        let pair = f.manager.issue(&ghost).unwrap();

        assert_eq!(
            f.manager.rotate(&pair.refresh.claims).await.unwrap_err(),
            SessionError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn rotate_surfaces_store_outage_as_transient() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();
        f.users.set_unavailable(true);

        let err = f.manager.rotate(&pair.refresh.claims).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn concurrent_rotations_have_one_winner() {
        let f = Arc::new(fixture().await);
        let pair = f.manager.issue(&alice()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                let claims = pair.refresh.claims.clone();
                tokio::spawn(async move { f.manager.rotate(&claims).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e, SessionError::TokenRevoked),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn logout_revokes_and_is_idempotent() {
        let f = fixture().await;
        let pair = f.manager.issue(&alice()).unwrap();

        f.manager.logout(&pair.refresh.claims).await.unwrap();
        f.manager.logout(&pair.refresh.claims).await.unwrap();

        assert_eq!(
            f.manager.refresh(&pair.refresh.token).await.unwrap_err(),
            SessionError::TokenRevoked
        );
    }

    #[tokio::test]
    async fn revoke_all_sessions_for_unknown_user_fails() {
        let f = fixture().await;
        let err = f
            .manager
            .revoke_all_sessions(&UserId::new("ghost").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Unauthenticated);
    }
}
