//! Integration tests for the session credential lifecycle.
//!
//! Covers login, rotate, replay, logout, password change and "log out
//! everywhere" against the in-memory credential and revocation stores, with
//! real HS256 signing and bcrypt hashing.

use std::sync::Arc;

use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, HeaderValue};
use secrecy::SecretString;

use tunewave::adapters::auth::JwtCodec;
use tunewave::adapters::revocation::InMemoryRevocationStore;
use tunewave::adapters::storage::InMemoryUserRepository;
use tunewave::application::session::token_from_headers;
use tunewave::application::{SessionManager, SessionManagerConfig, TokenCookie};
use tunewave::domain::foundation::UserId;
use tunewave::domain::session::{SessionError, TokenType, UserCredentials};

const SECRET: &str = "integration-secret-at-least-32-bytes-long";
const PASSWORD: &str = "correct horse battery staple";
const BCRYPT_COST: u32 = 4;

struct Harness {
    users: Arc<InMemoryUserRepository>,
    revocations: Arc<InMemoryRevocationStore>,
    sessions: Arc<SessionManager>,
}

async fn harness() -> Harness {
    let users = Arc::new(InMemoryUserRepository::new());
    users.insert(listener("u1", 1)).await;
    let revocations = Arc::new(InMemoryRevocationStore::new());
    let codec = Arc::new(JwtCodec::new(
        &SecretString::new(SECRET.to_string()),
        "tunewave",
        0,
    ));
    let sessions = Arc::new(SessionManager::new(
        codec,
        users.clone(),
        revocations.clone(),
        SessionManagerConfig {
            bcrypt_cost: BCRYPT_COST,
            ..Default::default()
        },
    ));
    Harness {
        users,
        revocations,
        sessions,
    }
}

fn listener(id: &str, version: i64) -> UserCredentials {
    let hash = bcrypt::hash(PASSWORD, BCRYPT_COST).unwrap();
    UserCredentials::new(UserId::new(id).unwrap(), id, "listener", hash, version)
}

#[tokio::test]
async fn rotation_consumes_the_presented_refresh_token() {
    let h = harness().await;
    let first = h.sessions.login("u1", PASSWORD).await.unwrap();

    let second = h.sessions.refresh(&first.refresh.token).await.unwrap();
    assert_ne!(second.refresh.claims.jti, first.refresh.claims.jti);
    assert_eq!(second.refresh.claims.version_credentials, 1);

    // Replaying the original refresh token is rejected.
    assert_eq!(
        h.sessions.refresh(&first.refresh.token).await.unwrap_err(),
        SessionError::TokenRevoked
    );

    // The new pair keeps working.
    let user = h.sessions.authenticate(&second.access.token).unwrap();
    assert_eq!(user.id.as_str(), "u1");
    assert!(h.sessions.refresh(&second.refresh.token).await.is_ok());
}

#[tokio::test]
async fn credential_bump_invalidates_outstanding_refresh_tokens() {
    let h = harness().await;
    let first = h.sessions.login("u1", PASSWORD).await.unwrap();
    let second = h.sessions.refresh(&first.refresh.token).await.unwrap();

    let version = h
        .sessions
        .revoke_all_sessions(&UserId::new("u1").unwrap())
        .await
        .unwrap();
    assert_eq!(version, 2);

    // Unexpired and unrevoked, but minted under version 1.
    assert_eq!(
        h.sessions.refresh(&second.refresh.token).await.unwrap_err(),
        SessionError::CredentialsChanged
    );

    // Access tokens ride out their lifetime.
    assert!(h.sessions.authenticate(&second.access.token).is_ok());

    // A fresh login under the new generation rotates normally.
    let fresh = h.sessions.login("u1", PASSWORD).await.unwrap();
    assert_eq!(fresh.refresh.claims.version_credentials, 2);
    assert!(h.sessions.refresh(&fresh.refresh.token).await.is_ok());
}

#[tokio::test]
async fn password_change_logs_out_everywhere() {
    let h = harness().await;
    let laptop = h.sessions.login("u1", PASSWORD).await.unwrap();
    let phone = h.sessions.login("u1", PASSWORD).await.unwrap();

    let version = h
        .sessions
        .change_password(&UserId::new("u1").unwrap(), "a new passphrase")
        .await
        .unwrap();
    assert_eq!(version, 2);
    assert_eq!(h.users_current("u1").await.version_credentials, 2);

    for stale in [&laptop, &phone] {
        assert_eq!(
            h.sessions.refresh(&stale.refresh.token).await.unwrap_err(),
            SessionError::CredentialsChanged
        );
    }
    assert_eq!(
        h.sessions.login("u1", PASSWORD).await.unwrap_err(),
        SessionError::Unauthenticated
    );

    let fresh = h.sessions.login("u1", "a new passphrase").await.unwrap();
    assert_eq!(fresh.refresh.claims.version_credentials, 2);
    assert!(h.sessions.refresh(&fresh.refresh.token).await.is_ok());
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
    let h = harness().await;
    assert_eq!(
        h.sessions.login("u1", "guess").await.unwrap_err(),
        SessionError::Unauthenticated
    );
    assert_eq!(
        h.sessions.login("nobody", PASSWORD).await.unwrap_err(),
        SessionError::Unauthenticated
    );
}

#[tokio::test]
async fn concurrent_rotations_of_one_token_have_a_single_winner() {
    let h = harness().await;
    let pair = h.sessions.issue(&listener("u1", 1)).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sessions = h.sessions.clone();
        let token = pair.refresh.token.clone();
        handles.push(tokio::spawn(async move { sessions.refresh(&token).await }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e, SessionError::TokenRevoked),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(h.revocations.live_count().await, 1);
}

#[tokio::test]
async fn logout_revokes_refresh_token_and_is_idempotent() {
    let h = harness().await;
    let pair = h.sessions.issue(&listener("u1", 1)).unwrap();
    let claims = h.sessions.validate_refresh(&pair.refresh.token).unwrap();

    h.sessions.logout(&claims).await.unwrap();
    h.sessions.logout(&claims).await.unwrap();

    assert_eq!(
        h.sessions.refresh(&pair.refresh.token).await.unwrap_err(),
        SessionError::TokenRevoked
    );
}

#[tokio::test]
async fn token_types_are_not_interchangeable() {
    let h = harness().await;
    let pair = h.sessions.issue(&listener("u1", 1)).unwrap();

    assert_eq!(
        h.sessions.refresh(&pair.access.token).await.unwrap_err(),
        SessionError::WrongTokenType {
            expected: TokenType::Refresh,
            actual: TokenType::Access,
        }
    );
    assert!(h.sessions.authenticate(&pair.refresh.token).is_err());
}

#[tokio::test]
async fn deleted_user_cannot_rotate() {
    let h = harness().await;
    let ghost = listener("ghost", 1);
    let pair = h.sessions.issue(&ghost).unwrap();

    assert_eq!(
        h.sessions.refresh(&pair.refresh.token).await.unwrap_err(),
        SessionError::Unauthenticated
    );
}

#[tokio::test]
async fn credential_store_outage_is_transient() {
    let h = harness().await;
    let pair = h.sessions.issue(&listener("u1", 1)).unwrap();

    h.users.set_unavailable(true);
    let err = h.sessions.refresh(&pair.refresh.token).await.unwrap_err();
    assert!(err.is_transient());

    // Nothing was revoked, so the same token works once the store is back.
    h.users.set_unavailable(false);
    assert!(h.sessions.refresh(&pair.refresh.token).await.is_ok());
}

#[tokio::test]
async fn tokens_are_read_from_headers_then_cookies() {
    let h = harness().await;
    let pair = h.sessions.issue(&listener("u1", 1)).unwrap();

    let mut bearer = HeaderMap::new();
    bearer.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", pair.access.token)).unwrap(),
    );
    let token = token_from_headers(&bearer, TokenCookie::Access).unwrap();
    assert!(h.sessions.authenticate(&token).is_ok());

    let mut cookies = HeaderMap::new();
    cookies.insert(
        COOKIE,
        HeaderValue::from_str(&format!("theme=dark; refresh={}", pair.refresh.token)).unwrap(),
    );
    let token = token_from_headers(&cookies, TokenCookie::Refresh).unwrap();
    assert!(h.sessions.refresh(&token).await.is_ok());

    assert_eq!(
        token_from_headers(&HeaderMap::new(), TokenCookie::RefreshForLogout).unwrap_err(),
        SessionError::Unauthenticated
    );
}

impl Harness {
    async fn users_current(&self, id: &str) -> UserCredentials {
        use tunewave::ports::UserRepository;
        self.users
            .find_by_id(&UserId::new(id).unwrap())
            .await
            .unwrap()
            .unwrap()
    }
}
