//! PostgreSQL implementation of UserRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::session::UserCredentials;
use crate::ports::UserRepository;

/// Credential records in the `users` table.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    role: String,
    password_hash: String,
    version_credentials: i64,
}

impl TryFrom<UserRow> for UserCredentials {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = UserId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
        })?;

        Ok(UserCredentials::new(
            id,
            row.username,
            row.role,
            row.password_hash,
            row.version_credentials,
        ))
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserCredentials>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, role, password_hash, version_credentials
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load user", e))?;

        row.map(UserCredentials::try_from).transpose()
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, role, password_hash, version_credentials
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load user by username", e))?;

        row.map(UserCredentials::try_from).transpose()
    }

    async fn increment_version_credentials(&self, id: &UserId) -> Result<i64, DomainError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET version_credentials = version_credentials + 1
            WHERE id = $1
            RETURNING version_credentials
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to bump credential version", e))?;

        version.ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, format!("User {} not found", id))
        })
    }

    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<i64, DomainError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET password_hash = $2,
                version_credentials = version_credentials + 1
            WHERE id = $1
            RETURNING version_credentials
            "#,
        )
        .bind(id.as_str())
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update password", e))?;

        version.ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, format!("User {} not found", id))
        })
    }
}
