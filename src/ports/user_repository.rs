//! UserRepository port - Read and bump credential records.
//!
//! The session manager never owns the credential table. It reads the
//! current `version_credentials` on every rotation and bumps it to log a
//! user out everywhere or when the password changes.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::session::UserCredentials;

/// Port for credential record access.
///
/// Implementations must make `increment_version_credentials` and
/// `update_password` atomic: two concurrent bumps must yield two distinct
/// values.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by id. Returns `None` if not found.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserCredentials>, DomainError>;

    /// Find a user by login name. Returns `None` if not found.
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError>;

    /// Increment the stored generation counter and return the new value.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist
    async fn increment_version_credentials(&self, id: &UserId) -> Result<i64, DomainError>;

    /// Store a new password hash and bump the generation counter in one
    /// write. Returns the new generation.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user does not exist
    async fn update_password(&self, id: &UserId, password_hash: &str)
        -> Result<i64, DomainError>;
}
