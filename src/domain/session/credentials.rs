use crate::domain::foundation::UserId;

/// A user's credential record as held by the credential store.
///
/// `version_credentials` is the generation counter: bumping it invalidates
/// every refresh token minted under an older value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub role: String,
    pub password_hash: String,
    pub version_credentials: i64,
}

impl UserCredentials {
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        role: impl Into<String>,
        password_hash: impl Into<String>,
        version_credentials: i64,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            role: role.into(),
            password_hash: password_hash.into(),
            version_credentials,
        }
    }

    /// Returns true if a token minted under `version` is still current.
    pub fn is_current_version(&self, version: i64) -> bool {
        self.version_credentials == version
    }
}
