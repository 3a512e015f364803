//! Token signing configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::application::session::SessionManagerConfig;

/// Shortest HS256 key accepted in production.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

/// Token signing configuration
///
/// Not `Clone`: the signing key stays in one place and is only borrowed
/// when the codec is built.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key
    pub jwt_secret: SecretString,

    /// `iss` claim written into and required on every token
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,

    /// bcrypt work factor for new password hashes
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// Session manager settings derived from this section
    pub fn to_session_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            issuer: self.issuer.clone(),
            access_ttl: self.access_ttl(),
            refresh_ttl: self.refresh_ttl(),
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    /// Validate authentication configuration
    ///
    /// Production additionally requires a key of at least
    /// [`MIN_PRODUCTION_SECRET_BYTES`].
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret_len = self.jwt_secret.expose_secret().len();
        if secret_len == 0 {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if *environment == Environment::Production && secret_len < MIN_PRODUCTION_SECRET_BYTES {
            return Err(ValidationError::JwtSecretTooShort(MIN_PRODUCTION_SECRET_BYTES));
        }
        if self.issuer.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__ISSUER"));
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ValidationError::InvalidTokenLifetimes);
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ValidationError::InvalidBcryptCost(self.bcrypt_cost));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(String::new()),
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            leeway_secs: 0,
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_issuer() -> String {
    "tunewave".to_string()
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    30 * 24 * 60 * 60
}
