//! HS256 JWT codec.
//!
//! Implements the `TokenCodec` port with a shared secret. Verification
//! checks the signature, the issuer, `exp` and `nbf`; `sub`, `iss`, `exp`
//! and `nbf` must all be present. Claims that are signed correctly but do
//! not deserialize into `TokenClaims` are treated as unauthenticated.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use crate::domain::session::{SessionError, TokenClaims};
use crate::ports::TokenCodec;

/// `TokenCodec` backed by `jsonwebtoken`.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtCodec {
    /// Creates a codec signing with `secret` and accepting only `issuer`.
    ///
    /// `leeway_secs` is the clock skew tolerated on `exp` and `nbf`.
    pub fn new(secret: &SecretString, issuer: impl Into<String>, leeway_secs: u64) -> Self {
        let issuer = issuer.into();
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub", "nbf"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = leeway_secs;

        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            validation,
            issuer,
        }
    }
}

impl TokenCodec for JwtCodec {
    fn encode(&self, claims: &TokenClaims) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
            SessionError::Fatal(format!("token signing failed: {}", e))
        })
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, SessionError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token expired");
                    }
                    ErrorKind::ImmatureSignature => {
                        tracing::debug!("Token not yet valid");
                    }
                    ErrorKind::InvalidIssuer => {
                        tracing::warn!("Invalid issuer in token");
                    }
                    ErrorKind::InvalidSignature => {
                        tracing::warn!("Invalid token signature");
                    }
                    ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                        tracing::warn!("Token claims are malformed: {}", e);
                    }
                    _ => {
                        tracing::debug!("Token validation failed: {}", e);
                    }
                }
                SessionError::Unauthenticated
            })
    }
}

impl std::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
