//! Token transport.
//!
//! Tokens arrive either as `Authorization: Bearer <token>` or in a named
//! cookie. The bearer header wins when both are present. Blank values count
//! as absent.

use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;

use crate::domain::session::SessionError;

/// Cookie a token may be carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCookie {
    Access,
    Refresh,
    /// Refresh token scoped to the logout endpoint.
    RefreshForLogout,
}

impl TokenCookie {
    pub fn name(&self) -> &'static str {
        match self {
            TokenCookie::Access => "access",
            TokenCookie::Refresh => "refresh",
            TokenCookie::RefreshForLogout => "refresh-for-logout",
        }
    }
}

/// Token from the `Authorization: Bearer` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(AUTHORIZATION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            if !scheme.eq_ignore_ascii_case("bearer") {
                return None;
            }
            let token = token.trim();
            (!token.is_empty()).then(|| token.to_string())
        })
}

/// Value of the named cookie across all `Cookie` headers, if any.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

/// Extract a token, preferring the bearer header over the cookie.
///
/// # Errors
///
/// - `Unauthenticated` if neither source carries a token
pub fn token_from_headers(headers: &HeaderMap, cookie: TokenCookie) -> Result<String, SessionError> {
    bearer_token(headers)
        .or_else(|| cookie_value(headers, cookie.name()))
        .ok_or(SessionError::Unauthenticated)
}
