//! Session domain module.
//!
//! Types for the credential lifecycle: token claims, the credential record
//! with its generation counter, the authenticated principal, and the error
//! taxonomy returned by session operations.

mod claims;
mod credentials;
mod errors;
mod principal;

pub use claims::{IssuedToken, TokenClaims, TokenPair, TokenType};
pub use credentials::UserCredentials;
pub use errors::SessionError;
pub use principal::AuthenticatedUser;
