//! Session application services.

mod manager;
mod token_source;

pub use manager::{SessionManager, SessionManagerConfig};
pub use token_source::{bearer_token, cookie_value, token_from_headers, TokenCookie};
