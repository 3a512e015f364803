//! Token signing adapters.

mod jwt_codec;

pub use jwt_codec::JwtCodec;
