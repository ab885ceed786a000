//! Shared cryptographic primitives for Nova identity services
//!
//! - `jwt`: HS256 session token codec (issue / decode)
//! - `hash`: secure random tokens and SHA-256 digests
pub mod hash;
pub mod jwt;

pub use hash::{random_token, sha256, sha256_hex};
pub use jwt::{IssuedSession, SessionClaims, TokenCodec, TokenError, TOKEN_TYPE_BEARER};
