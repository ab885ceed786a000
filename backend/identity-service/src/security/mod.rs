/// Security module for authentication and authorization
///
/// - **password**: Argon2id password hashing
/// - **revocation**: per-identity token epochs
/// - **session**: bearer header to `AuthContext`
/// - **roles**: ANY/ALL role requirements
pub use crypto_core::jwt;
pub use crypto_core::{random_token, IssuedSession, SessionClaims, TokenCodec};

pub mod password;
pub mod revocation;
pub mod roles;
pub mod session;

pub use password::{hash_password, verify_password};
pub use revocation::RevocationLedger;
pub use roles::{matches, RoleMatch, RoleRequirement};
pub use session::{extract_bearer, AuthContext, SessionValidator};
