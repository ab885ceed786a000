/// Identity Service Library
///
/// Session and credential core for Nova backend: bearer session tokens with
/// epoch-based revocation, role checks, and email verification tokens.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: Persistence collaborator (Postgres and in-memory)
/// - `error`: Error types
/// - `models`: Data models
/// - `security`: Password hashing, session validation, revocation, roles
/// - `service`: Component wiring
/// - `services`: Authentication flows and email verification tokens
/// - `telemetry`: Tracing setup
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod security;
pub mod service;
pub mod services;
pub mod telemetry;
pub mod validators;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use security::{AuthContext, RoleMatch, RoleRequirement, SessionValidator};
pub use service::IdentityServices;
