/// Service layer for identity-service
///
/// - Authentication flows (register, login, logout, email verification)
/// - Email verification token lifecycle
pub mod auth;
pub mod email_verification;

pub use auth::{AuthService, RegistrationOutcome, VerificationDispatch};
pub use email_verification::EmailVerificationTokenManager;
