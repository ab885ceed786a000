use crypto_core::TokenError;
use error_types::{ErrorKind, ErrorResponse};
use resilience::TimeoutError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Shared public message for every session-token rejection
const SESSION_REJECTED: &str = "Invalid, expired, or revoked token";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Missing authorization header")]
    MissingAuthorization,

    #[error("Malformed authorization header")]
    MalformedAuthorization,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signature invalid")]
    SignatureInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    /// Token subject no longer exists
    #[error("Token subject not found")]
    SubjectNotFound,

    #[error("Role requirement not satisfied")]
    RoleMismatch,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Verification token not found")]
    VerificationTokenNotFound,

    #[error("Verification token already used")]
    VerificationTokenUsed,

    #[error("Verification token expired")]
    VerificationTokenExpired,

    /// Target of an explicit operation (logout, resend) does not exist
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Email already verified")]
    EmailAlreadyVerified,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity store unavailable: {0}")]
    Unavailable(String),

    /// Success was decided but could not be made durable; caller must compensate
    #[error("Verification token {token_id} redemption incomplete: {reason}")]
    RedemptionIncomplete { token_id: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Precise kind, for logs and diagnostics
    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::MissingAuthorization
            | IdentityError::MalformedAuthorization
            | IdentityError::InvalidToken(_) => ErrorKind::Malformed,
            IdentityError::SignatureInvalid => ErrorKind::SignatureInvalid,
            IdentityError::TokenExpired | IdentityError::VerificationTokenExpired => {
                ErrorKind::Expired
            }
            IdentityError::TokenRevoked => ErrorKind::Revoked,
            IdentityError::SubjectNotFound
            | IdentityError::VerificationTokenNotFound
            | IdentityError::UserNotFound => ErrorKind::NotFound,
            IdentityError::RoleMismatch => ErrorKind::RoleMismatch,
            IdentityError::EmailNotVerified => ErrorKind::EmailNotVerified,
            IdentityError::VerificationTokenUsed => ErrorKind::AlreadyUsed,
            IdentityError::InvalidCredentials => ErrorKind::InvalidCredentials,
            IdentityError::EmailAlreadyExists
            | IdentityError::UsernameAlreadyExists
            | IdentityError::EmailAlreadyVerified => ErrorKind::Conflict,
            IdentityError::Validation(_) => ErrorKind::Validation,
            IdentityError::Unavailable(_) => ErrorKind::Unavailable,
            IdentityError::RedemptionIncomplete { .. }
            | IdentityError::Database(_)
            | IdentityError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Kind exposed across the boundary
    ///
    /// Signature failures look like malformed tokens; revocation and a vanished
    /// subject look like expiry. The precise kind stays in `kind()` for logs.
    pub fn public_kind(&self) -> ErrorKind {
        match self {
            IdentityError::SignatureInvalid => ErrorKind::Malformed,
            IdentityError::TokenRevoked | IdentityError::SubjectNotFound => ErrorKind::Expired,
            other => other.kind(),
        }
    }

    /// True for failures of the bearer-session check itself
    pub fn is_session_rejection(&self) -> bool {
        matches!(
            self,
            IdentityError::MissingAuthorization
                | IdentityError::MalformedAuthorization
                | IdentityError::InvalidToken(_)
                | IdentityError::SignatureInvalid
                | IdentityError::TokenExpired
                | IdentityError::TokenRevoked
                | IdentityError::SubjectNotFound
        )
    }

    /// HTTP status at the boundary
    pub fn status_code(&self) -> u16 {
        if self.is_session_rejection() {
            return 401;
        }
        match self {
            IdentityError::VerificationTokenExpired => 410,
            other => other.kind().status_code(),
        }
    }

    /// Message safe to return to callers
    pub fn public_message(&self) -> String {
        if self.is_session_rejection() {
            return SESSION_REJECTED.to_string();
        }
        match self {
            IdentityError::RedemptionIncomplete { .. }
            | IdentityError::Database(_)
            | IdentityError::Internal(_) => "Internal server error".to_string(),
            IdentityError::Unavailable(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.public_kind(), self.status_code(), &self.public_message())
    }
}

// Conversions from external error types
impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(detail) => IdentityError::InvalidToken(detail),
            TokenError::SignatureInvalid => IdentityError::SignatureInvalid,
            TokenError::Expired => IdentityError::TokenExpired,
            TokenError::Signing(detail) => {
                tracing::error!("Token signing failed: {}", detail);
                IdentityError::Internal(format!("token signing failed: {detail}"))
            }
        }
    }
}

impl From<TimeoutError> for IdentityError {
    fn from(err: TimeoutError) -> Self {
        IdentityError::Unavailable(err.to_string())
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                tracing::warn!("Database unavailable: {}", err);
                IdentityError::Unavailable(err.to_string())
            }
            other => {
                tracing::error!("Database error: {}", other);
                IdentityError::Database(other.to_string())
            }
        }
    }
}
