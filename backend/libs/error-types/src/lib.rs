use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable, machine-readable failure kinds for the identity core
///
/// The kind, never the human message, drives HTTP status mapping and client
/// retry behavior. Codes are part of the wire contract and must not change;
/// serde uses the same `code()` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ErrorKind {
    /// Bad header shape, bad token structure, bad claim types
    Malformed,
    /// MAC mismatch or wrong algorithm
    SignatureInvalid,
    /// Session token or verification token past its expiry
    Expired,
    /// Token epoch no longer matches the identity's current epoch
    Revoked,
    /// Requester's roles do not satisfy the route requirement
    RoleMismatch,
    /// Operation requires a verified email address
    EmailNotVerified,
    /// Verification token was already redeemed
    AlreadyUsed,
    /// Identity or verification token absent
    NotFound,
    /// Username or email already registered
    Conflict,
    /// Request input failed validation
    Validation,
    /// Login identifier/password pair rejected
    InvalidCredentials,
    /// Collaborator timeout or outage; safe to retry with backoff
    Unavailable,
    /// Programming or signing failure; never exposes internals
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::Malformed,
        ErrorKind::SignatureInvalid,
        ErrorKind::Expired,
        ErrorKind::Revoked,
        ErrorKind::RoleMismatch,
        ErrorKind::EmailNotVerified,
        ErrorKind::AlreadyUsed,
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::Validation,
        ErrorKind::InvalidCredentials,
        ErrorKind::Unavailable,
        ErrorKind::Internal,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Malformed => error_codes::TOKEN_MALFORMED,
            ErrorKind::SignatureInvalid => error_codes::TOKEN_SIGNATURE_INVALID,
            ErrorKind::Expired => error_codes::TOKEN_EXPIRED,
            ErrorKind::Revoked => error_codes::TOKEN_REVOKED,
            ErrorKind::RoleMismatch => error_codes::ROLE_MISMATCH,
            ErrorKind::EmailNotVerified => error_codes::EMAIL_NOT_VERIFIED,
            ErrorKind::AlreadyUsed => error_codes::TOKEN_ALREADY_USED,
            ErrorKind::NotFound => error_codes::NOT_FOUND,
            ErrorKind::Conflict => error_codes::CONFLICT,
            ErrorKind::Validation => error_codes::VALIDATION_ERROR,
            ErrorKind::InvalidCredentials => error_codes::INVALID_CREDENTIALS,
            ErrorKind::Unavailable => error_codes::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => error_codes::INTERNAL_SERVER_ERROR,
        }
    }

    /// Default HTTP status for the kind
    ///
    /// Callers that know the context (session vs. verification token) may
    /// refine NotFound and Expired; see `identity_service::IdentityError::status_code`.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Malformed
            | ErrorKind::SignatureInvalid
            | ErrorKind::Expired
            | ErrorKind::Revoked
            | ErrorKind::InvalidCredentials => 401,
            ErrorKind::RoleMismatch | ErrorKind::EmailNotVerified => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::AlreadyUsed => 410,
            ErrorKind::Validation => 400,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ErrorKind::Malformed
            | ErrorKind::SignatureInvalid
            | ErrorKind::Expired
            | ErrorKind::Revoked
            | ErrorKind::InvalidCredentials => error_types::AUTHENTICATION_ERROR,
            ErrorKind::RoleMismatch | ErrorKind::EmailNotVerified => {
                error_types::AUTHORIZATION_ERROR
            }
            ErrorKind::AlreadyUsed => error_types::GONE_ERROR,
            ErrorKind::NotFound => error_types::NOT_FOUND_ERROR,
            ErrorKind::Conflict => error_types::CONFLICT_ERROR,
            ErrorKind::Validation => error_types::VALIDATION_ERROR,
            ErrorKind::Unavailable => error_types::SERVICE_UNAVAILABLE_ERROR,
            ErrorKind::Internal => error_types::SERVER_ERROR,
        }
    }

    /// Only collaborator unavailability is worth an automatic retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.code() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

impl From<ErrorKind> for &'static str {
    fn from(kind: ErrorKind) -> Self {
        kind.code()
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = UnknownErrorCode;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

/// Unified API error response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable summary, safe to show to end users
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error category used by clients for routing (`authentication_error`, ...)
    pub error_type: String,

    /// Stable machine-readable code (`TOKEN_EXPIRED`, ...)
    pub code: String,

    /// Whether the client may retry the same request with backoff
    pub retryable: bool,

    /// Request trace id for log correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, status: u16, message: &str) -> Self {
        Self {
            message: message.to_string(),
            status,
            error_type: kind.error_type().to_string(),
            code: kind.code().to_string(),
            retryable: kind.is_retryable(),
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Stable error codes
pub mod error_codes {
    // Authentication
    pub const TOKEN_MALFORMED: &str = "TOKEN_MALFORMED";
    pub const TOKEN_SIGNATURE_INVALID: &str = "TOKEN_SIGNATURE_INVALID";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const TOKEN_REVOKED: &str = "TOKEN_REVOKED";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";

    // Authorization
    pub const ROLE_MISMATCH: &str = "ROLE_MISMATCH";
    pub const EMAIL_NOT_VERIFIED: &str = "EMAIL_NOT_VERIFIED";

    // Email/Verification
    pub const TOKEN_ALREADY_USED: &str = "TOKEN_ALREADY_USED";

    // Resources
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";

    // System
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

/// Standard error categories
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const GONE_ERROR: &str = "gone_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}
