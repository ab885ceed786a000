/// Request-time session validation
///
/// `SessionValidator` turns an `Authorization` header into an `AuthContext`:
/// bearer extraction, signature and expiry checks through the codec, then the
/// epoch comparison against the store. The returned context is a plain value
/// scoped to the request; handlers receive it as a parameter.
use super::revocation::RevocationLedger;
use crate::error::{IdentityError, Result};
use chrono::{DateTime, Utc};
use crypto_core::TokenCodec;
use std::sync::Arc;
use tracing::{debug, warn};

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Pull the token out of `Bearer <token>`
///
/// The scheme is case-insensitive. Exactly one space separates scheme and
/// token; any other shape is malformed.
pub fn extract_bearer(header: &str) -> Result<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(IdentityError::MalformedAuthorization),
    }
}

/// Authenticated subject for the remainder of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub subject_id: String,
    /// Verified flag as currently stored, not as embedded at issuance
    pub email_verified: bool,
    pub roles: Vec<String>,
}

impl AuthContext {
    /// Gate for operations that demand a verified email address
    pub fn require_verified_email(&self) -> Result<()> {
        if self.email_verified {
            Ok(())
        } else {
            debug!(subject_id = %self.subject_id, "Email verification required");
            Err(IdentityError::EmailNotVerified)
        }
    }
}

#[derive(Clone)]
pub struct SessionValidator {
    codec: Arc<TokenCodec>,
    ledger: RevocationLedger,
}

impl SessionValidator {
    pub fn new(codec: Arc<TokenCodec>, ledger: RevocationLedger) -> Self {
        Self { codec, ledger }
    }

    /// Validate the raw `Authorization` header value, if any
    pub async fn validate_header(&self, header: Option<&str>) -> Result<AuthContext> {
        let header = header
            .ok_or(IdentityError::MissingAuthorization)
            .map_err(log_rejection)?;
        let token = extract_bearer(header).map_err(log_rejection)?;
        self.validate_token(token).await
    }

    pub async fn validate_token(&self, token: &str) -> Result<AuthContext> {
        self.validate_token_at(token, Utc::now()).await
    }

    /// Validate against an explicit clock reading
    pub async fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<AuthContext> {
        self.check(token, now).await.map_err(log_rejection)
    }

    async fn check(&self, token: &str, now: DateTime<Utc>) -> Result<AuthContext> {
        let claims = self.codec.decode_at(token, now)?;

        let state = self
            .ledger
            .current(&claims.subject_id)
            .await?
            .ok_or(IdentityError::SubjectNotFound)?;

        if claims.epoch != state.epoch {
            debug!(subject_id = %claims.subject_id, "Token epoch is stale");
            return Err(IdentityError::TokenRevoked);
        }

        Ok(AuthContext {
            subject_id: claims.subject_id,
            email_verified: state.email_verified,
            roles: claims.roles,
        })
    }
}

fn log_rejection(err: IdentityError) -> IdentityError {
    if err.is_session_rejection() {
        warn!(code = err.kind().code(), "Session token rejected");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_accepts_any_scheme_case() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(extract_bearer("bearer abc").unwrap(), "abc");
        assert_eq!(extract_bearer("BEARER abc").unwrap(), "abc");
    }

    #[test]
    fn test_extract_bearer_rejects_other_shapes() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "Bearer  abc",
            "Bearer abc def",
            "Basic abc",
            "Bearerabc",
            " Bearer abc",
            "Bearer\tabc",
        ] {
            assert!(
                matches!(extract_bearer(header), Err(IdentityError::MalformedAuthorization)),
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_verified_gate() {
        let mut ctx = AuthContext {
            subject_id: "u1".to_string(),
            email_verified: false,
            roles: vec![],
        };
        let err = ctx.require_verified_email().unwrap_err();
        assert_eq!(err.status_code(), 403);

        ctx.email_verified = true;
        assert!(ctx.require_verified_email().is_ok());
    }
}
