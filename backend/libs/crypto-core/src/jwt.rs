//! Session token codec shared by Nova identity services
//!
//! Tokens are three-part JWS strings (`header.payload.signature`) signed with
//! HMAC-SHA256 under a single process-wide secret. The codec is built once at
//! startup from configuration and is immutable afterwards, so it can be shared
//! freely across request handlers (`Arc<TokenCodec>` or a plain reference).
//!
//! ## Wire claims
//!
//! | claim        | type          |
//! |--------------|---------------|
//! | `subject_id` | string        |
//! | `epoch`      | string        |
//! | `verified`   | bool          |
//! | `roles`      | string list   |
//! | `iat`        | unix seconds  |
//! | `exp`        | unix seconds  |
//!
//! ## Decode order
//!
//! 1. Signature and algorithm (anything but HS256 is rejected)
//! 2. Expiry (`now >= exp` is expired)
//! 3. Typed claim extraction; missing or mistyped fields are `Malformed`
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Duration;
//! use crypto_core::jwt::TokenCodec;
//!
//! let codec = TokenCodec::new(b"a-very-long-process-wide-signing-secret")?;
//! let token = codec.issue("u1", "e0", true, &["editor".to_string()], Duration::minutes(15))?;
//! let claims = codec.decode(&token)?;
//! assert_eq!(claims.subject_id, "u1");
//! # Ok::<(), crypto_core::jwt::TokenError>(())
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// JWT algorithm - symmetric MAC only, never negotiated from the token header
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token type reported to clients alongside issued tokens
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

// ============================================================================
// Errors
// ============================================================================

/// Token codec failures
///
/// Messages describe structure only; they never embed token text or key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signature invalid")]
    SignatureInvalid,

    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Decoded, fully validated content of a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (identity id)
    pub subject_id: String,
    /// Token epoch of the identity at issuance
    pub epoch: String,
    /// Email-verified flag at issuance
    pub verified: bool,
    /// Role names at issuance
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// A freshly issued session token, ready to hand to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Codec
// ============================================================================

/// HS256 session token codec bound to one signing secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &JWT_ALGORITHM)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec from the process-wide signing secret
    ///
    /// ## Errors
    ///
    /// Returns `TokenError::Signing` if the secret is empty.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Issue a session token valid from now for `ttl`
    pub fn issue(
        &self,
        subject_id: &str,
        epoch: &str,
        verified: bool,
        roles: &[String],
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(subject_id, epoch, verified, roles, ttl, Utc::now())
    }

    /// Issue a session token with an explicit issuance instant
    ///
    /// The absolute expiry is `now + ttl`, truncated to whole seconds. An
    /// expiry outside the representable range is a `Signing` error.
    pub fn issue_at(
        &self,
        subject_id: &str,
        epoch: &str,
        verified: bool,
        roles: &[String],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            subject_id: subject_id.to_string(),
            epoch: epoch.to_string(),
            verified,
            roles: roles.to_vec(),
            iat,
            exp: expiry_at(now, ttl)?.timestamp(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Issue a token and package it with its expiry metadata
    pub fn issue_session(
        &self,
        subject_id: &str,
        epoch: &str,
        verified: bool,
        roles: &[String],
        ttl: Duration,
    ) -> Result<IssuedSession, TokenError> {
        let now = Utc::now();
        let access_token = self.issue_at(subject_id, epoch, verified, roles, ttl, now)?;
        let expires_at = expiry_at(now, ttl)?;

        Ok(IssuedSession {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: ttl.num_seconds(),
            expires_at,
        })
    }

    /// Verify and decode a session token against the current time
    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Verify and decode a session token against an explicit instant
    ///
    /// ## Errors
    ///
    /// - `SignatureInvalid`: MAC mismatch or a non-HS256 algorithm
    /// - `Expired`: `now >= exp`
    /// - `Malformed`: bad structure, or a missing/mistyped claim
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // Signature only; expiry and claim shape are checked below on verified content
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let verified = decode::<serde_json::Value>(token, &self.decoding_key, &validation)
            .map_err(map_jwt_error)?;
        let payload = verified.claims;

        let exp = payload
            .get("exp")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| TokenError::Malformed("missing or non-integer exp".to_string()))?;
        if now.timestamp() >= exp {
            return Err(TokenError::Expired);
        }

        let claims: SessionClaims = serde_json::from_value(payload)
            .map_err(|e| TokenError::Malformed(format!("invalid claims: {e}")))?;

        if claims.subject_id.is_empty() {
            return Err(TokenError::Malformed("empty subject_id".to_string()));
        }
        if claims.epoch.is_empty() {
            return Err(TokenError::Malformed("empty epoch".to_string()));
        }

        Ok(claims)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => {
            TokenError::SignatureInvalid
        }
        JwtErrorKind::InvalidToken
        | JwtErrorKind::Base64(_)
        | JwtErrorKind::Json(_)
        | JwtErrorKind::Utf8(_)
        | JwtErrorKind::InvalidAlgorithmName => {
            TokenError::Malformed("invalid token structure".to_string())
        }
        other => TokenError::Malformed(format!("rejected token: {other:?}")),
    }
}

// ============================================================================
// Tests
// ============================================================================

/// `now + ttl` in whole seconds
fn expiry_at(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, TokenError> {
    now.timestamp()
        .checked_add(ttl.num_seconds())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    const TEST_SECRET: &[u8] = b"test-secret-for-unit-tests-only-0123456789";

    fn codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET).expect("codec")
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn encode_segment(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json.as_bytes())
    }

    /// Sign an arbitrary JSON payload with the test secret
    fn sign_raw(payload: &serde_json::Value) -> String {
        encode(
            &Header::new(JWT_ALGORITHM),
            payload,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_produces_three_part_token() {
        let token = codec()
            .issue("u1", "e0", false, &roles(&["editor"]), Duration::minutes(15))
            .unwrap();
        assert_eq!(token.matches('.').count(), 2);
    }

    #[test]
    fn test_round_trip_preserves_claims() {
        let now = Utc::now();
        let token = codec()
            .issue_at("u1", "e0", true, &roles(&["editor", "admin"]), Duration::minutes(15), now)
            .unwrap();

        let claims = codec().decode_at(&token, now).unwrap();
        assert_eq!(claims.subject_id, "u1");
        assert_eq!(claims.epoch, "e0");
        assert!(claims.verified);
        assert_eq!(claims.roles, roles(&["editor", "admin"]));
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp, now.timestamp() + 900);
    }

    #[test]
    fn test_expired_exactly_at_exp() {
        let now = Utc::now();
        let token = codec()
            .issue_at("u1", "e0", false, &[], Duration::seconds(60), now)
            .unwrap();

        let at_exp = now + Duration::seconds(60);
        assert_eq!(codec().decode_at(&token, at_exp), Err(TokenError::Expired));

        let just_before = now + Duration::seconds(59);
        assert!(codec().decode_at(&token, just_before).is_ok());
    }

    #[test]
    fn test_expired_long_after() {
        let now = Utc::now();
        let token = codec()
            .issue_at("u1", "e0", false, &[], Duration::minutes(15), now)
            .unwrap();
        let later = now + Duration::days(1);
        assert_eq!(codec().decode_at(&token, later), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let token = codec()
            .issue("u1", "e0", false, &[], Duration::minutes(15))
            .unwrap();
        let other = TokenCodec::new(b"another-secret-entirely-different-0000").unwrap();
        assert_eq!(other.decode(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = codec()
            .issue("u1", "e0", false, &roles(&["user"]), Duration::minutes(15))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = encode_segment(
            r#"{"subject_id":"u1","epoch":"e0","verified":true,"roles":["admin"],"iat":0,"exp":99999999999}"#,
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(codec().decode(&forged), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_wrong_algorithm_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &serde_json::json!({
                "subject_id": "u1", "epoch": "e0", "verified": false,
                "roles": [], "iat": 0, "exp": 99999999999i64
            }),
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap();
        assert_eq!(codec().decode(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let header = encode_segment(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = encode_segment(
            r#"{"subject_id":"u1","epoch":"e0","verified":true,"roles":["admin"],"iat":0,"exp":99999999999}"#,
        );
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            codec().decode(&token),
            Err(TokenError::Malformed(_)) | Err(TokenError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(codec().decode("invalid.token.here"), Err(TokenError::Malformed(_))));
        assert!(matches!(codec().decode("no-dots-at-all"), Err(TokenError::Malformed(_))));
        assert!(matches!(codec().decode(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_missing_subject_is_malformed() {
        let token = sign_raw(&serde_json::json!({
            "epoch": "e0", "verified": false, "roles": [], "iat": 0, "exp": 99999999999i64
        }));
        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_mistyped_epoch_is_malformed() {
        let token = sign_raw(&serde_json::json!({
            "subject_id": "u1", "epoch": 7, "verified": false, "roles": [],
            "iat": 0, "exp": 99999999999i64
        }));
        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_mistyped_roles_is_malformed() {
        let token = sign_raw(&serde_json::json!({
            "subject_id": "u1", "epoch": "e0", "verified": false, "roles": ["ok", 3],
            "iat": 0, "exp": 99999999999i64
        }));
        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        let token = sign_raw(&serde_json::json!({
            "subject_id": "u1", "epoch": "e0", "verified": false, "roles": [], "iat": 0
        }));
        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_expiry_checked_before_claim_shape() {
        let token = sign_raw(&serde_json::json!({ "exp": 1 }));
        assert_eq!(codec().decode(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(TokenCodec::new(b""), Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("test-secret"));
    }

    #[test]
    fn test_unrepresentable_expiry_is_signing_error() {
        // Past the last representable instant
        let far = Duration::days(365 * 1_000_000);
        let result = codec().issue("u1", "e0", false, &[], far);
        assert!(matches!(result, Err(TokenError::Signing(_))));

        let result = codec().issue_session("u1", "e0", false, &[], -far);
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_issue_session_metadata() {
        let session = codec()
            .issue_session("u1", "e0", false, &[], Duration::minutes(15))
            .unwrap();
        assert_eq!(session.token_type, "Bearer");
        assert_eq!(session.expires_in, 900);
        assert!(codec().decode(&session.access_token).is_ok());
    }
}
