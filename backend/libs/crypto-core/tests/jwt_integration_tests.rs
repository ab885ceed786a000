/// Integration tests for crypto-core session token functionality
///
/// This test module covers:
/// - Token issuance and decoding through the public API
/// - Expiry boundary handling
/// - Rejection of tokens signed under a different secret
/// - Random verification token generation
use chrono::{Duration, Utc};
use crypto_core::hash::VERIFICATION_TOKEN_BYTES;
use crypto_core::{random_token, TokenCodec, TokenError};

const TEST_SECRET: &[u8] = b"integration-test-secret-never-use-in-prod";

fn codec() -> TokenCodec {
    TokenCodec::new(TEST_SECRET).expect("Failed to build test codec")
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Issue / Decode
// ============================================================================

#[test]
fn test_decode_returns_issued_claims_for_many_inputs() {
    let cases: Vec<(&str, &str, bool, Vec<String>)> = vec![
        ("u1", "e0", false, names(&["editor"])),
        ("user-2", "0190f1a2-7c3b-7d4e-8f00-1234567890ab", true, names(&[])),
        ("3", "epoch", true, names(&["Admin", "editor", "viewer"])),
        ("ünïcødé", "é", false, names(&["rôle"])),
    ];

    let now = Utc::now();
    for (subject, epoch, verified, roles) in cases {
        let token = codec()
            .issue_at(subject, epoch, verified, &roles, Duration::minutes(15), now)
            .expect("Failed to issue token");
        let claims = codec()
            .decode_at(&token, now + Duration::minutes(14))
            .expect("Token should decode before expiry");

        assert_eq!(claims.subject_id, subject);
        assert_eq!(claims.epoch, epoch);
        assert_eq!(claims.verified, verified);
        assert_eq!(claims.roles, roles);
    }
}

#[test]
fn test_fifteen_minute_session_scenario() {
    let token = codec()
        .issue("u1", "e0", false, &names(&["editor"]), Duration::minutes(15))
        .expect("Failed to issue token");

    let claims = codec().decode(&token).expect("Fresh token should decode");
    assert_eq!(claims.subject_id, "u1");
    assert_eq!(claims.epoch, "e0");
    assert_eq!(claims.roles, names(&["editor"]));
    assert_eq!(claims.exp - claims.iat, 15 * 60);
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_never_usable_at_or_after_exp() {
    let now = Utc::now();
    let token = codec()
        .issue_at("u1", "e0", true, &names(&["admin"]), Duration::seconds(30), now)
        .expect("Failed to issue token");

    for offset in [30, 31, 3600, 86_400 * 365] {
        let result = codec().decode_at(&token, now + Duration::seconds(offset));
        assert_eq!(result, Err(TokenError::Expired), "offset {offset}s");
    }
}

#[test]
fn test_zero_ttl_token_is_born_expired() {
    let now = Utc::now();
    let token = codec()
        .issue_at("u1", "e0", false, &[], Duration::zero(), now)
        .expect("Failed to issue token");
    assert_eq!(codec().decode_at(&token, now), Err(TokenError::Expired));
}

// ============================================================================
// Signature
// ============================================================================

#[test]
fn test_token_from_other_secret_rejected() {
    let foreign = TokenCodec::new(b"some-other-service-secret-material-xyz").unwrap();
    let token = foreign
        .issue("u1", "e0", true, &names(&["admin"]), Duration::minutes(15))
        .unwrap();

    assert_eq!(codec().decode(&token), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_truncated_signature_rejected() {
    let token = codec()
        .issue("u1", "e0", false, &[], Duration::minutes(15))
        .unwrap();
    let truncated = &token[..token.len() - 4];
    assert!(codec().decode(truncated).is_err());
}

// ============================================================================
// Random tokens
// ============================================================================

#[test]
fn test_random_tokens_are_hex_and_distinct() {
    let tokens: Vec<String> = (0..16).map(|_| random_token(VERIFICATION_TOKEN_BYTES)).collect();
    for token in &tokens {
        assert_eq!(token.len(), VERIFICATION_TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
    let mut unique = tokens.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), tokens.len());
}
