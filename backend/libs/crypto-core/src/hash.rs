use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Byte length used for email verification tokens
pub const VERIFICATION_TOKEN_BYTES: usize = 32;

/// Generate `byte_len` cryptographically secure random bytes, hex-encoded
///
/// The returned string is `2 * byte_len` characters long. Callers size the
/// byte length against guessing; verification tokens use 32 bytes.
pub fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compute SHA256 hash of input bytes
pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Hex-encoded SHA256, used to fingerprint tokens in logs without exposing them
pub fn sha256_hex(input: &str) -> String {
    hex::encode(sha256(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let input = b"hello world";
        let hash = sha256(input);
        assert_eq!(hash.len(), 32);

        // Verify deterministic
        let hash2 = sha256(input);
        assert_eq!(hash, hash2);
    }

    #[test]
    fn test_random_token_length_and_alphabet() {
        let token = random_token(VERIFICATION_TOKEN_BYTES);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_token_uniqueness() {
        let a = random_token(VERIFICATION_TOKEN_BYTES);
        let b = random_token(VERIFICATION_TOKEN_BYTES);
        assert_ne!(a, b, "token should be random");
    }

    #[test]
    fn test_random_token_zero_length() {
        assert!(random_token(0).is_empty());
    }

    #[test]
    fn test_sha256_hex_length() {
        assert_eq!(sha256_hex("any_token").len(), 64);
    }
}
