/// Email Verification Token Service
///
/// Issues and redeems single-use, time-boxed verification tokens.
///
/// Lifecycle per token:
/// - Issued at registration (or on resend)
/// - Used exactly once, through a compare-and-set on the store
/// - Expired once the clock passes `expires_at`; derived, never stored
///
/// Redemption checks used-state, then expiry, before any mutation.
use crate::config::VerificationSettings;
use crate::db::IdentityStore;
use crate::error::{IdentityError, Result};
use crate::models::{MarkUsedOutcome, VerificationState, VerificationToken};
use chrono::{DateTime, Duration, Utc};
use crypto_core::{random_token, sha256_hex};
use resilience::TimeoutPolicy;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Short token fingerprint for logs
fn fingerprint(value: &str) -> String {
    sha256_hex(value)[..12].to_string()
}

#[derive(Clone)]
pub struct EmailVerificationTokenManager {
    store: Arc<dyn IdentityStore>,
    timeout: TimeoutPolicy,
    settings: VerificationSettings,
}

impl EmailVerificationTokenManager {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        timeout: TimeoutPolicy,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            store,
            timeout,
            settings,
        }
    }

    /// Issue a token for `identity_id` with the configured TTL
    pub async fn issue(&self, identity_id: &str) -> Result<VerificationToken> {
        self.issue_at(identity_id, self.settings.token_ttl(), Utc::now())
            .await
    }

    /// Issue with an explicit lifetime and clock reading
    ///
    /// `ttl` must be positive and `now + ttl` representable.
    pub async fn issue_at(
        &self,
        identity_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken> {
        if ttl <= Duration::zero() {
            error!(ttl_secs = ttl.num_seconds(), "Non-positive verification token TTL");
            return Err(IdentityError::Internal(
                "verification token TTL must be positive".to_string(),
            ));
        }
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            error!(ttl_secs = ttl.num_seconds(), "Verification token expiry out of range");
            IdentityError::Internal("verification token expiry out of range".to_string())
        })?;

        let token = VerificationToken {
            id: Uuid::new_v4().to_string(),
            identity_id: identity_id.to_string(),
            value: random_token(self.settings.token_bytes),
            expires_at,
            used: false,
        };

        self.timeout
            .run_result(
                "insert_verification_token",
                self.store.insert_verification_token(&token),
            )
            .await?;

        info!(
            subject_id = %identity_id,
            token = %fingerprint(&token.value),
            expires_at = %token.expires_at,
            "Verification token issued"
        );
        Ok(token)
    }

    /// Redeem a token value; returns the owning identity id
    pub async fn redeem(&self, value: &str) -> Result<String> {
        self.redeem_at(value, Utc::now()).await
    }

    pub async fn redeem_at(&self, value: &str, now: DateTime<Utc>) -> Result<String> {
        self.redeem_token_at(value, now)
            .await
            .map(|token| token.identity_id)
    }

    /// Redeem and return the consumed token, for callers that must compensate
    pub async fn redeem_token_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationToken> {
        let token = self
            .timeout
            .run_result(
                "get_verification_token",
                self.store.get_verification_token(value),
            )
            .await?
            .ok_or_else(|| {
                warn!(token = %fingerprint(value), "Verification token not found");
                IdentityError::VerificationTokenNotFound
            })?;

        match token.state_at(now) {
            VerificationState::Issued => {}
            VerificationState::Used => {
                warn!(token_id = %token.id, "Verification token already used");
                return Err(IdentityError::VerificationTokenUsed);
            }
            VerificationState::Expired => {
                warn!(token_id = %token.id, "Verification token expired");
                return Err(IdentityError::VerificationTokenExpired);
            }
        }

        let outcome = self
            .timeout
            .run_result(
                "mark_verification_token_used",
                self.store.mark_verification_token_used(&token.id),
            )
            .await
            .map_err(|e| {
                error!(token_id = %token.id, error = %e, "Failed to persist token redemption");
                IdentityError::RedemptionIncomplete {
                    token_id: token.id.clone(),
                    reason: e.to_string(),
                }
            })?;

        match outcome {
            MarkUsedOutcome::Marked => {
                info!(token_id = %token.id, subject_id = %token.identity_id, "Verification token redeemed");
                Ok(VerificationToken { used: true, ..token })
            }
            MarkUsedOutcome::AlreadyUsed => {
                warn!(token_id = %token.id, "Lost verification token redemption race");
                Err(IdentityError::VerificationTokenUsed)
            }
        }
    }

    /// `{frontend_verify_url}?token={value}`, with the value URL-encoded
    pub fn verification_link(&self, token: &VerificationToken) -> String {
        format!(
            "{}?token={}",
            self.settings.frontend_verify_url,
            urlencoding::encode(&token.value)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryIdentityStore;

    fn manager() -> (EmailVerificationTokenManager, Arc<InMemoryIdentityStore>) {
        let store = Arc::new(InMemoryIdentityStore::new());
        let manager = EmailVerificationTokenManager::new(
            store.clone(),
            TimeoutPolicy::default(),
            VerificationSettings::default(),
        );
        (manager, store)
    }

    #[tokio::test]
    async fn test_issue_persists_hex_token() {
        let (manager, store) = manager();
        let now = Utc::now();
        let token = manager
            .issue_at("u1", Duration::minutes(30), now)
            .await
            .unwrap();

        assert_eq!(token.value.len(), 64);
        assert!(token.value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.expires_at, now + Duration::minutes(30));
        assert!(!token.used);
        assert_eq!(store.verification_token(&token.value), Some(token));
    }

    #[tokio::test]
    async fn test_redeem_once_then_already_used() {
        let (manager, store) = manager();
        let token = manager.issue("u1").await.unwrap();

        assert_eq!(manager.redeem(&token.value).await.unwrap(), "u1");
        assert!(store.verification_token(&token.value).unwrap().used);
        assert!(matches!(
            manager.redeem(&token.value).await,
            Err(IdentityError::VerificationTokenUsed)
        ));
    }

    #[tokio::test]
    async fn test_redeem_unknown_value() {
        let (manager, _store) = manager();
        let err = manager.redeem("nope").await.unwrap_err();
        assert!(matches!(err, IdentityError::VerificationTokenNotFound));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_expiry_is_strictly_after() {
        let (manager, store) = manager();
        let now = Utc::now();
        let token = manager
            .issue_at("u1", Duration::minutes(30), now)
            .await
            .unwrap();

        let late = manager
            .redeem_at(&token.value, token.expires_at + Duration::seconds(1))
            .await;
        assert!(matches!(late, Err(IdentityError::VerificationTokenExpired)));
        assert!(!store.verification_token(&token.value).unwrap().used);

        // Exactly at expires_at is still redeemable
        let at = manager.redeem_at(&token.value, token.expires_at).await;
        assert_eq!(at.unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_used_checked_before_expiry() {
        let (manager, _store) = manager();
        let now = Utc::now();
        let token = manager
            .issue_at("u1", Duration::minutes(30), now)
            .await
            .unwrap();
        manager.redeem_at(&token.value, now).await.unwrap();

        let err = manager
            .redeem_at(&token.value, now + Duration::hours(2))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::VerificationTokenUsed));
    }

    #[tokio::test]
    async fn test_non_positive_ttl_rejected() {
        let (manager, store) = manager();
        for ttl in [Duration::seconds(-60), Duration::zero()] {
            let err = manager.issue_at("u1", ttl, Utc::now()).await.unwrap_err();
            assert!(matches!(err, IdentityError::Internal(_)), "{ttl}");
        }
        assert!(store.tokens_for("u1").is_empty());
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_rejected() {
        let (manager, store) = manager();
        let err = manager
            .issue_at("u1", Duration::days(1), DateTime::<Utc>::MAX_UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
        assert!(store.tokens_for("u1").is_empty());
    }

    #[tokio::test]
    async fn test_issue_with_configured_ttl_is_redeemable() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let settings = VerificationSettings {
            token_ttl_secs: 60,
            ..VerificationSettings::default()
        };
        let manager =
            EmailVerificationTokenManager::new(store.clone(), TimeoutPolicy::default(), settings);

        let token = manager.issue("u1").await.unwrap();
        assert!(token.expires_at > Utc::now());
        assert_eq!(manager.redeem(&token.value).await.unwrap(), "u1");
    }

    #[test]
    fn test_verification_link_encodes_value() {
        let (manager, _store) = manager();
        let token = VerificationToken {
            id: "t1".into(),
            identity_id: "u1".into(),
            value: "a b&c".into(),
            expires_at: Utc::now(),
            used: false,
        };
        assert_eq!(
            manager.verification_link(&token),
            "http://localhost:3000/verify-email?token=a%20b%26c"
        );
    }
}
