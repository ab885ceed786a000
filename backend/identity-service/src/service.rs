/// Wiring for the identity core
///
/// Builds every component from `Settings` around one shared store, the way a
/// hosting process would at startup.
use crate::config::Settings;
use crate::db::IdentityStore;
use crate::error::Result;
use crate::security::{RevocationLedger, SessionValidator};
use crate::services::{AuthService, EmailVerificationTokenManager};
use crypto_core::TokenCodec;
use resilience::TimeoutPolicy;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct IdentityServices {
    pub auth: AuthService,
    pub sessions: SessionValidator,
    pub ledger: RevocationLedger,
    pub verification: EmailVerificationTokenManager,
}

impl IdentityServices {
    pub fn new(settings: &Settings, store: Arc<dyn IdentityStore>) -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(settings.jwt.secret.as_bytes())?);
        let timeout = TimeoutPolicy::new(settings.store.timeout());

        let ledger = RevocationLedger::new(store.clone(), timeout);
        let verification = EmailVerificationTokenManager::new(
            store.clone(),
            timeout,
            settings.verification.clone(),
        );
        let sessions = SessionValidator::new(codec.clone(), ledger.clone());
        let auth = AuthService::new(
            store,
            timeout,
            codec,
            verification.clone(),
            settings.jwt.access_token_ttl(),
        )
        .with_external_default_role(&settings.external.default_role);

        info!(
            access_token_ttl_secs = settings.jwt.access_token_ttl_secs,
            store_timeout_ms = settings.store.timeout_ms,
            "Identity services initialized"
        );

        Ok(Self {
            auth,
            sessions,
            ledger,
            verification,
        })
    }
}
