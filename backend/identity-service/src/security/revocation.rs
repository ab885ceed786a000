/// Epoch-based token revocation
///
/// Every identity carries one epoch value. Tokens embed the epoch current at
/// issuance and are honored only while it still matches, so replacing the
/// epoch revokes every outstanding token for that identity in one write.
/// All devices of an account share the epoch: logging out one logs out all.
use crate::db::IdentityStore;
use crate::error::{IdentityError, Result};
use crate::models::EpochState;
use resilience::TimeoutPolicy;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct RevocationLedger {
    store: Arc<dyn IdentityStore>,
    timeout: TimeoutPolicy,
}

impl RevocationLedger {
    pub fn new(store: Arc<dyn IdentityStore>, timeout: TimeoutPolicy) -> Self {
        Self { store, timeout }
    }

    /// Fresh, time-ordered epoch value, distinct from every earlier one
    pub fn new_epoch() -> String {
        Uuid::now_v7().to_string()
    }

    /// Current epoch and verified flag, `None` if the identity is gone
    pub async fn current(&self, identity_id: &str) -> Result<Option<EpochState>> {
        self.timeout
            .run_result(
                "get_epoch_and_verified",
                self.store.get_epoch_and_verified(identity_id),
            )
            .await
    }

    /// Replace the identity's epoch, revoking all tokens issued under the old one
    pub async fn bump(&self, identity_id: &str) -> Result<String> {
        let epoch = Self::new_epoch();
        let stored = self
            .timeout
            .run_result("bump_epoch", self.store.bump_epoch(identity_id, &epoch))
            .await?
            .ok_or(IdentityError::UserNotFound)?;

        info!(subject_id = %identity_id, "Token epoch bumped");
        Ok(stored)
    }
}
