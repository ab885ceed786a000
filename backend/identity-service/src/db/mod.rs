/// Persistence collaborator for the identity core
///
/// The core never touches storage directly; it reads and mutates the epoch,
/// the verified flag and verification tokens through `IdentityStore`. Every
/// update the core depends on for correctness is a single-row atomic write:
/// the epoch bump, and the `used = false` compare-and-set on redemption.
pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{EpochState, LoginRecord, MarkUsedOutcome, NewIdentity, VerificationToken};
use async_trait::async_trait;

pub use memory::InMemoryIdentityStore;
pub use postgres::{connect_pool, PgIdentityStore};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Current epoch and verified flag, `None` if the identity does not exist
    async fn get_epoch_and_verified(&self, identity_id: &str) -> Result<Option<EpochState>>;

    /// Replace the identity's epoch; returns the stored value, `None` if absent
    async fn bump_epoch(&self, identity_id: &str, new_epoch: &str) -> Result<Option<String>>;

    async fn get_verification_token(&self, value: &str) -> Result<Option<VerificationToken>>;

    /// Flip `used` from false to true; the loser of a race sees `AlreadyUsed`
    async fn mark_verification_token_used(&self, token_id: &str) -> Result<MarkUsedOutcome>;

    /// Returns false if the identity does not exist
    async fn mark_identity_verified(&self, identity_id: &str) -> Result<bool>;

    async fn insert_verification_token(&self, token: &VerificationToken) -> Result<()>;

    /// Lookup by username or email, case-insensitively
    async fn find_login_record(&self, identifier: &str) -> Result<Option<LoginRecord>>;

    /// Lookup by email only, case-insensitively
    async fn find_by_email(&self, email: &str) -> Result<Option<LoginRecord>>;

    /// Record the external provider subject on an identity that has none yet
    ///
    /// Returns false if the identity does not exist or is already linked.
    async fn link_external_subject(&self, identity_id: &str, subject: &str) -> Result<bool>;

    /// Insert a new identity with its role assignments
    ///
    /// Username and email are unique case-insensitively. Fails with a
    /// conflict error on a duplicate and with a validation error when a role
    /// name is unknown.
    async fn create_identity(&self, identity: &NewIdentity) -> Result<()>;
}
