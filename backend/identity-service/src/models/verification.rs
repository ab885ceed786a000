use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-use, time-boxed email verification token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: String,
    pub identity_id: String,
    /// Opaque random value sent to the user
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// Redemption state; `Expired` is derived from the clock and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    Issued,
    Used,
    Expired,
}

impl VerificationToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Used takes precedence over Expired
    pub fn state_at(&self, now: DateTime<Utc>) -> VerificationState {
        if self.used {
            VerificationState::Used
        } else if self.is_expired_at(now) {
            VerificationState::Expired
        } else {
            VerificationState::Issued
        }
    }
}

impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationToken")
            .field("id", &self.id)
            .field("identity_id", &self.identity_id)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("used", &self.used)
            .finish()
    }
}

/// Outcome of the conditional `used = false -> true` update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkUsedOutcome {
    Marked,
    AlreadyUsed,
}
