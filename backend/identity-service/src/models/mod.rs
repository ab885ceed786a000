/// Data models for identity and authentication
pub mod identity;
pub mod verification;

pub use identity::{
    AuthenticatedIdentity, EpochState, Identity, LoginRecord, NewIdentity, RegisterRequest, Role,
};
pub use verification::{MarkUsedOutcome, VerificationState, VerificationToken};
