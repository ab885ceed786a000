/// Authentication flows
///
/// Registration, password login, sessions for externally authenticated
/// identities, logout, and email verification. Every successful login starts
/// a new epoch, so a fresh session revokes the previous ones.
///
/// Session claims always come from the stored identity. An external
/// provider's assertion only identifies the account, by email, and is linked
/// to it or provisions it.
use super::email_verification::EmailVerificationTokenManager;
use crate::db::IdentityStore;
use crate::error::{IdentityError, Result};
use crate::config::DEFAULT_EXTERNAL_ROLE;
use crate::models::{AuthenticatedIdentity, LoginRecord, NewIdentity, RegisterRequest};
use crate::security::{hash_password, verify_password, RevocationLedger};
use crate::validators;
use chrono::{DateTime, Duration, Utc};
use crypto_core::{IssuedSession, TokenCodec};
use resilience::TimeoutPolicy;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Verification link handed to the external mailer
#[derive(Clone)]
pub struct VerificationDispatch {
    pub identity_id: String,
    pub link: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for VerificationDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationDispatch")
            .field("identity_id", &self.identity_id)
            .field("link", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful registration
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub identity_id: String,
    pub verification: VerificationDispatch,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    timeout: TimeoutPolicy,
    codec: Arc<TokenCodec>,
    ledger: RevocationLedger,
    verification: EmailVerificationTokenManager,
    access_token_ttl: Duration,
    external_default_role: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        timeout: TimeoutPolicy,
        codec: Arc<TokenCodec>,
        verification: EmailVerificationTokenManager,
        access_token_ttl: Duration,
    ) -> Self {
        Self {
            ledger: RevocationLedger::new(store.clone(), timeout),
            store,
            timeout,
            codec,
            verification,
            access_token_ttl,
            external_default_role: DEFAULT_EXTERNAL_ROLE.to_string(),
        }
    }

    /// Role granted to accounts provisioned by `issue_for_external_identity`
    pub fn with_external_default_role(mut self, role: &str) -> Self {
        self.external_default_role = role.to_string();
        self
    }

    /// Create a password account and its first verification token
    pub async fn register(&self, request: RegisterRequest) -> Result<RegistrationOutcome> {
        if !validators::validate_username(&request.username) {
            return Err(IdentityError::Validation(
                "Username must be 3-32 characters of letters, digits, '-' or '_'".to_string(),
            ));
        }
        if !validators::validate_email(&request.email) {
            return Err(IdentityError::Validation("Invalid email address".to_string()));
        }
        if !validators::validate_password(&request.password) {
            return Err(IdentityError::Validation(format!(
                "Password must be at least {} characters",
                validators::MIN_PASSWORD_LEN
            )));
        }
        let roles = validators::normalize_roles(&request.roles)?;

        let identity = NewIdentity {
            id: Uuid::new_v4().to_string(),
            username: Some(request.username),
            email: request.email,
            password_hash: Some(hash_password(&request.password)?),
            epoch: RevocationLedger::new_epoch(),
            roles,
            email_verified: false,
            created_by_admin: false,
            external_subject: None,
        };

        self.timeout
            .run_result("create_identity", self.store.create_identity(&identity))
            .await?;
        info!(subject_id = %identity.id, "Identity registered");

        let verification = self.dispatch_verification(&identity.id).await?;
        Ok(RegistrationOutcome {
            identity_id: identity.id,
            verification,
        })
    }

    /// Password login by username or email
    ///
    /// Unknown identifier, account without a password, and wrong password are
    /// all reported as `InvalidCredentials`.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<IssuedSession> {
        let record = self
            .timeout
            .run_result("find_login_record", self.store.find_login_record(identifier))
            .await?;

        let record = match record {
            Some(record) => record,
            None => {
                warn!("Login failed: unknown identifier");
                return Err(IdentityError::InvalidCredentials);
            }
        };

        let password_ok = record
            .password_hash
            .as_deref()
            .map(|hash| verify_password(password, hash))
            .unwrap_or(false);
        if !password_ok {
            warn!(subject_id = %record.id, "Login failed: credentials rejected");
            return Err(IdentityError::InvalidCredentials);
        }

        self.start_session(&record.id, record.email_verified, &record.roles)
            .await
    }

    /// Session for an identity authenticated by an external provider
    ///
    /// The account is found by email, or provisioned verified with the
    /// default external role. Roles and the verified flag of the session come
    /// from the store. An account created by an administrator must verify its
    /// email before it can sign in this way.
    pub async fn issue_for_external_identity(
        &self,
        identity: &AuthenticatedIdentity,
    ) -> Result<IssuedSession> {
        if identity.provider_subject.trim().is_empty() {
            return Err(IdentityError::Validation(
                "External identity has no subject".to_string(),
            ));
        }
        if !validators::validate_email(&identity.email) {
            return Err(IdentityError::Validation("Invalid email address".to_string()));
        }
        if !identity.email_verified {
            warn!("External login rejected: provider did not verify email");
            return Err(IdentityError::EmailNotVerified);
        }

        let record = match self.find_by_email(&identity.email).await? {
            Some(record) => self.link_external(record, &identity.provider_subject).await?,
            None => self.provision_external(identity).await?,
        };

        self.start_session(&record.id, record.email_verified, &record.roles)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LoginRecord>> {
        self.timeout
            .run_result("find_by_email", self.store.find_by_email(email))
            .await
    }

    async fn link_external(&self, record: LoginRecord, subject: &str) -> Result<LoginRecord> {
        match record.external_subject.as_deref() {
            Some(linked) if linked != subject => {
                warn!(subject_id = %record.id, "External login rejected: account linked to another subject");
                return Err(IdentityError::InvalidCredentials);
            }
            Some(_) => {}
            None => {
                self.timeout
                    .run_result(
                        "link_external_subject",
                        self.store.link_external_subject(&record.id, subject),
                    )
                    .await?;
                info!(subject_id = %record.id, "External subject linked");
            }
        }

        if record.created_by_admin && !record.email_verified {
            warn!(subject_id = %record.id, "External login rejected: admin-created account not verified");
            return Err(IdentityError::EmailNotVerified);
        }
        Ok(record)
    }

    async fn provision_external(&self, identity: &AuthenticatedIdentity) -> Result<LoginRecord> {
        let new = NewIdentity {
            id: Uuid::new_v4().to_string(),
            username: None,
            email: identity.email.clone(),
            password_hash: None,
            epoch: RevocationLedger::new_epoch(),
            roles: vec![self.external_default_role.clone()],
            email_verified: true,
            created_by_admin: false,
            external_subject: Some(identity.provider_subject.clone()),
        };

        let created = self
            .timeout
            .run_result("create_identity", self.store.create_identity(&new))
            .await;
        match created {
            Ok(()) => {
                info!(subject_id = %new.id, "Identity provisioned from external provider");
                Ok(LoginRecord {
                    id: new.id,
                    password_hash: None,
                    email_verified: new.email_verified,
                    roles: new.roles,
                    created_by_admin: new.created_by_admin,
                    external_subject: new.external_subject,
                })
            }
            // Lost a race with a concurrent first login for the same email
            Err(IdentityError::EmailAlreadyExists) => {
                let record = self
                    .find_by_email(&identity.email)
                    .await?
                    .ok_or(IdentityError::EmailAlreadyExists)?;
                self.link_external(record, &identity.provider_subject).await
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke every session of `subject_id`
    pub async fn logout(&self, subject_id: &str) -> Result<()> {
        self.ledger.bump(subject_id).await?;
        info!(subject_id = %subject_id, "Logged out");
        Ok(())
    }

    /// Redeem a verification token and mark its owner verified
    pub async fn verify_email(&self, value: &str) -> Result<String> {
        let token = self.verification.redeem_token_at(value, Utc::now()).await?;

        let marked = self
            .timeout
            .run_result(
                "mark_identity_verified",
                self.store.mark_identity_verified(&token.identity_id),
            )
            .await;

        match marked {
            Ok(true) => {
                info!(subject_id = %token.identity_id, "Email verified");
                Ok(token.identity_id)
            }
            Ok(false) => {
                error!(subject_id = %token.identity_id, token_id = %token.id, "Verified token owner no longer exists");
                Err(IdentityError::RedemptionIncomplete {
                    token_id: token.id,
                    reason: "owning identity not found".to_string(),
                })
            }
            Err(e) => {
                error!(subject_id = %token.identity_id, token_id = %token.id, error = %e, "Failed to mark identity verified");
                Err(IdentityError::RedemptionIncomplete {
                    token_id: token.id,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Issue a fresh verification token for a not-yet-verified identity
    pub async fn resend_verification(&self, identity_id: &str) -> Result<VerificationDispatch> {
        let state = self
            .ledger
            .current(identity_id)
            .await?
            .ok_or(IdentityError::UserNotFound)?;
        if state.email_verified {
            return Err(IdentityError::EmailAlreadyVerified);
        }
        self.dispatch_verification(identity_id).await
    }

    async fn dispatch_verification(&self, identity_id: &str) -> Result<VerificationDispatch> {
        let token = self.verification.issue(identity_id).await?;
        Ok(VerificationDispatch {
            identity_id: identity_id.to_string(),
            link: self.verification.verification_link(&token),
            expires_at: token.expires_at,
        })
    }

    async fn start_session(
        &self,
        subject_id: &str,
        email_verified: bool,
        roles: &[String],
    ) -> Result<IssuedSession> {
        let epoch = self.ledger.bump(subject_id).await?;
        let session = self
            .codec
            .issue_session(subject_id, &epoch, email_verified, roles, self.access_token_ttl)?;

        info!(subject_id = %subject_id, expires_in = session.expires_in, "Session issued");
        Ok(session)
    }
}
