use serde::{Deserialize, Serialize};
use std::fmt;

/// Named permission bucket; names compare case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Authenticated principal as held by the persistence collaborator
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    /// Absent for accounts provisioned from an external provider
    pub username: Option<String>,
    pub email: String,
    /// Present only for password-based accounts
    pub password_hash: Option<String>,
    /// Current token epoch; tokens carrying any other epoch are revoked
    pub epoch: String,
    pub email_verified: bool,
    pub roles: Vec<String>,
    /// Account was created by an administrator rather than by its owner
    pub created_by_admin: bool,
    /// Subject id at the external identity provider, once linked
    pub external_subject: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("epoch", &self.epoch)
            .field("email_verified", &self.email_verified)
            .field("roles", &self.roles)
            .field("created_by_admin", &self.created_by_admin)
            .field("external_subject", &self.external_subject)
            .finish()
    }
}

/// The two mutable fields the session core reads on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochState {
    pub epoch: String,
    pub email_verified: bool,
}

/// Projection used by password and external-provider login
#[derive(Clone)]
pub struct LoginRecord {
    pub id: String,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub roles: Vec<String>,
    pub created_by_admin: bool,
    pub external_subject: Option<String>,
}

impl fmt::Debug for LoginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRecord")
            .field("id", &self.id)
            .field("has_password", &self.password_hash.is_some())
            .field("email_verified", &self.email_verified)
            .field("roles", &self.roles)
            .field("created_by_admin", &self.created_by_admin)
            .field("external_subject", &self.external_subject)
            .finish()
    }
}

/// Row to insert at registration or provisioning time
#[derive(Clone)]
pub struct NewIdentity {
    pub id: String,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub epoch: String,
    /// Role names, already deduplicated
    pub roles: Vec<String>,
    pub email_verified: bool,
    pub created_by_admin: bool,
    pub external_subject: Option<String>,
}

impl fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("epoch", &self.epoch)
            .field("roles", &self.roles)
            .field("email_verified", &self.email_verified)
            .finish_non_exhaustive()
    }
}

impl From<NewIdentity> for Identity {
    fn from(new: NewIdentity) -> Self {
        Self {
            id: new.id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            epoch: new.epoch,
            email_verified: new.email_verified,
            roles: new.roles,
            created_by_admin: new.created_by_admin,
            external_subject: new.external_subject,
        }
    }
}

/// Facts asserted by an external identity provider after its exchange
///
/// Carries no roles: authorization always comes from the stored identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    /// Subject id at the provider
    pub provider_subject: String,
    pub email: String,
    /// Provider's claim that it verified `email`
    pub email_verified: bool,
}

/// User registration request
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub roles: Vec<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_is_case_insensitive() {
        let role = Role::new("r1", "Admin");
        assert!(role.has_name("admin"));
        assert!(role.has_name("ADMIN"));
        assert!(!role.has_name("editor"));
    }

    #[test]
    fn test_debug_hides_password_material() {
        let request = RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "hunter2hunter2".into(),
            roles: vec!["user".into()],
        };
        assert!(!format!("{request:?}").contains("hunter2"));

        let identity = Identity {
            id: "u1".into(),
            username: Some("alice".into()),
            email: "alice@example.com".into(),
            password_hash: Some("$argon2id$secret".into()),
            epoch: "e0".into(),
            email_verified: false,
            roles: vec![],
            created_by_admin: false,
            external_subject: None,
        };
        assert!(!format!("{identity:?}").contains("argon2id"));
    }
}
