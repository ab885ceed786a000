/// In-memory identity store for tests and local development
use super::IdentityStore;
use crate::error::{IdentityError, Result};
use crate::models::{
    EpochState, Identity, LoginRecord, MarkUsedOutcome, NewIdentity, Role, VerificationToken,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;

/// Role names available when none are configured
pub const DEFAULT_ROLES: [&str; 5] = ["admin", "editor", "viewer", "user", "guest"];

/// DashMap-backed store
///
/// Single-row mutations go through `DashMap::get_mut`, which holds the shard
/// lock for the duration of the compare-and-set.
pub struct InMemoryIdentityStore {
    identities: DashMap<String, Identity>,
    /// Verification tokens keyed by id
    tokens: DashMap<String, VerificationToken>,
    /// Opaque value -> token id
    token_values: DashMap<String, String>,
    roles: Vec<Role>,
    /// Serializes registration so uniqueness checks and insert are atomic
    registration: Mutex<()>,
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::with_roles(&DEFAULT_ROLES)
    }
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: &[&str]) -> Self {
        Self {
            identities: DashMap::new(),
            tokens: DashMap::new(),
            token_values: DashMap::new(),
            roles: roles
                .iter()
                .enumerate()
                .map(|(i, name)| Role::new(format!("role-{}", i + 1), *name))
                .collect(),
            registration: Mutex::new(()),
        }
    }

    /// Insert an identity directly, bypassing validation
    pub fn seed_identity(&self, identity: Identity) {
        self.identities.insert(identity.id.clone(), identity);
    }

    pub fn identity(&self, identity_id: &str) -> Option<Identity> {
        self.identities.get(identity_id).map(|entry| entry.clone())
    }

    pub fn remove_identity(&self, identity_id: &str) -> Option<Identity> {
        self.identities.remove(identity_id).map(|(_, identity)| identity)
    }

    pub fn verification_token(&self, value: &str) -> Option<VerificationToken> {
        let id = self.token_values.get(value)?.clone();
        self.tokens.get(&id).map(|entry| entry.clone())
    }

    fn login_record(identity: &Identity) -> LoginRecord {
        LoginRecord {
            id: identity.id.clone(),
            password_hash: identity.password_hash.clone(),
            email_verified: identity.email_verified,
            roles: identity.roles.clone(),
            created_by_admin: identity.created_by_admin,
            external_subject: identity.external_subject.clone(),
        }
    }

    /// All verification tokens issued to one identity
    pub fn tokens_for(&self, identity_id: &str) -> Vec<VerificationToken> {
        self.tokens
            .iter()
            .filter(|entry| entry.identity_id == identity_id)
            .map(|entry| entry.clone())
            .collect()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get_epoch_and_verified(&self, identity_id: &str) -> Result<Option<EpochState>> {
        Ok(self.identities.get(identity_id).map(|identity| EpochState {
            epoch: identity.epoch.clone(),
            email_verified: identity.email_verified,
        }))
    }

    async fn bump_epoch(&self, identity_id: &str, new_epoch: &str) -> Result<Option<String>> {
        Ok(self.identities.get_mut(identity_id).map(|mut identity| {
            identity.epoch = new_epoch.to_string();
            identity.epoch.clone()
        }))
    }

    async fn get_verification_token(&self, value: &str) -> Result<Option<VerificationToken>> {
        Ok(self.verification_token(value))
    }

    async fn mark_verification_token_used(&self, token_id: &str) -> Result<MarkUsedOutcome> {
        let mut token = self
            .tokens
            .get_mut(token_id)
            .ok_or(IdentityError::VerificationTokenNotFound)?;

        if token.used {
            return Ok(MarkUsedOutcome::AlreadyUsed);
        }
        token.used = true;
        Ok(MarkUsedOutcome::Marked)
    }

    async fn mark_identity_verified(&self, identity_id: &str) -> Result<bool> {
        Ok(self
            .identities
            .get_mut(identity_id)
            .map(|mut identity| identity.email_verified = true)
            .is_some())
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> Result<()> {
        if self.token_values.contains_key(&token.value) {
            return Err(IdentityError::Internal(
                "verification token value collision".to_string(),
            ));
        }
        self.token_values
            .insert(token.value.clone(), token.id.clone());
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_login_record(&self, identifier: &str) -> Result<Option<LoginRecord>> {
        let needle = identifier.to_lowercase();
        let by_username = self
            .identities
            .iter()
            .find(|identity| {
                identity
                    .username
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase() == needle)
            })
            .map(|identity| Self::login_record(&identity));
        match by_username {
            Some(record) => Ok(Some(record)),
            None => self.find_by_email(identifier).await,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LoginRecord>> {
        let needle = email.to_lowercase();
        Ok(self
            .identities
            .iter()
            .find(|identity| identity.email.to_lowercase() == needle)
            .map(|identity| Self::login_record(&identity)))
    }

    async fn link_external_subject(&self, identity_id: &str, subject: &str) -> Result<bool> {
        Ok(match self.identities.get_mut(identity_id) {
            Some(mut identity) if identity.external_subject.is_none() => {
                identity.external_subject = Some(subject.to_string());
                true
            }
            _ => false,
        })
    }

    async fn create_identity(&self, identity: &NewIdentity) -> Result<()> {
        if let Some(unknown) = identity
            .roles
            .iter()
            .find(|name| !self.roles.iter().any(|role| role.has_name(name)))
        {
            return Err(IdentityError::Validation(format!("Unknown role: {unknown}")));
        }

        let _guard = self
            .registration
            .lock()
            .map_err(|_| IdentityError::Internal("registration lock poisoned".to_string()))?;

        let username = identity.username.as_deref().map(str::to_lowercase);
        let email = identity.email.to_lowercase();
        for existing in self.identities.iter() {
            if existing.email.to_lowercase() == email {
                return Err(IdentityError::EmailAlreadyExists);
            }
            if username.is_some() && existing.username.as_deref().map(str::to_lowercase) == username
            {
                return Err(IdentityError::UsernameAlreadyExists);
            }
        }

        self.identities
            .insert(identity.id.clone(), Identity::from(identity.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn new_identity(id: &str, username: &str, email: &str) -> NewIdentity {
        NewIdentity {
            id: id.to_string(),
            username: Some(username.to_string()),
            email: email.to_string(),
            password_hash: None,
            epoch: "e0".to_string(),
            roles: vec!["editor".to_string()],
            email_verified: false,
            created_by_admin: false,
            external_subject: None,
        }
    }

    fn token(id: &str, identity_id: &str, value: &str) -> VerificationToken {
        VerificationToken {
            id: id.to_string(),
            identity_id: identity_id.to_string(),
            value: value.to_string(),
            expires_at: Utc::now() + Duration::minutes(30),
            used: false,
        }
    }

    #[tokio::test]
    async fn test_bump_epoch_replaces_value() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let bumped = store.bump_epoch("u1", "e1").await.unwrap();
        assert_eq!(bumped.as_deref(), Some("e1"));
        let state = store.get_epoch_and_verified("u1").await.unwrap().unwrap();
        assert_eq!(state.epoch, "e1");
        assert!(!state.email_verified);
    }

    #[tokio::test]
    async fn test_bump_epoch_unknown_identity() {
        let store = InMemoryIdentityStore::new();
        assert_eq!(store.bump_epoch("ghost", "e1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mark_used_is_compare_and_set() {
        let store = InMemoryIdentityStore::new();
        store
            .insert_verification_token(&token("t1", "u1", "abc"))
            .await
            .unwrap();

        assert_eq!(
            store.mark_verification_token_used("t1").await.unwrap(),
            MarkUsedOutcome::Marked
        );
        assert_eq!(
            store.mark_verification_token_used("t1").await.unwrap(),
            MarkUsedOutcome::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let dup_email = store
            .create_identity(&new_identity("u2", "bob", "ALICE@example.com"))
            .await;
        assert!(matches!(dup_email, Err(IdentityError::EmailAlreadyExists)));

        let dup_name = store
            .create_identity(&new_identity("u3", "Alice", "other@example.com"))
            .await;
        assert!(matches!(dup_name, Err(IdentityError::UsernameAlreadyExists)));
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let store = InMemoryIdentityStore::with_roles(&["viewer"]);
        let result = store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await;
        assert!(matches!(result, Err(IdentityError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_record_by_username_or_email() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let by_name = store.find_login_record("ALICE").await.unwrap().unwrap();
        let by_email = store
            .find_login_record("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, "u1");
        assert_eq!(by_email.id, "u1");
        assert!(store.find_login_record("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_without_username_do_not_conflict() {
        let store = InMemoryIdentityStore::new();
        let mut first = new_identity("u1", "unused", "first@example.com");
        first.username = None;
        let mut second = new_identity("u2", "unused", "second@example.com");
        second.username = None;

        store.create_identity(&first).await.unwrap();
        store.create_identity(&second).await.unwrap();
        assert!(store.find_login_record("unused").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_usernames() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(store.find_by_email("alice").await.unwrap().is_none());
        let found = store.find_by_email("Alice@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert_eq!(found.roles, vec!["editor".to_string()]);
    }

    #[tokio::test]
    async fn test_link_external_subject_only_once() {
        let store = InMemoryIdentityStore::new();
        store
            .create_identity(&new_identity("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(store.link_external_subject("u1", "sub-1").await.unwrap());
        assert!(!store.link_external_subject("u1", "sub-2").await.unwrap());
        assert!(!store.link_external_subject("ghost", "sub-1").await.unwrap());
        assert_eq!(
            store.identity("u1").unwrap().external_subject.as_deref(),
            Some("sub-1")
        );
    }
}
