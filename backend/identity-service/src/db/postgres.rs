/// PostgreSQL identity store
///
/// Expected schema (owned by the migrations of the surrounding service):
///
/// ```sql
/// users (id TEXT PRIMARY KEY, username TEXT NULL, email TEXT NOT NULL,
///        password_hash TEXT NULL, token_version TEXT NOT NULL,
///        email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///        created_by_admin BOOLEAN NOT NULL DEFAULT FALSE,
///        external_subject TEXT NULL, created_at TIMESTAMPTZ)
/// CREATE UNIQUE INDEX users_username_lower_key ON users (LOWER(username));
/// CREATE UNIQUE INDEX users_email_lower_key ON users (LOWER(email));
/// roles (id TEXT PRIMARY KEY, name TEXT UNIQUE)
/// user_roles (user_id TEXT REFERENCES users, role_id TEXT REFERENCES roles)
/// email_verifications (id TEXT PRIMARY KEY, user_id TEXT REFERENCES users,
///        token TEXT UNIQUE, expires_at TIMESTAMPTZ, is_used BOOLEAN NOT NULL DEFAULT FALSE)
/// ```
///
/// Uniqueness is case-insensitive, matching the `LOWER()` lookups below.
use super::IdentityStore;
use crate::config::DatabaseSettings;
use crate::error::{IdentityError, Result};
use crate::models::{EpochState, LoginRecord, MarkUsedOutcome, NewIdentity, VerificationToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

const USERS_EMAIL_CONSTRAINTS: [&str; 2] = ["users_email_lower_key", "users_email_key"];
const USERS_USERNAME_CONSTRAINTS: [&str; 2] = ["users_username_lower_key", "users_username_key"];

/// Build the connection pool from settings
pub async fn connect_pool(settings: &DatabaseSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(&settings.url)
        .await?;

    info!(
        "Database pool initialized with {} max connections",
        settings.max_connections
    );
    Ok(pool)
}

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct EpochRow {
    token_version: String,
    email_verified: bool,
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    id: String,
    user_id: String,
    token: String,
    expires_at: DateTime<Utc>,
    is_used: bool,
}

impl From<VerificationRow> for VerificationToken {
    fn from(row: VerificationRow) -> Self {
        Self {
            id: row.id,
            identity_id: row.user_id,
            value: row.token,
            expires_at: row.expires_at,
            used: row.is_used,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: String,
    password_hash: Option<String>,
    email_verified: bool,
    created_by_admin: bool,
    external_subject: Option<String>,
    roles: Vec<String>,
}

impl From<LoginRow> for LoginRecord {
    fn from(row: LoginRow) -> Self {
        Self {
            id: row.id,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            roles: row.roles,
            created_by_admin: row.created_by_admin,
            external_subject: row.external_subject,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: String,
}

/// Conflict error for a violated uniqueness constraint on `users`
fn conflict_for_constraint(constraint: Option<&str>) -> Option<IdentityError> {
    let constraint = constraint?;
    if USERS_EMAIL_CONSTRAINTS.contains(&constraint) {
        Some(IdentityError::EmailAlreadyExists)
    } else if USERS_USERNAME_CONSTRAINTS.contains(&constraint) {
        Some(IdentityError::UsernameAlreadyExists)
    } else {
        None
    }
}

fn map_insert_error(err: sqlx::Error) -> IdentityError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(conflict) = conflict_for_constraint(db_err.constraint()) {
            return conflict;
        }
    }
    IdentityError::from(err)
}

const LOGIN_SELECT: &str = r#"
    SELECT u.id, u.password_hash, u.email_verified, u.created_by_admin, u.external_subject,
           COALESCE(ARRAY_AGG(r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn get_epoch_and_verified(&self, identity_id: &str) -> Result<Option<EpochState>> {
        let row = sqlx::query_as::<_, EpochRow>(
            r#"
            SELECT token_version, email_verified
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| EpochState {
            epoch: row.token_version,
            email_verified: row.email_verified,
        }))
    }

    async fn bump_epoch(&self, identity_id: &str, new_epoch: &str) -> Result<Option<String>> {
        let epoch = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE users
            SET token_version = $2
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(identity_id)
        .bind(new_epoch)
        .fetch_optional(&self.pool)
        .await?;

        Ok(epoch)
    }

    async fn get_verification_token(&self, value: &str) -> Result<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r#"
            SELECT id, user_id, token, expires_at, is_used
            FROM email_verifications
            WHERE token = $1
            "#,
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(VerificationToken::from))
    }

    async fn mark_verification_token_used(&self, token_id: &str) -> Result<MarkUsedOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE email_verifications
            SET is_used = TRUE
            WHERE id = $1 AND is_used = FALSE
            "#,
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(MarkUsedOutcome::Marked)
        } else {
            Ok(MarkUsedOutcome::AlreadyUsed)
        }
    }

    async fn mark_identity_verified(&self, identity_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE
            WHERE id = $1
            "#,
        )
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_verification_token(&self, token: &VerificationToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications (id, user_id, token, expires_at, is_used)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&token.id)
        .bind(&token.identity_id)
        .bind(&token.value)
        .bind(token.expires_at)
        .bind(token.used)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_login_record(&self, identifier: &str) -> Result<Option<LoginRecord>> {
        // One account's username may equal another's email; username wins
        let query = format!(
            "{LOGIN_SELECT}
            WHERE LOWER(u.username) = LOWER($1) OR LOWER(u.email) = LOWER($1)
            GROUP BY u.id
            ORDER BY (LOWER(u.username) = LOWER($1)) DESC NULLS LAST
            LIMIT 1"
        );
        let row = sqlx::query_as::<_, LoginRow>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(LoginRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LoginRecord>> {
        let query = format!(
            "{LOGIN_SELECT}
            WHERE LOWER(u.email) = LOWER($1)
            GROUP BY u.id"
        );
        let row = sqlx::query_as::<_, LoginRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(LoginRecord::from))
    }

    async fn link_external_subject(&self, identity_id: &str, subject: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET external_subject = $2
            WHERE id = $1 AND external_subject IS NULL
            "#,
        )
        .bind(identity_id)
        .bind(subject)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn create_identity(&self, identity: &NewIdentity) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let wanted: Vec<String> = identity.roles.iter().map(|r| r.to_lowercase()).collect();
        let roles = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id FROM roles WHERE LOWER(name) = ANY($1)
            "#,
        )
        .bind(&wanted)
        .fetch_all(&mut *tx)
        .await?;

        if roles.len() != wanted.len() {
            return Err(IdentityError::Validation(
                "One or more roles do not exist".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, token_version,
                               email_verified, created_by_admin, external_subject, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.epoch)
        .bind(identity.email_verified)
        .bind(identity.created_by_admin)
        .bind(&identity.external_subject)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_error)?;

        for role in &roles {
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id)
                VALUES ($1, $2)
                "#,
            )
            .bind(&identity.id)
            .bind(&role.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
