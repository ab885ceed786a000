//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! debug builds for local development. Settings are read once at startup and
//! never mutated afterwards.
//!
//! # Example
//!
//! ```no_run
//! use identity_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     println!("Access token TTL: {}s", settings.jwt.access_token_ttl_secs);
//!     Ok(())
//! }
//! ```

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Minimum signing secret length in bytes for HS256
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted access-token lifetime (24 hours)
pub const MAX_ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Longest accepted verification-token lifetime (7 days)
pub const MAX_VERIFICATION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Role granted to accounts provisioned from an external provider
pub const DEFAULT_EXTERNAL_ROLE: &str = "guest";

/// Parse a lifetime in seconds and require it within `1..=max`
fn ttl_from_env(key: &str, default: i64, max: i64) -> Result<i64> {
    let secs: i64 = match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {key}"))?,
        Err(_) => default,
    };
    if secs <= 0 {
        bail!("{key} must be positive");
    }
    if secs > max {
        bail!("{key} must be at most {max} seconds");
    }
    Ok(secs)
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt: JwtSettings,
    pub database: DatabaseSettings,
    pub verification: VerificationSettings,
    pub store: StoreSettings,
    pub external: ExternalIdentitySettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            jwt: JwtSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            verification: VerificationSettings::from_env()?,
            store: StoreSettings::from_env()?,
            external: ExternalIdentitySettings::from_env()?,
        })
    }
}

/// Signing secret; never printed
#[derive(Clone)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Session token settings
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: SigningSecret,
    pub access_token_ttl_secs: i64,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.len() < MIN_SECRET_BYTES {
            bail!("JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes");
        }

        let access_token_ttl_secs =
            ttl_from_env("JWT_ACCESS_TOKEN_TTL_SECS", 900, MAX_ACCESS_TOKEN_TTL_SECS)?;

        Ok(Self {
            secret: SigningSecret::new(secret),
            access_token_ttl_secs,
        })
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout_secs: env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT_SECS")?,
        })
    }
}

/// Email verification token settings
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub token_ttl_secs: i64,
    pub token_bytes: usize,
    pub frontend_verify_url: String,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            token_ttl_secs: 30 * 60,
            token_bytes: crypto_core::hash::VERIFICATION_TOKEN_BYTES,
            frontend_verify_url: "http://localhost:3000/verify-email".to_string(),
        }
    }
}

impl VerificationSettings {
    fn from_env() -> Result<Self> {
        let token_bytes: usize = env::var("EMAIL_VERIFICATION_TOKEN_BYTES")
            .unwrap_or_else(|_| "32".to_string())
            .parse()
            .context("Invalid EMAIL_VERIFICATION_TOKEN_BYTES")?;
        if token_bytes < 16 {
            bail!("EMAIL_VERIFICATION_TOKEN_BYTES must be at least 16");
        }

        Ok(Self {
            token_ttl_secs: ttl_from_env(
                "EMAIL_VERIFICATION_TTL_SECS",
                30 * 60,
                MAX_VERIFICATION_TTL_SECS,
            )?,
            token_bytes,
            frontend_verify_url: env::var("FRONTEND_VERIFY_URL")
                .unwrap_or_else(|_| "http://localhost:3000/verify-email".to_string()),
        })
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }
}

/// Persistence call bounds
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl StoreSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            timeout_ms: env::var("STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid STORE_TIMEOUT_MS")?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Accounts created from an external provider's assertion
#[derive(Debug, Clone)]
pub struct ExternalIdentitySettings {
    pub default_role: String,
}

impl Default for ExternalIdentitySettings {
    fn default() -> Self {
        Self {
            default_role: DEFAULT_EXTERNAL_ROLE.to_string(),
        }
    }
}

impl ExternalIdentitySettings {
    fn from_env() -> Result<Self> {
        let default_role = env::var("EXTERNAL_DEFAULT_ROLE")
            .unwrap_or_else(|_| DEFAULT_EXTERNAL_ROLE.to_string());
        if default_role.trim().is_empty() {
            bail!("EXTERNAL_DEFAULT_ROLE must not be empty");
        }
        Ok(Self {
            default_role: default_role.trim().to_string(),
        })
    }
}
