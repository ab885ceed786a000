//! Input validation utilities for identity service

use crate::error::{IdentityError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Upper bound on role names per identity
pub const MAX_ROLES: usize = 20;

// Compile regex patterns once at startup
// Hardcoded patterns; expect() cannot fire at runtime
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is invalid - fix source code")
});

static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,32}$")
        .expect("hardcoded username regex is invalid - fix source code")
});

/// Validate email format (RFC 5322 simplified)
pub fn validate_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

/// Validate username format (3-32 characters, alphanumeric with - and _)
pub fn validate_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Length-only check; strength policy belongs to the caller's product rules
pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Trim, drop blanks and deduplicate role names case-insensitively
///
/// First spelling wins. Fails when nothing is left or when more than
/// `MAX_ROLES` distinct names remain.
pub fn normalize_roles(roles: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let normalized: Vec<String> = roles
        .iter()
        .map(|role| role.trim())
        .filter(|role| !role.is_empty())
        .filter(|role| seen.insert(role.to_lowercase()))
        .map(str::to_string)
        .collect();

    if normalized.is_empty() {
        return Err(IdentityError::Validation(
            "At least one role is required".to_string(),
        ));
    }
    if normalized.len() > MAX_ROLES {
        return Err(IdentityError::Validation(format!(
            "At most {MAX_ROLES} roles are allowed"
        )));
    }
    Ok(normalized)
}
