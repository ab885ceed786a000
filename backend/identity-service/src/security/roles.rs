/// Role-based authorization
use super::session::AuthContext;
use crate::error::{IdentityError, Result};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How a required role list is matched against a subject's roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleMatch {
    /// At least one required role present; an empty requirement never matches
    Any,
    /// Every required role present; an empty requirement always matches
    All,
}

impl FromStr for RoleMatch {
    type Err = IdentityError;

    /// Unrecognized modes are an internal configuration error
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(RoleMatch::Any),
            "all" => Ok(RoleMatch::All),
            other => {
                tracing::error!(mode = %other, "Unknown role match mode");
                Err(IdentityError::Internal(format!(
                    "unknown role match mode: {other}"
                )))
            }
        }
    }
}

impl fmt::Display for RoleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleMatch::Any => f.write_str("any"),
            RoleMatch::All => f.write_str("all"),
        }
    }
}

fn lowercase_set<S: AsRef<str>>(roles: &[S]) -> HashSet<String> {
    roles.iter().map(|r| r.as_ref().to_lowercase()).collect()
}

/// Case-insensitive set match of `subject_roles` against `required`
pub fn matches<S, R>(subject_roles: &[S], required: &[R], mode: RoleMatch) -> bool
where
    S: AsRef<str>,
    R: AsRef<str>,
{
    let have = lowercase_set(subject_roles);
    let want = lowercase_set(required);

    match mode {
        RoleMatch::Any => !want.is_disjoint(&have),
        RoleMatch::All => want.is_subset(&have),
    }
}

/// A route's role requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    pub mode: RoleMatch,
    pub roles: Vec<String>,
}

impl RoleRequirement {
    pub fn new<S: Into<String>>(mode: RoleMatch, roles: impl IntoIterator<Item = S>) -> Self {
        Self {
            mode,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn any<S: Into<String>>(roles: impl IntoIterator<Item = S>) -> Self {
        Self::new(RoleMatch::Any, roles)
    }

    pub fn all<S: Into<String>>(roles: impl IntoIterator<Item = S>) -> Self {
        Self::new(RoleMatch::All, roles)
    }

    pub fn is_satisfied_by<S: AsRef<str>>(&self, subject_roles: &[S]) -> bool {
        matches(subject_roles, &self.roles, self.mode)
    }

    pub fn authorize(&self, ctx: &AuthContext) -> Result<()> {
        if self.is_satisfied_by(&ctx.roles) {
            Ok(())
        } else {
            tracing::warn!(
                subject_id = %ctx.subject_id,
                mode = %self.mode,
                code = error_types::ErrorKind::RoleMismatch.code(),
                "Role requirement not satisfied"
            );
            Err(IdentityError::RoleMismatch)
        }
    }
}
