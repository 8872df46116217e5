//!
//! # `SELinux` Security User Identifier
//!
//! Author: Jamie Adams
//!
//! Strongly-typed Rust primitive modeling `SELinux` security users.
//! This module models only the identifier primitive — not policy
//! bindings or clearance mappings.
//!
//! Kernel / Policy Sources Consulted:
//! - security/selinux/include/security.h
//! - security/selinux/ss/policydb.c
//! - libselinux user mapping interfaces
//!
//! In `SELinux` policy, users are symbol table entries associated with:
//! - Role authorization sets
//! - MLS clearance ranges
//! - Login mapping records
//!
//! ## Implementation Lineage & Design Note
//!
//! This module provides an independent Rust implementation of the
//! `SELinux` security user construct.
//!
//! `SELinux` users are policy-defined identity symbols that participate
//! in clearance mapping, role association, and login translation
//! (e.g., via seusers and login mapping databases).
//!
//! Behavioral semantics were studied from `SELinux` userland libraries
//! and policydb structures to preserve familiarity for experienced
//! `SELinux` practitioners. However:
//!
//! - No source code has been copied or translated.
//! - No line-by-line derivation has occurred.
//!
//! This implementation introduces strong typing and construction-time
//! validation to prevent malformed security contexts and improve
//! assurance in higher-level labeling systems.
//!
//! ## Design Note
//!
//! Earlier revisions of this type required a trailing `_u` suffix and a
//! minimum length of three bytes, matching the naming convention of the
//! reference policy (`system_u`, `staff_u`, ...). SEAndroid policy does not
//! follow that convention: its single security user is the bare `u`, which
//! carries no suffix and is a single byte long. Validation here is limited
//! to character set and length — the suffix rule was dropped rather than
//! special-cased, the same way `Label` dropped its own `_t` suffix rule.

use std::fmt;
use std::str::FromStr;

//
// =============================================================================
// SelinuxUser Primitive
// =============================================================================
//
// Represents a validated `SELinux` security user identifier.
//
// Example values:
//
//   system_u
//   staff_u
//   user_u
//   u
//
// Validation rules enforced:
//
// • ASCII only
// • No whitespace
// • Character set: [a-z0-9_]
// • Non-empty
// • Length 1–255 bytes
//

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelinuxUser(String);

pub const MAX_USER_LEN: usize = 255;

//
// =============================================================================
// Error Taxonomy
// =============================================================================
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    Empty,
    TooLong(usize),
    InvalidCharacter(char),
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => {
                write!(f, "SELinux user cannot be empty")
            }

            Self::TooLong(len) => {
                write!(f, "SELinux user exceeds maximum length ({len})")
            }

            Self::InvalidCharacter(ch) => {
                write!(f, "invalid character '{ch}' in SELinux user")
            }
        }
    }
}

impl std::error::Error for UserError {}


//
// =============================================================================
// Constructors
// =============================================================================
//

impl SelinuxUser {
    ///
    /// Creates a new validated `SELinux` user identifier.
    ///
    /// Validation rules:
    /// • ASCII only
    /// • No whitespace
    /// • Length within policy bounds
    ///
    /// # Errors
    ///
    /// Returns `UserError` if:
    /// • The identifier contains non-ASCII characters.
    /// • The identifier contains whitespace.
    /// • The identifier exceeds length constraints.
    ///
    pub fn new<S: Into<String>>(input: S) -> Result<Self, UserError> {
        let value = input.into();

        validate_user(&value)?;

        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//
// =============================================================================
// Validation Logic
// =============================================================================
//

fn validate_user(value: &str) -> Result<(), UserError> {
    if value.is_empty() {
        return Err(UserError::Empty);
    }

    if value.len() > MAX_USER_LEN {
        return Err(UserError::TooLong(value.len()));
    }

    for ch in value.chars() {
        if !ch.is_ascii_lowercase()
            && !ch.is_ascii_digit()
            && ch != '_'
        {
            return Err(UserError::InvalidCharacter(ch));
        }
    }

    Ok(())
}

//
// =============================================================================
// Trait Implementations
// =============================================================================
//

impl fmt::Display for SelinuxUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SelinuxUser {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SelinuxUser {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_bare_seandroid_user() {
        assert!(SelinuxUser::new("u").is_ok());
    }

    #[test]
    fn accepts_users_with_a_u_suffix() {
        assert!(SelinuxUser::new("system_u").is_ok());
        assert!(SelinuxUser::new("staff_u").is_ok());
    }

    #[test]
    fn rejects_empty_and_invalid_characters() {
        assert_eq!(SelinuxUser::new(""), Err(UserError::Empty));
        assert!(matches!(
            SelinuxUser::new("Bad-User"),
            Err(UserError::InvalidCharacter(_))
        ));
    }
}
