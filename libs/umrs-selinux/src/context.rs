// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
// ============================================================================
// UMRS SELINUX: Security Context (Security Label)
// ============================================================================
//! Security Context (a.k.a, Security Label or just Label)
//!
//! This module defines the strongly-typed `SecurityContext` structure used
//! throughout the UMRS SELinux modeling layer.
//!
//! A Security Context represents the canonical SELinux label format:
//!     user : role : type [: mls]
//!
//! The `mls` component is a free-form string that may itself contain `:`
//! (e.g. `s0:c0.c15-s1:c0.c1023`), so parsing splits on the first three
//! colons only and treats everything after the third as the raw MLS field.
//! This implementation does not interpret the MLS field further (no
//! sensitivity/category lattice math) — callers that need that can layer it
//! on top of the raw string.

use std::fmt;
use std::str::FromStr;

use crate::label::Label;
use crate::role::SelinuxRole;
use crate::user::SelinuxUser;

// ===========================================================================
// SecurityContext structure
// ===========================================================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityContext {
    user: SelinuxUser,
    role: SelinuxRole,
    security_type: Label,
    mls: Option<String>,
}

impl SecurityContext {
    /// Creates a new `SecurityContext` with an optional raw MLS field.
    #[must_use]
    pub const fn new(
        user: SelinuxUser,
        role: SelinuxRole,
        security_type: Label,
        mls: Option<String>,
    ) -> Self {
        Self {
            user,
            role,
            security_type,
            mls,
        }
    }

    #[must_use]
    pub const fn user(&self) -> &SelinuxUser {
        &self.user
    }

    #[must_use]
    pub const fn role(&self) -> &SelinuxRole {
        &self.role
    }

    #[must_use]
    pub const fn security_type(&self) -> &Label {
        &self.security_type
    }

    #[must_use]
    pub fn mls(&self) -> Option<&str> {
        self.mls.as_deref()
    }
}

/// Provides canonical string serialization in standard SELinux format.
impl fmt::Display for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mls {
            Some(mls) => write!(
                f,
                "{}:{}:{}:{}",
                self.user, self.role, self.security_type, mls
            ),
            None => write!(f, "{}:{}:{}", self.user, self.role, self.security_type),
        }
    }
}

// ===========================================================================
// Error Taxonomy
// ===========================================================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextParseError {
    InvalidFormat,
    InvalidUser,
    InvalidRole,
    InvalidType,
}

impl fmt::Display for ContextParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid security context format"),
            Self::InvalidUser => write!(f, "invalid SELinux user field"),
            Self::InvalidRole => write!(f, "invalid SELinux role field"),
            Self::InvalidType => write!(f, "invalid SELinux type field"),
        }
    }
}

impl std::error::Error for ContextParseError {}

// ===========================================================================
// Parsing
// ===========================================================================
impl FromStr for SecurityContext {
    type Err = ContextParseError;

    /// Splits on the first three colons only: `user:role:type[:mls]`, where
    /// `mls` (if present) is everything after the third colon, colons and
    /// all.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');

        let user_s = parts.next().ok_or(ContextParseError::InvalidFormat)?;
        let role_s = parts.next().ok_or(ContextParseError::InvalidFormat)?;
        let type_s = parts.next().ok_or(ContextParseError::InvalidFormat)?;
        let mls_s = parts.next();

        if user_s.is_empty() || role_s.is_empty() || type_s.is_empty() {
            return Err(ContextParseError::InvalidFormat);
        }

        let user = SelinuxUser::from_str(user_s).map_err(|_| ContextParseError::InvalidUser)?;
        let role = SelinuxRole::from_str(role_s).map_err(|_| ContextParseError::InvalidRole)?;
        let security_type = Label::from_str(type_s).map_err(|_| ContextParseError::InvalidType)?;

        Ok(Self::new(user, role, security_type, mls_s.map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_part_context() {
        let ctx: SecurityContext = "system_u:system_r:sshd_t".parse().unwrap();
        assert_eq!(ctx.security_type().as_str(), "sshd_t");
        assert_eq!(ctx.mls(), None);
    }

    #[test]
    fn mls_field_keeps_embedded_colons() {
        let ctx: SecurityContext = "system_u:system_r:sshd_t:s0:c0.c15-s1:c0.c1023"
            .parse()
            .unwrap();
        assert_eq!(ctx.mls(), Some("s0:c0.c15-s1:c0.c1023"));
    }

    #[test]
    fn round_trips_through_display() {
        let original = "system_u:system_r:isolated1:s0";
        let ctx: SecurityContext = original.parse().unwrap();
        assert_eq!(ctx.to_string(), original);
    }

    #[test]
    fn rejects_fewer_than_three_components() {
        assert_eq!(
            "system_u:system_r".parse::<SecurityContext>(),
            Err(ContextParseError::InvalidFormat)
        );
    }
}
