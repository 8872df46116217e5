// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Security-level tagging by keyword heuristic.
//!
//! A label's security level is a flag union, never a single enum variant —
//! a label can be simultaneously UNTRUSTED and CRITICAL if it matches
//! keywords from both lists. The heuristics are case-sensitive substring
//! matches on the raw label text; they are fragile by design (see design
//! notes) but downstream reachability semantics depend on them, so they are
//! reproduced exactly rather than "improved".

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SecurityLvl: u8 {
        const UNTRUSTED = 0b001;
        const TRUSTED   = 0b010;
        const CRITICAL  = 0b100;
    }
}

const UNTRUSTED_KEYWORDS: &[&str] = &[
    "isolate", "untrust", "danger", "user", "usr", "debug", "network",
];
const TRUSTED_KEYWORDS: &[&str] = &["trust", "secur"];
const CRITICAL_KEYWORDS: &[&str] = &["system", "pol", "critic", "manager"];

/// Classifies a single label by keyword substring match.
#[must_use]
pub fn classify(label: &str) -> SecurityLvl {
    let mut lvl = SecurityLvl::empty();

    if UNTRUSTED_KEYWORDS.iter().any(|kw| label.contains(kw)) {
        lvl |= SecurityLvl::UNTRUSTED;
    }
    if TRUSTED_KEYWORDS.iter().any(|kw| label.contains(kw)) && !label.contains("untrust") {
        lvl |= SecurityLvl::TRUSTED;
    }
    if CRITICAL_KEYWORDS.iter().any(|kw| label.contains(kw)) {
        lvl |= SecurityLvl::CRITICAL;
    }

    lvl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_app_is_untrusted_only() {
        assert_eq!(classify("untrusted_app"), SecurityLvl::UNTRUSTED);
    }

    #[test]
    fn system_server_is_critical() {
        assert!(classify("system_server").contains(SecurityLvl::CRITICAL));
    }

    #[test]
    fn trusted_requires_absence_of_untrust() {
        assert!(classify("trusted_key").contains(SecurityLvl::TRUSTED));
        assert!(!classify("untrusted_app").contains(SecurityLvl::TRUSTED));
    }

    #[test]
    fn label_can_be_multivalued() {
        let lvl = classify("isolated_policy_manager");
        assert!(lvl.contains(SecurityLvl::UNTRUSTED));
        assert!(lvl.contains(SecurityLvl::CRITICAL));
    }

    #[test]
    fn unmatched_label_is_none() {
        assert_eq!(classify("sshd_t"), SecurityLvl::empty());
    }
}
