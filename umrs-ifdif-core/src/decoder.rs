// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Policy rule-stream interface.
//!
//! The upstream SELinux policy decoder (binary `precompiled_sepolicy` in,
//! `AVRule`/`TERule` stream out) is out of scope for this crate — the engine
//! only consumes whatever stream a decoder produces. [`PolicyRuleSource`] is
//! the seam: anything that can hand back an iterator of [`PolicyRule`] can
//! feed the graph builder. [`TextPolicyRuleSource`] is the one concrete
//! implementation shipped here, a small line-oriented format used by tests
//! and by callers without access to a real decoder.

use umrs_selinux::Label;

/// `allow source target : class { perm1 perm2 ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvRule {
    pub source: Label,
    pub target: Label,
    pub class: String,
    pub perms: Vec<String>,
}

/// `type_transition source target : class default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeRule {
    pub source: Label,
    pub target: Label,
    pub class: String,
    pub default: Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyRule {
    Av(AvRule),
    Te(TeRule),
}

/// Anything that can produce a stream of policy rules. Implemented by the
/// real decoder in production, and by [`TextPolicyRuleSource`] for tests.
pub trait PolicyRuleSource {
    fn rules(&self) -> Vec<PolicyRule>;
}

/// A small in-memory/text rule source, one rule per line:
///
/// ```text
/// allow source target class perm1,perm2
/// type_transition source target object default
/// ```
///
/// Blank lines and lines starting with `#` are ignored. This format exists
/// purely to exercise the engine without a real binary policy decoder; it is
/// not meant to mirror any on-disk CIL or kernel policy format.
#[derive(Debug, Clone, Default)]
pub struct TextPolicyRuleSource {
    rules: Vec<PolicyRule>,
}

impl TextPolicyRuleSource {
    /// Parses `text` into a rule source.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first malformed line encountered.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut rules = Vec::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.first().copied() {
                Some("allow") => {
                    if fields.len() != 5 {
                        return Err(format!("line {}: expected 5 fields for allow", lineno + 1));
                    }
                    let source = Label::new(fields[1])
                        .map_err(|e| format!("line {}: {e}", lineno + 1))?;
                    let target = Label::new(fields[2])
                        .map_err(|e| format!("line {}: {e}", lineno + 1))?;
                    let class = fields[3].to_string();
                    let perms = fields[4].split(',').map(str::to_string).collect();
                    rules.push(PolicyRule::Av(AvRule {
                        source,
                        target,
                        class,
                        perms,
                    }));
                }
                Some("type_transition") => {
                    if fields.len() != 5 {
                        return Err(format!(
                            "line {}: expected 5 fields for type_transition",
                            lineno + 1
                        ));
                    }
                    let source = Label::new(fields[1])
                        .map_err(|e| format!("line {}: {e}", lineno + 1))?;
                    let target = Label::new(fields[2])
                        .map_err(|e| format!("line {}: {e}", lineno + 1))?;
                    let class = fields[3].to_string();
                    let default = Label::new(fields[4])
                        .map_err(|e| format!("line {}: {e}", lineno + 1))?;
                    rules.push(PolicyRule::Te(TeRule {
                        source,
                        target,
                        class,
                        default,
                    }));
                }
                _ => return Err(format!("line {}: unrecognized rule kind", lineno + 1)),
            }
        }
        Ok(Self { rules })
    }
}

impl PolicyRuleSource for TextPolicyRuleSource {
    fn rules(&self) -> Vec<PolicyRule> {
        self.rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_allow_and_transition_lines() {
        let src = TextPolicyRuleSource::parse(
            "# comment\n\
             allow untrusted_app isolated1 file read,write\n\
             type_transition init isolated1 process isolated2\n",
        )
        .unwrap();
        let rules = src.rules();
        assert_eq!(rules.len(), 2);
        assert!(matches!(rules[0], PolicyRule::Av(_)));
        assert!(matches!(rules[1], PolicyRule::Te(_)));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(TextPolicyRuleSource::parse("allow only_two_fields").is_err());
    }
}
