// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Permission weight map: per-`(class, permission)` read/write direction and
//! weight, used to turn an allow rule's raw permission list into a
//! read/write information-flow judgment.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MapEntry {
    direction: Direction,
    weight: u32,
    enabled: bool,
}

/// Maps `(class, permission) -> MapEntry`. Built once from a permission-map
/// text file and then queried per allow rule.
#[derive(Debug, Clone, Default)]
pub struct PermissionMap {
    entries: HashMap<(String, String), MapEntry>,
}

/// The per-rule classification `rule_infoflow` produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleInfoflow {
    pub read_weight: u32,
    pub write_weight: u32,
    pub read_perms: Vec<String>,
    pub write_perms: Vec<String>,
    pub unknown_perms: Vec<String>,
}

impl PermissionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: &str, perm: &str, direction: Direction, weight: u32, enabled: bool) {
        self.entries.insert(
            (class.to_string(), perm.to_string()),
            MapEntry {
                direction,
                weight,
                enabled,
            },
        );
    }

    /// Parses the external text format: whitespace-separated rows
    /// `class permission direction weight enabled`, where `direction` is one
    /// of `r`/`w`/`b` and `enabled` is `1`/`0`. Blank lines and `#` comments
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first malformed row.
    pub fn from_text(text: &str) -> Result<Self, String> {
        let mut map = Self::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(format!("line {}: expected 5 fields", lineno + 1));
            }
            let direction = match fields[2] {
                "r" => Direction::Read,
                "w" => Direction::Write,
                "b" => Direction::Both,
                other => return Err(format!("line {}: unknown direction {other:?}", lineno + 1)),
            };
            let weight: u32 = fields[3]
                .parse()
                .map_err(|_| format!("line {}: invalid weight", lineno + 1))?;
            let enabled = match fields[4] {
                "1" => true,
                "0" => false,
                other => return Err(format!("line {}: invalid enabled flag {other:?}", lineno + 1)),
            };
            map.insert(fields[0], fields[1], direction, weight, enabled);
        }
        Ok(map)
    }

    /// Classifies one allow rule's permission list into read/write weights
    /// and permission sets, per `spec.md` §4.3.
    #[must_use]
    pub fn rule_infoflow(&self, class: &str, perms: &[String]) -> RuleInfoflow {
        let mut out = RuleInfoflow::default();
        for perm in perms {
            let Some(entry) = self.entries.get(&(class.to_string(), perm.clone())) else {
                out.unknown_perms.push(perm.clone());
                continue;
            };
            if !entry.enabled {
                continue;
            }
            match entry.direction {
                Direction::Read => {
                    out.read_perms.push(perm.clone());
                    out.read_weight = out.read_weight.max(entry.weight);
                }
                Direction::Write => {
                    out.write_perms.push(perm.clone());
                    out.write_weight = out.write_weight.max(entry.weight);
                }
                Direction::Both => {
                    out.read_perms.push(perm.clone());
                    out.write_perms.push(perm.clone());
                    out.read_weight = out.read_weight.max(entry.weight);
                    out.write_weight = out.write_weight.max(entry.weight);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> PermissionMap {
        PermissionMap::from_text(
            "file read r 1 1\n\
             file write w 2 1\n\
             file append b 1 1\n\
             file ioctl r 1 0\n",
        )
        .unwrap()
    }

    #[test]
    fn classifies_read_write_and_both() {
        let map = sample_map();
        let info = map.rule_infoflow(
            "file",
            &["read".into(), "write".into(), "append".into()],
        );
        assert_eq!(info.read_perms, vec!["read", "append"]);
        assert_eq!(info.write_perms, vec!["write", "append"]);
        assert_eq!(info.read_weight, 1);
        assert_eq!(info.write_weight, 2);
        assert!(info.unknown_perms.is_empty());
    }

    #[test]
    fn disabled_mapping_is_skipped() {
        let map = sample_map();
        let info = map.rule_infoflow("file", &["ioctl".into()]);
        assert!(info.read_perms.is_empty());
        assert!(info.unknown_perms.is_empty());
    }

    #[test]
    fn unknown_class_or_permission_is_recorded() {
        let map = sample_map();
        let info = map.rule_infoflow("file", &["execute".into()]);
        assert_eq!(info.unknown_perms, vec!["execute"]);
    }
}
