// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! The `Policy` bundle: one loaded policy snapshot (file-context map, full
//! and simple graphs, per-label security levels, and version properties),
//! plus the cross-policy differencing operations of `spec.md` §4.8.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::{info, warn};
use similar::{ChangeTag, TextDiff};

use crate::decoder::PolicyRuleSource;
use crate::error::PolicyLoadError;
use crate::file_context::{build_file_contexts, FileContext};
use crate::graph::{build_full_graph, Graph};
use crate::nfa::Nfa;
use crate::permmap::PermissionMap;
use crate::security::{classify, SecurityLvl};

/// Parsed from `build.prop`-style `key = value` lines (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyProperties {
    pub version_major: u32,
    pub version_incremental: u32,
    pub security_patch: NaiveDate,
}

impl PolicyProperties {
    /// Parses the three required `build.prop` keys.
    ///
    /// `ro.build.version.incremental` is permitted to be non-numeric, in
    /// which case it is treated as `0` with a warning rather than failing
    /// the whole load (`spec.md` §6).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyLoadError::MalformedProperty`] if a required key is
    /// missing, or if `ro.build.version.release` or
    /// `ro.build.version.security_patch` cannot be parsed.
    pub fn parse(text: &str) -> Result<Self, PolicyLoadError> {
        let mut release = None;
        let mut incremental = None;
        let mut patch = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "ro.build.version.release" => release = Some(value.to_string()),
                "ro.build.version.incremental" => incremental = Some(value.to_string()),
                "ro.build.version.security_patch" => patch = Some(value.to_string()),
                _ => {}
            }
        }

        let release = release.ok_or_else(|| PolicyLoadError::MalformedProperty {
            key: "ro.build.version.release".to_string(),
            reason: "missing".to_string(),
        })?;
        let version_major: u32 = release
            .parse()
            .map_err(|_| PolicyLoadError::MalformedProperty {
                key: "ro.build.version.release".to_string(),
                reason: format!("{release:?} is not an integer"),
            })?;

        let incremental = incremental.ok_or_else(|| PolicyLoadError::MalformedProperty {
            key: "ro.build.version.incremental".to_string(),
            reason: "missing".to_string(),
        })?;
        let version_incremental: u32 = incremental.parse().unwrap_or_else(|_| {
            warn!("ro.build.version.incremental {incremental:?} is not numeric, treating as 0");
            0
        });

        let patch = patch.ok_or_else(|| PolicyLoadError::MalformedProperty {
            key: "ro.build.version.security_patch".to_string(),
            reason: "missing".to_string(),
        })?;
        let security_patch = NaiveDate::parse_from_str(&patch, "%Y-%m-%d").map_err(|e| {
            PolicyLoadError::MalformedProperty {
                key: "ro.build.version.security_patch".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            version_major,
            version_incremental,
            security_patch,
        })
    }
}

/// A single loaded policy snapshot, immutable once built.
#[derive(Debug, Clone)]
pub struct Policy {
    pub path: String,
    pub properties: PolicyProperties,
    pub file_contexts: std::collections::BTreeMap<String, FileContext>,
    pub graph: Graph,
    pub simple_graph: Graph,
    pub security_levels: std::collections::BTreeMap<String, SecurityLvl>,
    pub missing_contexts: BTreeSet<String>,
    /// Normalized (whitespace-collapsed, trimmed) `plat_file_contexts`
    /// lines, preserved for `fc_diff`.
    plat_file_contexts_lines: Vec<String>,
}

/// Trims and whitespace-collapses non-empty `plat_file_contexts` lines for
/// later use by [`fc_diff`]. When file contexts are loaded from a cache
/// (`--load`), the raw text is unavailable and this is skipped.
fn normalize_fc_lines(plat_file_contexts: &str) -> Vec<String> {
    plat_file_contexts
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

impl Policy {
    /// Loads a policy from its component pieces. `rule_source` stands in
    /// for the external sepolicy decoder (`spec.md` §1/§6).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyLoadError`] if the file-context rules or
    /// `build.prop` properties are malformed in a way this layer considers
    /// fatal.
    pub fn load(
        path: &str,
        rule_source: &dyn PolicyRuleSource,
        plat_file_contexts: &str,
        vendor_file_contexts: &str,
        permmap: &PermissionMap,
        build_prop: &str,
    ) -> Result<Self, PolicyLoadError> {
        info!("loading policy at {path}");
        let properties = PolicyProperties::parse(build_prop)?;
        let file_contexts =
            build_file_contexts(&[plat_file_contexts, vendor_file_contexts])?;
        let plat_file_contexts_lines = normalize_fc_lines(plat_file_contexts);

        Self::assemble(
            path,
            properties,
            file_contexts,
            plat_file_contexts_lines,
            rule_source,
            permmap,
        )
    }

    /// Loads a policy the same way as [`Self::load`], but from an
    /// already-deserialized file-context map (the `db/file_contexts.db`
    /// cache of `spec.md` §6) rather than raw `*_file_contexts` text. Used
    /// by the `--load` cache path.
    pub fn load_with_cached_file_contexts(
        path: &str,
        rule_source: &dyn PolicyRuleSource,
        file_contexts: std::collections::BTreeMap<String, FileContext>,
        permmap: &PermissionMap,
        build_prop: &str,
    ) -> Result<Self, PolicyLoadError> {
        info!("loading policy at {path} from cached file contexts");
        let properties = PolicyProperties::parse(build_prop)?;
        Self::assemble(path, properties, file_contexts, Vec::new(), rule_source, permmap)
    }

    fn assemble(
        path: &str,
        properties: PolicyProperties,
        file_contexts: std::collections::BTreeMap<String, FileContext>,
        plat_file_contexts_lines: Vec<String>,
        rule_source: &dyn PolicyRuleSource,
        permmap: &PermissionMap,
    ) -> Result<Self, PolicyLoadError> {
        let rules = rule_source.rules();
        let (graph, missing_contexts) = build_full_graph(&rules, permmap, &file_contexts);
        let simple_graph = graph.simplify();

        let mut security_levels = std::collections::BTreeMap::new();
        for label in graph.nodes.keys().map(|&id| graph.labels.label_of(id).to_string()) {
            security_levels.insert(label.clone(), classify(&label));
        }
        for label in file_contexts.keys() {
            security_levels
                .entry(label.clone())
                .or_insert_with(|| classify(label));
        }

        Ok(Self {
            path: path.to_string(),
            properties,
            file_contexts,
            graph,
            simple_graph,
            security_levels,
            missing_contexts,
            plat_file_contexts_lines,
        })
    }

    #[must_use]
    pub fn simple_graph_has_edge(&self, src: &str, dst: &str) -> bool {
        let (Some(u), Some(v)) = (self.simple_graph.labels.get(src), self.simple_graph.labels.get(dst)) else {
            return false;
        };
        self.simple_graph.edges.contains_key(&(u, v))
    }

    /// Labels this policy classifies as carrying (at least) `lvl`.
    #[must_use]
    pub fn labels_with_security_level(&self, lvl: SecurityLvl) -> BTreeSet<String> {
        self.security_levels
            .iter()
            .filter(|(_, &l)| l.contains(lvl))
            .map(|(label, _)| label.clone())
            .collect()
    }

    fn graph_reaches_level(&self, start: &str, lvl: SecurityLvl) -> bool {
        let Some(id) = self.graph.labels.get(start) else {
            return false;
        };
        self.graph
            .reachable_from(id)
            .iter()
            .any(|&n| {
                let label = self.graph.labels.label_of(n);
                self.security_levels
                    .get(label)
                    .is_some_and(|l| l.contains(lvl))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcDiffLine {
    Added(String),
    Removed(String),
    Unchanged(String),
}

/// Ordered diff of the two policies' normalized `plat_file_contexts` lines.
#[must_use]
pub fn fc_diff(left: &Policy, right: &Policy) -> Vec<FcDiffLine> {
    let left_text = left.plat_file_contexts_lines.join("\n");
    let right_text = right.plat_file_contexts_lines.join("\n");
    TextDiff::from_lines(&left_text, &right_text)
        .iter_all_changes()
        .map(|change| {
            let line = change.value().trim_end_matches('\n').to_string();
            match change.tag() {
                ChangeTag::Delete => FcDiffLine::Removed(line),
                ChangeTag::Insert => FcDiffLine::Added(line),
                ChangeTag::Equal => FcDiffLine::Unchanged(line),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDiff {
    pub nodes_only_left: BTreeSet<String>,
    pub nodes_only_right: BTreeSet<String>,
    pub edges_only_left: BTreeSet<(String, String)>,
    pub edges_only_right: BTreeSet<(String, String)>,
}

/// Set differences of the two policies' full graph nodes and edges.
#[must_use]
pub fn type_diff(left: &Policy, right: &Policy) -> TypeDiff {
    let left_nodes: BTreeSet<String> = left
        .graph
        .nodes
        .keys()
        .map(|&id| left.graph.labels.label_of(id).to_string())
        .collect();
    let right_nodes: BTreeSet<String> = right
        .graph
        .nodes
        .keys()
        .map(|&id| right.graph.labels.label_of(id).to_string())
        .collect();

    let left_edges: BTreeSet<(String, String)> = left
        .graph
        .edges
        .keys()
        .map(|&(u, v)| {
            (
                left.graph.labels.label_of(u).to_string(),
                left.graph.labels.label_of(v).to_string(),
            )
        })
        .collect();
    let right_edges: BTreeSet<(String, String)> = right
        .graph
        .edges
        .keys()
        .map(|&(u, v)| {
            (
                right.graph.labels.label_of(u).to_string(),
                right.graph.labels.label_of(v).to_string(),
            )
        })
        .collect();

    TypeDiff {
        nodes_only_left: left_nodes.difference(&right_nodes).cloned().collect(),
        nodes_only_right: right_nodes.difference(&left_nodes).cloned().collect(),
        edges_only_left: left_edges.difference(&right_edges).cloned().collect(),
        edges_only_right: right_edges.difference(&left_edges).cloned().collect(),
    }
}

#[derive(Debug, Clone)]
pub struct SecurityLvsDiff {
    pub labels: BTreeSet<String>,
    pub diff_nfa: Nfa,
}

/// Labels that regressed from "cannot reach CRITICAL" (or didn't exist) in
/// `left` to "UNTRUSTED and reaches CRITICAL" in `right`, plus the minimized
/// NFA of paths newly claimed by those labels (`spec.md` §4.8).
#[must_use]
pub fn security_lvs_diff(left: &Policy, right: &Policy) -> SecurityLvsDiff {
    let mut labels = BTreeSet::new();
    for label in right.labels_with_security_level(SecurityLvl::UNTRUSTED) {
        if !right.graph_reaches_level(&label, SecurityLvl::CRITICAL) {
            continue;
        }
        let regressed = left.graph.labels.get(&label).is_none()
            || !left.graph_reaches_level(&label, SecurityLvl::CRITICAL);
        if regressed {
            labels.insert(label);
        }
    }

    let mut right_paths = Nfa::empty_language();
    for label in &labels {
        if let Some(fc) = right.file_contexts.get(label) {
            right_paths = Nfa::union(&right_paths, &fc.nfa);
        }
    }
    let mut left_paths = Nfa::empty_language();
    for label in &labels {
        if let Some(fc) = left.file_contexts.get(label) {
            left_paths = Nfa::union(&left_paths, &fc.nfa);
        }
    }
    let diff_nfa = Nfa::minimize(&Nfa::intersection(&right_paths, &Nfa::complement(&left_paths)));

    SecurityLvsDiff { labels, diff_nfa }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::TextPolicyRuleSource;

    const BUILD_PROP: &str = "\
ro.build.version.release = 14\n\
ro.build.version.incremental = 12345\n\
ro.build.version.security_patch = 2026-01-05\n";

    fn permmap() -> PermissionMap {
        PermissionMap::from_text("file read r 1 1\nfile write w 1 1\n").unwrap()
    }

    fn fc(label: &str) -> String {
        format!("/{label}(/.*)?  u:object_r:{label}:s0\n")
    }

    /// Scenario S3: identical policies satisfying `untrusted -> critical`
    /// produce an empty `security_lvs_diff`.
    #[test]
    fn s3_identical_policies_yield_empty_diff() {
        let plat = format!(
            "{}{}",
            fc("isolated1_untrusted"),
            fc("isolated2_critical_system")
        );
        let rules = TextPolicyRuleSource::parse(
            "allow isolated1_untrusted isolated2_critical_system file write\n",
        )
        .unwrap();
        let permmap = permmap();

        let left = Policy::load("left", &rules, &plat, "", &permmap, BUILD_PROP).unwrap();
        let right = Policy::load("right", &rules, &plat, "", &permmap, BUILD_PROP).unwrap();

        let diff = security_lvs_diff(&left, &right);
        assert!(diff.labels.is_empty());
        assert!(Nfa::is_empty(&diff.diff_nfa));
    }

    /// Scenario S4: left policy is missing the critical type entirely.
    #[test]
    fn s4_left_missing_critical_type() {
        let plat_right = format!(
            "{}{}",
            fc("isolated1_untrusted"),
            fc("isolated2_critical_system")
        );
        let plat_left = fc("isolated1_untrusted");
        let rules_right = TextPolicyRuleSource::parse(
            "allow isolated1_untrusted isolated2_critical_system file write\n",
        )
        .unwrap();
        let rules_left = TextPolicyRuleSource::parse("").unwrap();
        let permmap = permmap();

        let left = Policy::load("left", &rules_left, &plat_left, "", &permmap, BUILD_PROP).unwrap();
        let right =
            Policy::load("right", &rules_right, &plat_right, "", &permmap, BUILD_PROP).unwrap();

        let diff = security_lvs_diff(&left, &right);
        assert_eq!(
            diff.labels,
            BTreeSet::from(["isolated1_untrusted".to_string()])
        );
    }

    /// Scenario S5: left policy is missing the untrusted type entirely.
    #[test]
    fn s5_left_missing_untrusted_type() {
        let plat_right = format!(
            "{}{}",
            fc("isolated1_untrusted"),
            fc("isolated2_critical_system")
        );
        let rules_right = TextPolicyRuleSource::parse(
            "allow isolated1_untrusted isolated2_critical_system file write\n",
        )
        .unwrap();
        let rules_left = TextPolicyRuleSource::parse("").unwrap();
        let permmap = permmap();

        let left = Policy::load("left", &rules_left, "", "", &permmap, BUILD_PROP).unwrap();
        let right =
            Policy::load("right", &rules_right, &plat_right, "", &permmap, BUILD_PROP).unwrap();

        let diff = security_lvs_diff(&left, &right);
        assert_eq!(
            diff.labels,
            BTreeSet::from(["isolated1_untrusted".to_string()])
        );
    }

    /// Scenario S6: left only ever reaches a safe label, right reaches
    /// critical from both untrusted labels.
    #[test]
    fn s6_left_reaches_only_safe_label() {
        let plat_right = format!(
            "{}{}{}",
            fc("isolated1_untrusted"),
            fc("isolated2_critical_system"),
            fc("critical_sink")
        );
        let plat_left = format!(
            "{}{}{}",
            fc("isolated1_untrusted"),
            fc("isolated2_critical_system"),
            fc("safe_label")
        );
        let rules_right = TextPolicyRuleSource::parse(
            "allow isolated1_untrusted critical_sink file write\n\
             allow isolated2_critical_system critical_sink file write\n",
        )
        .unwrap();
        let rules_left = TextPolicyRuleSource::parse(
            "allow isolated1_untrusted safe_label file write\n\
             allow isolated2_critical_system safe_label file write\n",
        )
        .unwrap();
        let permmap = permmap();

        let left = Policy::load("left", &rules_left, &plat_left, "", &permmap, BUILD_PROP).unwrap();
        let right =
            Policy::load("right", &rules_right, &plat_right, "", &permmap, BUILD_PROP).unwrap();

        let diff = security_lvs_diff(&left, &right);
        assert_eq!(
            diff.labels,
            BTreeSet::from([
                "isolated1_untrusted".to_string(),
                "isolated2_critical_system".to_string()
            ])
        );
    }

    #[test]
    fn fc_diff_reports_added_and_removed_lines() {
        let permmap = permmap();
        let rules = TextPolicyRuleSource::parse("").unwrap();
        let left = Policy::load("left", &rules, &fc("isolated1_untrusted"), "", &permmap, BUILD_PROP)
            .unwrap();
        let right = Policy::load(
            "right",
            &rules,
            &fc("isolated2_critical_system"),
            "",
            &permmap,
            BUILD_PROP,
        )
        .unwrap();
        let diff = fc_diff(&left, &right);
        assert!(diff.iter().any(|l| matches!(l, FcDiffLine::Removed(_))));
        assert!(diff.iter().any(|l| matches!(l, FcDiffLine::Added(_))));
    }
}
