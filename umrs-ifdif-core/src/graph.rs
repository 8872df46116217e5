// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Directed, typed information-flow graph over interned type labels, built
//! from allow rules and type-transition rules, plus the subject-only
//! contraction that produces the simplified graph.
//!
//! Labels are interned to `u32` indices (`spec.md` §9: "use integer indices
//! into a label table... rather than string-keyed hash maps") so adjacency
//! lookups and edge keys stay cheap even on policies with tens of thousands
//! of types.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use bitflags::bitflags;

use crate::decoder::PolicyRule;
use crate::file_context::FileContext;
use crate::permmap::PermissionMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeType: u8 {
        const READ  = 0b0001;
        const WRITE = 0b0010;
        const UNKN  = 0b0100;
        const ADDL  = 0b1000;
        const BOTH  = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Interns label strings to dense `u32` indices.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    strings: Vec<String>,
    ids: HashMap<String, u32>,
}

impl LabelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, label: &str) -> u32 {
        if let Some(&id) = self.ids.get(label) {
            return id;
        }
        let id = u32::try_from(self.strings.len()).expect("label table overflow");
        self.strings.push(label.to_string());
        self.ids.insert(label.to_string(), id);
        id
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<u32> {
        self.ids.get(label).copied()
    }

    #[must_use]
    pub fn label_of(&self, id: u32) -> &str {
        &self.strings[id as usize]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyNode {
    pub is_subject: bool,
    pub is_object: bool,
    /// `(source_label, fc_label)` pairs from type_transition rules whose
    /// `default` is this node.
    pub transitions: Vec<(String, String)>,
    pub security_level: crate::security::SecurityLvl,
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEdge {
    pub edge_type: EdgeType,
    pub perms: BTreeSet<String>,
    /// Populated only for `ADDL` edges synthesized during contraction.
    pub omitted: Vec<String>,
}

/// A directed, typed information-flow graph. Used for both the full graph
/// and the subject-only-contracted simple graph — the two differ only in
/// which nodes/edges survive, not in representation.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub labels: LabelTable,
    pub nodes: BTreeMap<u32, PolicyNode>,
    pub edges: BTreeMap<(u32, u32), PolicyEdge>,
}

impl Graph {
    fn get_or_create(&mut self, label: &str) -> u32 {
        let id = self.labels.intern(label);
        self.nodes.entry(id).or_default();
        id
    }

    fn add_edge(&mut self, src: u32, dst: u32, ty: EdgeType, perms: &[String]) {
        let edge = self.edges.entry((src, dst)).or_default();
        edge.edge_type |= ty;
        edge.perms.extend(perms.iter().cloned());
    }

    #[must_use]
    pub fn out_neighbors(&self, id: u32) -> Vec<u32> {
        self.edges
            .keys()
            .filter(|&&(u, _)| u == id)
            .map(|&(_, v)| v)
            .collect()
    }

    #[must_use]
    pub fn in_neighbors(&self, id: u32) -> Vec<u32> {
        self.edges
            .keys()
            .filter(|&&(_, v)| v == id)
            .map(|&(u, _)| u)
            .collect()
    }

    /// BFS reachability from `start`, used by the reachability-preservation
    /// test between the full and simple graphs.
    #[must_use]
    pub fn reachable_from(&self, start: u32) -> BTreeSet<u32> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(s) = queue.pop_front() {
            for n in self.out_neighbors(s) {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    fn degree(&self, id: u32) -> usize {
        self.edges
            .keys()
            .filter(|&&(u, v)| u == id || v == id)
            .count()
    }

    /// Subject-only contraction (`spec.md` §4.4): repeatedly removes
    /// non-object nodes in ascending-degree (then lexicographic label)
    /// order, synthesizing `ADDL` bridge edges so that reachability between
    /// surviving (object) nodes is preserved. The result's node set is
    /// exactly the labels with `is_object == true`.
    #[must_use]
    pub fn simplify(&self) -> Self {
        let mut edges = self.edges.clone();
        let mut nodes = self.nodes.clone();

        let mut order: Vec<u32> = self
            .nodes
            .iter()
            .filter(|(_, n)| !n.is_object)
            .map(|(&id, _)| id)
            .collect();
        order.sort_by_key(|&id| (self.degree(id), self.labels.label_of(id).to_string()));

        for n in order {
            let in_edges: Vec<u32> = edges
                .keys()
                .filter(|&&(u, v)| v == n && u != n)
                .map(|&(u, _)| u)
                .collect();
            let out_edges: Vec<u32> = edges
                .keys()
                .filter(|&&(u, v)| u == n && v != n)
                .map(|&(_, v)| v)
                .collect();

            for &p in &in_edges {
                for &q in &out_edges {
                    if edges.contains_key(&(p, q)) {
                        continue;
                    }
                    let mut omitted = vec![self.labels.label_of(n).to_string()];
                    if let Some(e) = edges.get(&(p, n)) {
                        if e.edge_type.contains(EdgeType::ADDL) {
                            omitted.extend(e.omitted.iter().cloned());
                        }
                    }
                    if let Some(e) = edges.get(&(n, q)) {
                        if e.edge_type.contains(EdgeType::ADDL) {
                            omitted.extend(e.omitted.iter().cloned());
                        }
                    }
                    edges.insert(
                        (p, q),
                        PolicyEdge {
                            edge_type: EdgeType::ADDL,
                            perms: BTreeSet::new(),
                            omitted,
                        },
                    );
                }
            }

            edges.retain(|&(u, v), _| u != n && v != n);
            nodes.remove(&n);
        }

        Self {
            labels: self.labels.clone(),
            nodes,
            edges,
        }
    }
}

/// Builds the full information-flow graph from a policy's rule stream, a
/// permission weight map, and the file-context map, per `spec.md` §4.4.
///
/// Returns the graph plus the set of type_transition targets that are not
/// known object labels (diagnostic only, per `spec.md` §7
/// `MissingTransitionContext`).
#[must_use]
pub fn build_full_graph(
    rules: &[PolicyRule],
    permmap: &PermissionMap,
    file_contexts: &BTreeMap<String, FileContext>,
) -> (Graph, BTreeSet<String>) {
    let mut graph = Graph::default();
    let mut missing_contexts = BTreeSet::new();

    for rule in rules {
        let PolicyRule::Av(av) = rule else { continue };
        let info = permmap.rule_infoflow(&av.class, &av.perms);
        let u = graph.get_or_create(av.source.as_str());
        let v = graph.get_or_create(av.target.as_str());
        if !info.read_perms.is_empty() {
            graph.add_edge(v, u, EdgeType::READ, &info.read_perms);
        }
        if !info.write_perms.is_empty() {
            graph.add_edge(u, v, EdgeType::WRITE, &info.write_perms);
        }
        if !info.unknown_perms.is_empty() {
            graph.add_edge(u, v, EdgeType::UNKN, &info.unknown_perms);
            graph.add_edge(v, u, EdgeType::UNKN, &info.unknown_perms);
        }
    }

    for type_label in file_contexts.keys() {
        let id = graph.get_or_create(type_label);
        graph.nodes.get_mut(&id).expect("just created").is_object = true;
    }

    for rule in rules {
        let PolicyRule::Te(te) = rule else { continue };
        let default_id = graph.get_or_create(te.default.as_str());
        let node = graph.nodes.get_mut(&default_id).expect("just created");
        node.is_subject = true;
        node.transitions
            .push((te.source.as_str().to_string(), te.target.as_str().to_string()));
        if !file_contexts.contains_key(te.target.as_str()) {
            missing_contexts.insert(te.target.as_str().to_string());
        }
    }

    (graph, missing_contexts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{AvRule, TeRule};
    use umrs_selinux::Label;

    fn label(s: &str) -> Label {
        Label::new(s).unwrap()
    }

    fn sample_permmap() -> PermissionMap {
        PermissionMap::from_text("file read r 1 1\nfile write w 1 1\n").unwrap()
    }

    #[test]
    fn repeated_allow_rules_union_perms_and_types() {
        let rules = vec![
            PolicyRule::Av(AvRule {
                source: label("untrusted_app"),
                target: label("data_file"),
                class: "file".into(),
                perms: vec!["read".into()],
            }),
            PolicyRule::Av(AvRule {
                source: label("untrusted_app"),
                target: label("data_file"),
                class: "file".into(),
                perms: vec!["write".into()],
            }),
        ];
        let (graph, _) = build_full_graph(&rules, &sample_permmap(), &BTreeMap::new());
        let u = graph.labels.get("untrusted_app").unwrap();
        let v = graph.labels.get("data_file").unwrap();
        // read(v->u): u reads from v's data
        assert!(graph.edges.contains_key(&(v, u)));
        // write(u->v)
        let write_edge = &graph.edges[&(u, v)];
        assert!(write_edge.edge_type.contains(EdgeType::WRITE));
        assert_eq!(
            write_edge.perms,
            BTreeSet::from(["write".to_string()])
        );
    }

    #[test]
    fn simplify_retains_exactly_object_nodes() {
        let rules = vec![
            PolicyRule::Av(AvRule {
                source: label("init"),
                target: label("shell_exec"),
                class: "file".into(),
                perms: vec!["read".into()],
            }),
            PolicyRule::Av(AvRule {
                source: label("shell"),
                target: label("toolbox_exec"),
                class: "file".into(),
                perms: vec!["read".into()],
            }),
            PolicyRule::Te(TeRule {
                source: label("init"),
                target: label("shell_exec"),
                class: "process".into(),
                default: label("shell"),
            }),
        ];
        let mut file_contexts = BTreeMap::new();
        file_contexts.insert(
            "shell_exec".to_string(),
            dummy_fc("shell_exec"),
        );
        file_contexts.insert(
            "toolbox_exec".to_string(),
            dummy_fc("toolbox_exec"),
        );
        let (graph, _) = build_full_graph(&rules, &sample_permmap(), &file_contexts);
        let simple = graph.simplify();
        let object_labels: BTreeSet<&str> = simple
            .nodes
            .keys()
            .map(|&id| simple.labels.label_of(id))
            .collect();
        assert_eq!(
            object_labels,
            BTreeSet::from(["shell_exec", "toolbox_exec"])
        );
    }

    fn dummy_fc(type_label: &str) -> FileContext {
        use crate::nfa::Nfa;
        use std::str::FromStr;
        FileContext {
            type_label: type_label.to_string(),
            regexes: vec![format!("/{type_label}")],
            file_type: None,
            context: umrs_selinux::SecurityContext::from_str(&format!(
                "u:object_r:{type_label}:s0"
            ))
            .unwrap(),
            nfa: Nfa::from_regex(&format!("/{type_label}")).unwrap(),
        }
    }

    #[test]
    fn subject_only_contraction_preserves_subject_reachability() {
        // a -> m -> b, m is a non-object bridge; a and b are objects.
        let rules = vec![
            PolicyRule::Av(AvRule {
                source: label("a"),
                target: label("m"),
                class: "file".into(),
                perms: vec!["write".into()],
            }),
            PolicyRule::Av(AvRule {
                source: label("m"),
                target: label("b"),
                class: "file".into(),
                perms: vec!["write".into()],
            }),
        ];
        let mut file_contexts = BTreeMap::new();
        file_contexts.insert("a".to_string(), dummy_fc("a"));
        file_contexts.insert("b".to_string(), dummy_fc("b"));
        let (graph, _) = build_full_graph(&rules, &sample_permmap(), &file_contexts);
        let simple = graph.simplify();

        let a_full = graph.labels.get("a").unwrap();
        let b_full = graph.labels.get("b").unwrap();
        let full_reach = graph.reachable_from(a_full).contains(&b_full);

        let a_simple = simple.labels.get("a").unwrap();
        let b_simple = simple.labels.get("b").unwrap();
        let simple_reach = simple.reachable_from(a_simple).contains(&b_simple);

        assert_eq!(full_reach, simple_reach);
        assert!(full_reach);
    }
}
