// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Cross-policy product graph: the pairwise join of two policies' simplified
//! graphs, keyed by labels whose file-context languages intersect
//! nonemptily (`spec.md` §4.6).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::QueryError;
use crate::nfa::Nfa;
use crate::policy::Policy;

pub type ProductNode = (String, String);

/// Which policy an edge (or a query's modal index) refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Maps the query language's `1`/`2` index to a side.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::IndexError`] for any index other than 1 or 2.
    pub fn from_index(i: u8) -> Result<Self, QueryError> {
        match i {
            1 => Ok(Self::Left),
            2 => Ok(Self::Right),
            other => Err(QueryError::IndexError(other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductGraph {
    pub nodes: BTreeSet<ProductNode>,
    /// Keyed by `(src, dst)`; value is the set of directions a parallel
    /// edge exists for (a node pair may have a `left` edge, a `right` edge,
    /// or both).
    pub edges: BTreeMap<(ProductNode, ProductNode), BTreeSet<Side>>,
}

impl ProductGraph {
    /// Builds the product of `left` and `right`'s simplified graphs.
    /// `O(|L|*|R|)` NFA intersections dominate this construction; it runs
    /// sequentially (`spec.md` §5's parallelization note is not implemented
    /// here, see `DESIGN.md`).
    #[must_use]
    pub fn build(left: &Policy, right: &Policy) -> Self {
        let mut nodes = BTreeSet::new();
        for (lλ, lfc) in &left.file_contexts {
            for (rλ, rfc) in &right.file_contexts {
                if !Nfa::is_empty(&Nfa::intersection(&lfc.nfa, &rfc.nfa)) {
                    nodes.insert((lλ.clone(), rλ.clone()));
                }
            }
        }

        let mut edges: BTreeMap<(ProductNode, ProductNode), BTreeSet<Side>> = BTreeMap::new();
        for a @ (l1, r1) in &nodes {
            for b @ (l2, r2) in &nodes {
                if left.simple_graph_has_edge(l1, l2) {
                    edges
                        .entry((a.clone(), b.clone()))
                        .or_default()
                        .insert(Side::Left);
                }
                if right.simple_graph_has_edge(r1, r2) {
                    edges
                        .entry((a.clone(), b.clone()))
                        .or_default()
                        .insert(Side::Right);
                }
            }
        }

        Self { nodes, edges }
    }

    fn predecessors(&self, node: &ProductNode, dir: Side) -> Vec<ProductNode> {
        self.edges
            .iter()
            .filter(|(_, dirs)| dirs.contains(&dir))
            .filter(|((_, dst), _)| dst == node)
            .map(|((src, _), _)| src.clone())
            .collect()
    }

    fn successors(&self, node: &ProductNode, dir: Side) -> Vec<ProductNode> {
        self.edges
            .iter()
            .filter(|(_, dirs)| dirs.contains(&dir))
            .filter(|((src, _), _)| src == node)
            .map(|((_, dst), _)| dst.clone())
            .collect()
    }

    /// Least fixed point: every node reachable "backwards" from `s` along
    /// `dir`-edges. `s` itself is included only if some member of `s` is
    /// itself a predecessor (directly or transitively) of another member.
    #[must_use]
    pub fn eventually_reach(&self, s: &BTreeSet<ProductNode>, dir: Side) -> BTreeSet<ProductNode> {
        let mut t = BTreeSet::new();
        let mut queue: VecDeque<ProductNode> = s.iter().cloned().collect();
        while let Some(cur) = queue.pop_front() {
            for pred in self.predecessors(&cur, dir) {
                if t.insert(pred.clone()) {
                    queue.push_back(pred);
                }
            }
        }
        t
    }

    /// Symmetric forward BFS: every node reachable "forwards" from `s`
    /// along `dir`-edges.
    #[must_use]
    pub fn eventually_reached_by(
        &self,
        s: &BTreeSet<ProductNode>,
        dir: Side,
    ) -> BTreeSet<ProductNode> {
        let mut t = BTreeSet::new();
        let mut queue: VecDeque<ProductNode> = s.iter().cloned().collect();
        while let Some(cur) = queue.pop_front() {
            for succ in self.successors(&cur, dir) {
                if t.insert(succ.clone()) {
                    queue.push_back(succ);
                }
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The stub multigraph from `spec.md` §8 scenario S1, built directly
    /// against `ProductGraph` (sidestepping policy/FC construction) since
    /// the scenario is stated purely in graph terms.
    fn stub_graph() -> ProductGraph {
        let mk = |c: char| (c.to_string(), c.to_string());
        let nodes: BTreeSet<ProductNode> =
            ['A', 'B', 'C', 'D', 'E'].into_iter().map(mk).collect();
        let left_pairs = [
            ('A', 'B'),
            ('A', 'E'),
            ('C', 'C'),
            ('C', 'B'),
            ('D', 'C'),
            ('E', 'A'),
            ('E', 'E'),
        ];
        let mut edges: BTreeMap<(ProductNode, ProductNode), BTreeSet<Side>> = BTreeMap::new();
        for (u, v) in left_pairs {
            edges
                .entry((mk(u), mk(v)))
                .or_default()
                .insert(Side::Left);
        }
        for (u, v) in left_pairs {
            // right edges are the reverse of each left edge
            edges
                .entry((mk(v), mk(u)))
                .or_default()
                .insert(Side::Right);
        }
        ProductGraph { nodes, edges }
    }

    fn set(chars: &[char]) -> BTreeSet<ProductNode> {
        chars.iter().map(|&c| (c.to_string(), c.to_string())).collect()
    }

    #[test]
    fn s1_eventually_reach_matches_seed_scenario() {
        let g = stub_graph();
        assert_eq!(
            g.eventually_reach(&set(&['A']), Side::Left),
            set(&['A', 'E'])
        );
        assert_eq!(
            g.eventually_reach(&set(&['B']), Side::Left),
            set(&['A', 'C', 'D', 'E'])
        );
        assert_eq!(g.eventually_reach(&set(&['D']), Side::Left), BTreeSet::new());
        assert_eq!(
            g.eventually_reached_by(&set(&['B']), Side::Left),
            BTreeSet::new()
        );
    }

    #[test]
    fn eventually_reach_is_idempotent_and_monotone() {
        let g = stub_graph();
        let s = set(&['B']);
        let once = g.eventually_reach(&s, Side::Left);
        let twice = g.eventually_reach(&once, Side::Left);
        assert_eq!(twice, once);

        let t = set(&['B', 'C']);
        assert!(s.is_subset(&t));
        assert!(g
            .eventually_reach(&s, Side::Left)
            .is_subset(&g.eventually_reach(&t, Side::Left)));
    }
}
