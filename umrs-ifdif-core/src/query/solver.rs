// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Denotational evaluator: maps a [`Formula`] to the set of product-graph
//! nodes satisfying it (`spec.md` §4.7's semantics section).

use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::policy::Policy;
use crate::product::{ProductGraph, ProductNode, Side};

use super::ast::{Formula, LabelRef};

fn project(node: &ProductNode, side: Side) -> &str {
    match side {
        Side::Left => &node.0,
        Side::Right => &node.1,
    }
}

/// Evaluates `formula` over `graph`, the product of `left` and `right`.
///
/// # Errors
///
/// Returns [`QueryError::IndexError`] if a modal operator or `label_i` uses
/// an index other than 1 or 2.
pub fn eval(
    formula: &Formula,
    graph: &ProductGraph,
    left: &Policy,
    right: &Policy,
) -> Result<BTreeSet<ProductNode>, QueryError> {
    match formula {
        Formula::TruePolicy => Ok(graph.nodes.clone()),

        Formula::UpArrow(idx, label_ref) => {
            let side = Side::from_index(*idx)?;
            let policy = match side {
                Side::Left => left,
                Side::Right => right,
            };
            let matches: BTreeSet<String> = match label_ref {
                LabelRef::Security(lvl) => policy.labels_with_security_level(*lvl),
                LabelRef::Literal(name) => BTreeSet::from([name.clone()]),
            };
            Ok(graph
                .nodes
                .iter()
                .filter(|n| matches.contains(project(n, side)))
                .cloned()
                .collect())
        }

        Formula::And(l, r) => {
            let ls = eval(l, graph, left, right)?;
            let rs = eval(r, graph, left, right)?;
            Ok(ls.intersection(&rs).cloned().collect())
        }

        Formula::Not(inner) => {
            let s = eval(inner, graph, left, right)?;
            Ok(graph.nodes.difference(&s).cloned().collect())
        }

        Formula::Diamond(idx, inner) => {
            let side = Side::from_index(*idx)?;
            let s = eval(inner, graph, left, right)?;
            Ok(graph.eventually_reach(&s, side))
        }

        Formula::BDiamond(idx, inner) => {
            let side = Side::from_index(*idx)?;
            let s = eval(inner, graph, left, right)?;
            Ok(graph.eventually_reached_by(&s, side))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use std::collections::BTreeMap;

    fn mk(l: &str, r: &str) -> ProductNode {
        (l.to_string(), r.to_string())
    }

    fn graph_ab() -> ProductGraph {
        let nodes = BTreeSet::from([mk("a", "a"), mk("b", "b")]);
        let mut edges = BTreeMap::new();
        edges.insert((mk("a", "a"), mk("b", "b")), BTreeSet::from([Side::Left]));
        ProductGraph { nodes, edges }
    }

    #[test]
    fn true_denotes_all_nodes() {
        let g = graph_ab();
        let formula = parse("true").unwrap();
        let left = dummy_policy();
        let right = dummy_policy();
        let result = eval(&formula, &g, &left, &right).unwrap();
        assert_eq!(result, g.nodes);
    }

    #[test]
    fn de_morgan_holds() {
        let g = graph_ab();
        let left = dummy_policy();
        let right = dummy_policy();
        let phi = parse("label_1(a)").unwrap();
        let psi = parse("label_2(b)").unwrap();

        let not_and = eval(
            &crate::query::ast::Formula::Not(Box::new(crate::query::ast::Formula::And(
                Box::new(phi.clone()),
                Box::new(psi.clone()),
            ))),
            &g,
            &left,
            &right,
        )
        .unwrap();

        let not_phi = crate::query::ast::Formula::Not(Box::new(phi));
        let not_psi = crate::query::ast::Formula::Not(Box::new(psi));
        let or_via_not_and_not = eval(
            &crate::query::ast::Formula::Not(Box::new(crate::query::ast::Formula::And(
                Box::new(not_phi),
                Box::new(not_psi),
            ))),
            &g,
            &left,
            &right,
        )
        .unwrap();

        assert_eq!(not_and, or_via_not_and_not);
    }

    fn dummy_policy() -> Policy {
        use crate::decoder::TextPolicyRuleSource;
        use crate::permmap::PermissionMap;

        let rules = TextPolicyRuleSource::parse("").unwrap();
        let permmap = PermissionMap::new();
        Policy::load(
            "dummy",
            &rules,
            "",
            "",
            &permmap,
            "ro.build.version.release = 14\n\
             ro.build.version.incremental = 1\n\
             ro.build.version.security_patch = 2026-01-01\n",
        )
        .unwrap()
    }
}
