// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! AST for the modal-logic query language (`spec.md` §4.7).

use crate::security::SecurityLvl;

/// Either of the two `SecurityLvl` variants or a literal type label —
/// `label_i(NAME)` accepts both spellings and the grammar can't tell them
/// apart until evaluation resolves `NAME` against the known security-level
/// keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRef {
    Security(SecurityLvl),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    TruePolicy,
    UpArrow(u8, LabelRef),
    And(Box<Formula>, Box<Formula>),
    Not(Box<Formula>),
    Diamond(u8, Box<Formula>),
    BDiamond(u8, Box<Formula>),
}
