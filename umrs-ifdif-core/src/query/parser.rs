// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Hand-written recursive-descent parser for the query language.
//!
//! The grammar has exactly one binary operator (`and`), so a
//! precedence-climbing table would be overkill; precedence is encoded
//! directly in the call structure: `parse_and` loops over `parse_unary`,
//! and `parse_unary` is where `not` and the modal operators (`ito_i`,
//! `ifrom_i`) recurse into themselves, binding tighter than `and` by
//! construction.

use crate::error::QueryError;
use crate::security::SecurityLvl;

use super::ast::{Formula, LabelRef};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    True,
    And,
    Not,
    LabelOp(u8),
    Ito(u8),
    Ifrom(u8),
    LParen,
    RParen,
    Ident(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(classify_word(&word)?);
            }
            other => {
                return Err(QueryError::Parse(format!("unexpected character {other:?}")));
            }
        }
    }
    Ok(tokens)
}

fn classify_word(word: &str) -> Result<Token, QueryError> {
    if word == "true" {
        return Ok(Token::True);
    }
    if word == "and" {
        return Ok(Token::And);
    }
    if word == "not" {
        return Ok(Token::Not);
    }
    if let Some(idx) = word.strip_prefix("label_") {
        return Ok(Token::LabelOp(parse_index(idx)?));
    }
    if let Some(idx) = word.strip_prefix("ito_") {
        return Ok(Token::Ito(parse_index(idx)?));
    }
    if let Some(idx) = word.strip_prefix("ifrom_") {
        return Ok(Token::Ifrom(parse_index(idx)?));
    }
    Ok(Token::Ident(word.to_string()))
}

fn parse_index(s: &str) -> Result<u8, QueryError> {
    s.parse()
        .map_err(|_| QueryError::Parse(format!("expected numeric index, got {s:?}")))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), QueryError> {
        match self.bump() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(QueryError::Parse(format!(
                "expected {expected:?}, got {other:?}"
            ))),
        }
    }

    fn parse_formula(&mut self) -> Result<Formula, QueryError> {
        self.parse_and()
    }

    fn parse_and(&mut self) -> Result<Formula, QueryError> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Formula::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Formula, QueryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.bump();
                Ok(Formula::Not(Box::new(self.parse_unary()?)))
            }
            Some(&Token::Ito(idx)) => {
                self.bump();
                Ok(Formula::Diamond(idx, Box::new(self.parse_unary()?)))
            }
            Some(&Token::Ifrom(idx)) => {
                self.bump();
                Ok(Formula::BDiamond(idx, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Formula, QueryError> {
        match self.bump() {
            Some(Token::True) => Ok(Formula::TruePolicy),
            Some(Token::LabelOp(idx)) => {
                self.expect(&Token::LParen)?;
                let name = match self.bump() {
                    Some(Token::Ident(name)) => name,
                    Some(Token::True) => "true".to_string(),
                    other => {
                        return Err(QueryError::Parse(format!(
                            "expected identifier inside label_{idx}(...), got {other:?}"
                        )))
                    }
                };
                self.expect(&Token::RParen)?;
                Ok(Formula::UpArrow(idx, resolve_label_ref(&name)))
            }
            Some(Token::LParen) => {
                let inner = self.parse_formula()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(QueryError::Parse(format!(
                "expected 'true', 'label_i(...)', or '(...)', got {other:?}"
            ))),
        }
    }
}

fn resolve_label_ref(name: &str) -> LabelRef {
    match name {
        "UNTRUSTED" => LabelRef::Security(SecurityLvl::UNTRUSTED),
        "TRUSTED" => LabelRef::Security(SecurityLvl::TRUSTED),
        "CRITICAL" => LabelRef::Security(SecurityLvl::CRITICAL),
        other => LabelRef::Literal(other.to_string()),
    }
}

/// Parses a query string into a [`Formula`].
///
/// # Errors
///
/// Returns [`QueryError::Parse`] on any lexical or syntactic error, or if
/// trailing tokens remain after a complete formula.
pub fn parse(input: &str) -> Result<Formula, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let formula = parser.parse_formula()?;
    if parser.pos != parser.tokens.len() {
        return Err(QueryError::Parse("trailing tokens after formula".to_string()));
    }
    Ok(formula)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_parses_diamond_and_backdiamond_and_uparrow() {
        assert_eq!(
            parse("ito_2 (true)").unwrap(),
            Formula::Diamond(2, Box::new(Formula::TruePolicy))
        );
        assert_eq!(
            parse("ifrom_2 true").unwrap(),
            Formula::BDiamond(2, Box::new(Formula::TruePolicy))
        );
        assert_eq!(
            parse("label_1 (testLabel)").unwrap(),
            Formula::UpArrow(1, LabelRef::Literal("testLabel".to_string()))
        );
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let formula = parse("not label_1(UNTRUSTED) and label_2(CRITICAL)").unwrap();
        assert_eq!(
            formula,
            Formula::And(
                Box::new(Formula::Not(Box::new(Formula::UpArrow(
                    1,
                    LabelRef::Security(SecurityLvl::UNTRUSTED)
                )))),
                Box::new(Formula::UpArrow(2, LabelRef::Security(SecurityLvl::CRITICAL)))
            )
        );
    }

    #[test]
    fn modal_operator_binds_tighter_than_and() {
        let formula = parse("ito_1 label_1(CRITICAL) and true").unwrap();
        assert_eq!(
            formula,
            Formula::And(
                Box::new(Formula::Diamond(
                    1,
                    Box::new(Formula::UpArrow(1, LabelRef::Security(SecurityLvl::CRITICAL)))
                )),
                Box::new(Formula::TruePolicy)
            )
        );
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("true true").is_err());
    }
}
