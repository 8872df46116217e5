// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! Structured error taxonomy for the comparison engine, one `thiserror` enum
//! per component so that a higher-level error can wrap a lower one with
//! `#[from]` instead of flattening everything into one type.

use thiserror::Error;

use crate::nfa::NfaError;

#[derive(Debug, Error)]
pub enum FileContextError {
    #[error("malformed file-context line: {0}")]
    MalformedLine(String),
    #[error("invalid SELinux label string: {0}")]
    InvalidSelinuxLabel(String),
    #[error(transparent)]
    Nfa(#[from] NfaError),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Nfa(#[from] NfaError),
    #[error("operation cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query parse error: {0}")]
    Parse(String),
    #[error("index {0} out of range, expected 1 or 2")]
    IndexError(u8),
    #[error("label {0:?} is neither a security level nor a known type label")]
    TypeError(String),
}

#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("policy not found at {0}")]
    PolicyNotFound(String),
    #[error(transparent)]
    FileContext(#[from] FileContextError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("malformed build.prop property {key}: {reason}")]
    MalformedProperty { key: String, reason: String },
    #[error("I/O error loading policy: {0}")]
    Io(#[from] std::io::Error),
}
