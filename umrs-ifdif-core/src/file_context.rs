// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! File-context builder: turns ordered `regex [file_type] context` rule
//! files into a `type -> FileContext` map whose NFA languages are pairwise
//! disjoint, reproducing SELinux's "last rule wins" matching semantics as a
//! set-theoretic decomposition (the winning rule for a path is the last one
//! in file order whose regex matches it; the NFA kernel lets us compute,
//! for each rule, exactly the set of paths for which it *is* the winner).

use std::collections::BTreeMap;
use std::str::FromStr;

use log::warn;
use umrs_selinux::SecurityContext;

use crate::error::FileContextError;
use crate::nfa::Nfa;

#[derive(Debug, Clone)]
struct ParsedRule {
    regex: String,
    file_type: Option<String>,
    context: SecurityContext,
}

/// All paths that ultimately resolve to one SELinux type, under "last rule
/// wins" semantics, plus the single NFA whose language is exactly that path
/// set.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub type_label: String,
    pub regexes: Vec<String>,
    pub file_type: Option<String>,
    pub context: SecurityContext,
    pub nfa: Nfa,
}

/// Collapses runs of ASCII whitespace to single spaces and trims the ends,
/// matching the "whitespace within a line is first collapsed" requirement.
fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_line(line: &str) -> Result<Option<ParsedRule>, FileContextError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let collapsed = collapse_whitespace(trimmed);
    let fields: Vec<&str> = collapsed.split(' ').collect();

    let (regex, file_type, context_s) = match fields.as_slice() {
        [regex, context] => ((*regex).to_string(), None, (*context).to_string()),
        [regex, file_type, context] => (
            (*regex).to_string(),
            Some((*file_type).to_string()),
            (*context).to_string(),
        ),
        _ => {
            warn!("skipping malformed file-context line: {trimmed:?}");
            return Ok(None);
        }
    };

    if context_s.matches(':').count() < 3 {
        return Err(FileContextError::InvalidSelinuxLabel(context_s));
    }
    let context = SecurityContext::from_str(&context_s)
        .map_err(|e| FileContextError::InvalidSelinuxLabel(format!("{context_s}: {e}")))?;

    Ok(Some(ParsedRule {
        regex,
        file_type,
        context,
    }))
}

/// Builds the `type -> FileContext` map from an ordered list of file-context
/// file contents, per `spec.md` §4.2's four-step algorithm.
///
/// # Errors
///
/// Returns [`FileContextError::InvalidSelinuxLabel`] if any context string
/// has fewer than three colons (i.e. is missing even the `user:role:type`
/// core); such a line aborts the whole load rather than being skipped.
/// Malformed lines (wrong field count) are logged and skipped instead.
pub fn build_file_contexts(
    files: &[&str],
) -> Result<BTreeMap<String, FileContext>, FileContextError> {
    let mut rules: Vec<ParsedRule> = Vec::new();
    for file in files {
        for line in file.lines() {
            if let Some(rule) = parse_line(line)? {
                rules.push(rule);
            }
        }
    }

    // Reverse so later rules (highest priority) are processed first.
    rules.reverse();

    let mut accumulated = Nfa::empty_language();
    let mut effective: Vec<(ParsedRule, Nfa)> = Vec::with_capacity(rules.len());
    for rule in rules {
        let nfa_i = Nfa::from_regex(&rule.regex)?;
        let complement_u = Nfa::complement(&accumulated);
        let eff_i = Nfa::intersection(&nfa_i, &complement_u);
        accumulated = Nfa::union(&accumulated, &nfa_i);
        effective.push((rule, eff_i));
    }

    let mut by_type: BTreeMap<String, FileContext> = BTreeMap::new();
    for (rule, eff) in effective {
        let type_label = rule.context.security_type().as_str().to_string();
        match by_type.get_mut(&type_label) {
            Some(existing) => {
                existing.regexes.push(rule.regex);
                existing.nfa = Nfa::union(&existing.nfa, &eff);
            }
            None => {
                by_type.insert(
                    type_label.clone(),
                    FileContext {
                        type_label,
                        regexes: vec![rule.regex],
                        file_type: rule.file_type,
                        context: rule.context,
                        nfa: eff,
                    },
                );
            }
        }
    }

    Ok(by_type)
}

// ---------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------

fn json_string_array(items: &[String]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        for ch in item.chars() {
            match ch {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('"');
    }
    out.push(']');
    out
}

fn parse_json_string_array(text: &str) -> Result<Vec<String>, FileContextError> {
    let bad = |msg: &str| FileContextError::MalformedLine(msg.to_string());
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| bad("expected JSON array"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut chars = inner.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == ',' {
            chars.next();
            continue;
        }
        if c != '"' {
            return Err(bad("expected string literal"));
        }
        chars.next();
        let mut s = String::new();
        loop {
            match chars.next() {
                Some('"') => break,
                Some('\\') => match chars.next() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    _ => return Err(bad("invalid escape")),
                },
                Some(c) => s.push(c),
                None => return Err(bad("unterminated string")),
            }
        }
        out.push(s);
    }
    Ok(out)
}

impl FileContext {
    /// Serializes this entry as one `--BEGIN--`/`--END--` record, the
    /// `db/file_contexts.db` cache format of `spec.md` §6.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str("--BEGIN--\n");
        out.push_str(&json_string_array(&self.regexes));
        out.push('\t');
        out.push_str(self.file_type.as_deref().unwrap_or("-"));
        out.push('\t');
        out.push_str(&self.context.to_string());
        out.push('\n');
        out.push_str(&self.nfa.serialize());
        out.push_str("--END--\n");
        out
    }

    /// Parses one `--BEGIN--`/`--END--` record produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`FileContextError::MalformedLine`] if the record does not
    /// follow the expected shape, or a wrapped [`crate::nfa::NfaError`] if
    /// the embedded NFA text is malformed.
    pub fn deserialize(text: &str) -> Result<Self, FileContextError> {
        let bad = |msg: &str| FileContextError::MalformedLine(msg.to_string());
        let after_begin = text
            .trim()
            .strip_prefix("--BEGIN--\n")
            .ok_or_else(|| bad("missing --BEGIN-- marker"))?;
        let end_at = after_begin
            .rfind("--END--")
            .ok_or_else(|| bad("missing --END-- marker"))?;
        let body = after_begin[..end_at].trim_end_matches('\n');

        let (header, nfa_text) = body.split_once('\n').ok_or_else(|| bad("missing header line"))?;
        let fields: Vec<&str> = header.splitn(3, '\t').collect();
        let [regexes_json, file_type, context_s] = fields[..] else {
            return Err(bad("expected 3 tab-separated header fields"));
        };

        let regexes = parse_json_string_array(regexes_json)?;
        let file_type = (file_type != "-").then(|| file_type.to_string());
        let context = SecurityContext::from_str(context_s)
            .map_err(|e| FileContextError::InvalidSelinuxLabel(format!("{context_s}: {e}")))?;
        let nfa = Nfa::deserialize(nfa_text.trim_end())?;

        Ok(Self {
            type_label: context.security_type().as_str().to_string(),
            regexes,
            file_type,
            context,
            nfa,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAT_FC: &str = "\
/system(/.*)?                 u:object_r:system_file:s0
/system/bin/app_process.*     u:object_r:zygote_exec:s0
/data/local/tmp(/.*)?         u:object_r:untrusted_app:s0
";

    #[test]
    fn fc_languages_are_pairwise_disjoint() {
        let fc = build_file_contexts(&[PLAT_FC]).unwrap();
        let labels: Vec<&String> = fc.keys().collect();
        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                let a = &fc[labels[i]].nfa;
                let b = &fc[labels[j]].nfa;
                assert!(Nfa::is_empty(&Nfa::intersection(a, b)));
            }
        }
    }

    #[test]
    fn last_rule_wins_on_overlapping_patterns() {
        let text = "\
.*                          u:object_r:default_file:s0\n\
/data/local/tmp(/.*)?       u:object_r:untrusted_app:s0\n";
        let fc = build_file_contexts(&[text]).unwrap();
        let untrusted = &fc["untrusted_app"].nfa;
        assert!(!Nfa::is_empty(&Nfa::intersection(
            untrusted,
            &Nfa::from_regex("/data/local/tmp/foo").unwrap()
        )));
        let default_fc = &fc["default_file"].nfa;
        assert!(Nfa::is_empty(&Nfa::intersection(
            default_fc,
            &Nfa::from_regex("/data/local/tmp/foo").unwrap()
        )));
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let text = "this line has only one field\n/data(/.*)? u:object_r:data_file:s0\n";
        let fc = build_file_contexts(&[text]).unwrap();
        assert!(fc.contains_key("data_file"));
    }

    #[test]
    fn invalid_context_aborts_the_load() {
        let text = "/data(/.*)? only_one_colon:oops\n";
        assert!(build_file_contexts(&[text]).is_err());
    }

    #[test]
    fn round_trip_serialization_preserves_nfa_language() {
        let fc = build_file_contexts(&[PLAT_FC]).unwrap();
        let entry = &fc["untrusted_app"];
        let text = entry.serialize();
        let restored = FileContext::deserialize(&text).unwrap();
        assert_eq!(restored.regexes, entry.regexes);
        assert!(Nfa::is_empty(&Nfa::intersection(
            &entry.nfa,
            &Nfa::complement(&restored.nfa)
        )));
    }
}
