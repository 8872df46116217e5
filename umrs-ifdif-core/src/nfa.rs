// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Jamie Adams (a.k.a, Imodium Operator)
//! # Regex-NFA Kernel
//!
//! Finite automata over the printable-ASCII alphabet (byte codes 32–126,
//! inclusive — the range the SELinux file-context builder deliberately
//! restricts itself to, excluding control characters). Operations:
//! [`Nfa::from_regex`], [`Nfa::union`], [`Nfa::intersection`],
//! [`Nfa::complement`], [`Nfa::minimize`], [`Nfa::is_empty`],
//! [`Nfa::shortest_words`], [`Nfa::serialize`]/[`Nfa::deserialize`].
//!
//! The regex dialect is the POSIX-like extended syntax used in
//! `file_contexts` files (`.`, `*`, `+`, `?`, `[...]`, `(...)`, `|`, and
//! backslash escapes). There are no anchors — patterns always match an
//! entire path, never a substring — so the NFA built from a pattern has no
//! special start/end markers; whole-string acceptance is what every
//! operation here assumes.
//!
//! Regex parsing is delegated to `regex-syntax` (the parser half of the
//! `regex` crate); this module owns everything downstream of the parsed
//! `Hir`: Thompson construction, subset construction (determinization),
//! product construction (intersection/complement), and partition-refinement
//! minimization. The kernel does not produce minimal automata by
//! construction — `minimize` is an explicit, separate step, invoked where
//! determinism and state-count actually matter (emptiness checks after a
//! complement, in particular).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use regex_syntax::hir::{Class, Hir, HirKind, Literal, Repetition};
use regex_syntax::ParserBuilder;
use thiserror::Error;

/// First symbol of the bounded alphabet this kernel operates over.
pub const ALPHABET_LO: u8 = 32;
/// Last symbol of the bounded alphabet this kernel operates over.
pub const ALPHABET_HI: u8 = 126;
/// Number of distinct symbols in the bounded alphabet.
pub const ALPHABET_LEN: usize = (ALPHABET_HI - ALPHABET_LO + 1) as usize;

pub type StateId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NfaError {
    #[error("invalid file-context regex: {0}")]
    InvalidPattern(String),
    #[error("malformed NFA serialization: {0}")]
    MalformedSerialization(String),
}

#[derive(Debug, Clone, Default)]
struct NfaState {
    epsilon: Vec<StateId>,
    /// Byte-range transitions, stored as half-open-free inclusive ranges.
    on: Vec<(u8, u8, StateId)>,
}

/// A non-deterministic finite automaton (with epsilon transitions) over the
/// bounded printable-ASCII alphabet.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
    start: StateId,
    finals: BTreeSet<StateId>,
}

impl Nfa {
    fn new_state(&mut self) -> StateId {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    /// The automaton accepting exactly the empty language.
    #[must_use]
    pub fn empty_language() -> Self {
        Self {
            states: vec![NfaState::default()],
            start: 0,
            finals: BTreeSet::new(),
        }
    }

    /// The automaton accepting exactly the empty string.
    #[must_use]
    pub fn empty_string() -> Self {
        Self {
            states: vec![NfaState::default()],
            start: 0,
            finals: BTreeSet::from([0]),
        }
    }

    fn single_byte(lo: u8, hi: u8) -> Self {
        let mut nfa = Self {
            states: vec![NfaState::default(), NfaState::default()],
            start: 0,
            finals: BTreeSet::from([1]),
        };
        nfa.states[0].on.push((lo, hi, 1));
        nfa
    }

    /// Builds an NFA from a single file-context regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`NfaError::InvalidPattern`] if `pattern` is not a valid
    /// POSIX-like extended regular expression.
    pub fn from_regex(pattern: &str) -> Result<Self, NfaError> {
        let hir = ParserBuilder::new()
            .unicode(false)
            .utf8(false)
            .build()
            .parse(pattern)
            .map_err(|e| NfaError::InvalidPattern(e.to_string()))?;
        let mut nfa = Self {
            states: Vec::new(),
            start: 0,
            finals: BTreeSet::new(),
        };
        let (start, finish) = nfa.build_hir(&hir);
        nfa.start = start;
        nfa.finals = BTreeSet::from([finish]);
        Ok(nfa)
    }

    /// Builds the fragment for `hir`, returning its (start, accept) state
    /// pair. All fragments built this way have exactly one accept state;
    /// callers splice fragments together via epsilon transitions.
    fn build_hir(&mut self, hir: &Hir) -> (StateId, StateId) {
        match hir.kind() {
            HirKind::Empty => {
                let s = self.new_state();
                (s, s)
            }
            HirKind::Literal(Literal(bytes)) => self.build_literal(bytes),
            HirKind::Class(Class::Bytes(class)) => {
                let start = self.new_state();
                let accept = self.new_state();
                for range in class.ranges() {
                    let lo = range.start().max(ALPHABET_LO);
                    let hi = range.end().min(ALPHABET_HI);
                    if lo <= hi {
                        self.states[start].on.push((lo, hi, accept));
                    }
                }
                (start, accept)
            }
            HirKind::Class(Class::Unicode(class)) => {
                let start = self.new_state();
                let accept = self.new_state();
                for range in class.ranges() {
                    let lo = u32::from(range.start()).min(u32::from(ALPHABET_HI)) as u8;
                    let hi = u32::from(range.end()).min(u32::from(ALPHABET_HI)) as u8;
                    let lo = lo.max(ALPHABET_LO);
                    if lo <= hi {
                        self.states[start].on.push((lo, hi, accept));
                    }
                }
                (start, accept)
            }
            HirKind::Look(_) => {
                // file_contexts regex has no anchors; treat any as a no-op.
                let s = self.new_state();
                (s, s)
            }
            HirKind::Repetition(rep) => self.build_repetition(rep),
            HirKind::Capture(cap) => self.build_hir(&cap.sub),
            HirKind::Concat(parts) => self.build_concat(parts),
            HirKind::Alternation(parts) => self.build_alternation(parts),
        }
    }

    fn build_literal(&mut self, bytes: &[u8]) -> (StateId, StateId) {
        if bytes.is_empty() {
            let s = self.new_state();
            return (s, s);
        }
        let start = self.new_state();
        let mut prev = start;
        for &b in bytes {
            let next = self.new_state();
            self.states[prev].on.push((b, b, next));
            prev = next;
        }
        (start, prev)
    }

    fn build_concat(&mut self, parts: &[Hir]) -> (StateId, StateId) {
        if parts.is_empty() {
            let s = self.new_state();
            return (s, s);
        }
        let (overall_start, mut prev_accept) = self.build_hir(&parts[0]);
        for part in &parts[1..] {
            let (next_start, next_accept) = self.build_hir(part);
            self.states[prev_accept].epsilon.push(next_start);
            prev_accept = next_accept;
        }
        (overall_start, prev_accept)
    }

    fn build_alternation(&mut self, parts: &[Hir]) -> (StateId, StateId) {
        if parts.is_empty() {
            return (self.new_state(), self.new_state());
        }
        let start = self.new_state();
        let accept = self.new_state();
        for part in parts {
            let (part_start, part_accept) = self.build_hir(part);
            self.states[start].epsilon.push(part_start);
            self.states[part_accept].epsilon.push(accept);
        }
        (start, accept)
    }

    fn build_repetition(&mut self, rep: &Repetition) -> (StateId, StateId) {
        let min = rep.min;
        let max = rep.max;

        match (min, max) {
            (0, None) => self.build_star(&rep.sub),
            (1, None) => {
                let (s1, a1) = self.build_hir(&rep.sub);
                let (s2, a2) = self.build_star(&rep.sub);
                self.states[a1].epsilon.push(s2);
                (s1, a2)
            }
            (0, Some(1)) => {
                let start = self.new_state();
                let accept = self.new_state();
                let (sub_start, sub_accept) = self.build_hir(&rep.sub);
                self.states[start].epsilon.push(sub_start);
                self.states[start].epsilon.push(accept);
                self.states[sub_accept].epsilon.push(accept);
                (start, accept)
            }
            (min, max) => {
                let start = self.new_state();
                let mut prev_accept = start;
                for _ in 0..min {
                    let (s, a) = self.build_hir(&rep.sub);
                    self.states[prev_accept].epsilon.push(s);
                    prev_accept = a;
                }
                match max {
                    None => {
                        let (s, a) = self.build_star(&rep.sub);
                        self.states[prev_accept].epsilon.push(s);
                        prev_accept = a;
                    }
                    Some(max) => {
                        for _ in min..max {
                            let accept = self.new_state();
                            let (sub_start, sub_accept) = self.build_hir(&rep.sub);
                            self.states[prev_accept].epsilon.push(sub_start);
                            self.states[prev_accept].epsilon.push(accept);
                            self.states[sub_accept].epsilon.push(accept);
                            prev_accept = accept;
                        }
                    }
                }
                (start, prev_accept)
            }
        }
    }

    fn build_star(&mut self, sub: &Hir) -> (StateId, StateId) {
        let start = self.new_state();
        let accept = self.new_state();
        let (sub_start, sub_accept) = self.build_hir(sub);
        self.states[start].epsilon.push(sub_start);
        self.states[start].epsilon.push(accept);
        self.states[sub_accept].epsilon.push(sub_start);
        self.states[sub_accept].epsilon.push(accept);
        (start, accept)
    }

    // -----------------------------------------------------------------
    // Set operations
    // -----------------------------------------------------------------

    /// The union of two automata's languages.
    #[must_use]
    pub fn union(a: &Self, b: &Self) -> Self {
        let mut out = Self {
            states: Vec::new(),
            start: 0,
            finals: BTreeSet::new(),
        };
        let offset_a = out.append(a);
        let offset_b = out.append(b);
        let start = out.new_state();
        out.states[start].epsilon.push(a.start + offset_a);
        out.states[start].epsilon.push(b.start + offset_b);
        out.start = start;
        out.finals = a
            .finals
            .iter()
            .map(|f| f + offset_a)
            .chain(b.finals.iter().map(|f| f + offset_b))
            .collect();
        out
    }

    /// Appends a copy of `other`'s states, returning the index offset
    /// applied to every state id from `other`.
    fn append(&mut self, other: &Self) -> usize {
        let offset = self.states.len();
        for state in &other.states {
            let mut copy = NfaState::default();
            copy.epsilon = state.epsilon.iter().map(|s| s + offset).collect();
            copy.on = state
                .on
                .iter()
                .map(|&(lo, hi, t)| (lo, hi, t + offset))
                .collect();
            self.states.push(copy);
        }
        offset
    }

    /// The intersection of two automata's languages.
    #[must_use]
    pub fn intersection(a: &Self, b: &Self) -> Self {
        let dfa_a = a.to_dfa();
        let dfa_b = b.to_dfa();
        Dfa::product(&dfa_a, &dfa_b, |fa, fb| fa && fb).to_nfa()
    }

    /// The complement of `a` with respect to the bounded printable-ASCII
    /// alphabet.
    #[must_use]
    pub fn complement(a: &Self) -> Self {
        let mut dfa = a.to_dfa();
        dfa.finals = (0..dfa.states.len())
            .filter(|s| !dfa.finals.contains(s))
            .collect();
        dfa.to_nfa()
    }

    /// True if `a`'s language is empty; does not require determinizing.
    #[must_use]
    pub fn is_empty(a: &Self) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(a.start);
        queue.push_back(a.start);
        while let Some(s) = queue.pop_front() {
            if a.finals.contains(&s) {
                return false;
            }
            for &next in &a.states[s].epsilon {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
            for &(_, _, next) in &a.states[s].on {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        true
    }

    /// A minimized DFA (wrapped back up as an [`Nfa`]) equivalent to `a`.
    #[must_use]
    pub fn minimize(a: &Self) -> Self {
        a.to_dfa().minimize().to_nfa()
    }

    /// All words of minimal length accepted by `a`, as raw byte strings.
    /// Bounded to a reasonable number of candidates so a highly ambiguous
    /// automaton (many parallel shortest paths) cannot make this unbounded.
    #[must_use]
    pub fn shortest_words(a: &Self) -> Vec<Vec<u8>> {
        const MAX_WORDS: usize = 32;
        let dfa = a.to_dfa();
        if dfa.finals.is_empty() {
            return Vec::new();
        }

        let mut visited = vec![false; dfa.states.len()];
        let mut word_of: Vec<Option<Vec<u8>>> = vec![None; dfa.states.len()];
        visited[dfa.start] = true;
        word_of[dfa.start] = Some(Vec::new());
        let mut queue = VecDeque::new();
        queue.push_back(dfa.start);

        let mut found_depth: Option<usize> = None;
        let mut words = Vec::new();

        while let Some(s) = queue.pop_front() {
            let depth = word_of[s].as_ref().map_or(0, Vec::len);
            if let Some(d) = found_depth {
                if depth > d {
                    break;
                }
            }
            if dfa.finals.contains(&s) {
                found_depth = Some(depth);
                words.push(word_of[s].clone().unwrap_or_default());
                if words.len() >= MAX_WORDS {
                    break;
                }
                continue;
            }
            for byte in ALPHABET_LO..=ALPHABET_HI {
                let next = dfa.trans[s][(byte - ALPHABET_LO) as usize];
                if !visited[next] {
                    visited[next] = true;
                    let mut w = word_of[s].clone().unwrap_or_default();
                    w.push(byte);
                    word_of[next] = Some(w);
                    queue.push_back(next);
                }
            }
        }
        words.sort();
        words
    }

    fn to_dfa(&self) -> Dfa {
        let start_closure = self.epsilon_closure(&BTreeSet::from([self.start]));
        let mut subset_ids: BTreeMap<BTreeSet<StateId>, StateId> = BTreeMap::new();
        let mut subsets: Vec<BTreeSet<StateId>> = Vec::new();
        subset_ids.insert(start_closure.clone(), 0);
        subsets.push(start_closure);

        let mut trans: Vec<[StateId; ALPHABET_LEN]> = Vec::new();
        let mut queue = VecDeque::from([0usize]);
        while let Some(id) = queue.pop_front() {
            if trans.len() <= id {
                trans.resize(id + 1, [0; ALPHABET_LEN]);
            }
            let subset = subsets[id].clone();
            for (idx, byte) in (ALPHABET_LO..=ALPHABET_HI).enumerate() {
                let stepped = self.step(&subset, byte);
                let closure = self.epsilon_closure(&stepped);
                let next_id = *subset_ids.entry(closure.clone()).or_insert_with(|| {
                    subsets.push(closure);
                    let new_id = subsets.len() - 1;
                    queue.push_back(new_id);
                    new_id
                });
                trans[id][idx] = next_id;
            }
        }
        if trans.len() < subsets.len() {
            trans.resize(subsets.len(), [0; ALPHABET_LEN]);
        }

        let finals = subsets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.iter().any(|st| self.finals.contains(st)))
            .map(|(id, _)| id)
            .collect();

        Dfa {
            trans,
            start: 0,
            finals,
        }
    }

    fn epsilon_closure(&self, from: &BTreeSet<StateId>) -> BTreeSet<StateId> {
        let mut closure = from.clone();
        let mut queue: VecDeque<StateId> = from.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            for &next in &self.states[s].epsilon {
                if closure.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        closure
    }

    fn step(&self, from: &BTreeSet<StateId>, byte: u8) -> BTreeSet<StateId> {
        let mut out = BTreeSet::new();
        for &s in from {
            for &(lo, hi, target) in &self.states[s].on {
                if lo <= byte && byte <= hi {
                    out.insert(target);
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Serializes the automaton to a compact, line-oriented text format.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("start {}\n", self.start));
        out.push_str("final");
        for f in &self.finals {
            out.push_str(&format!(" {f}"));
        }
        out.push('\n');
        for (id, state) in self.states.iter().enumerate() {
            out.push_str(&format!("state {id}\n"));
            for &eps in &state.epsilon {
                out.push_str(&format!("eps {eps}\n"));
            }
            for &(lo, hi, target) in &state.on {
                out.push_str(&format!("range {lo} {hi} {target}\n"));
            }
        }
        out
    }

    /// Parses the text format produced by [`Nfa::serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`NfaError::MalformedSerialization`] if `text` does not
    /// follow the expected shape.
    pub fn deserialize(text: &str) -> Result<Self, NfaError> {
        let bad = |msg: &str| NfaError::MalformedSerialization(msg.to_string());
        let mut lines = text.lines();

        let start_line = lines.next().ok_or_else(|| bad("missing start line"))?;
        let start: StateId = start_line
            .strip_prefix("start ")
            .ok_or_else(|| bad("expected 'start <id>'"))?
            .trim()
            .parse()
            .map_err(|_| bad("invalid start id"))?;

        let final_line = lines.next().ok_or_else(|| bad("missing final line"))?;
        let final_rest = final_line
            .strip_prefix("final")
            .ok_or_else(|| bad("expected 'final ...'"))?;
        let finals: BTreeSet<StateId> = final_rest
            .split_whitespace()
            .map(|tok| tok.parse().map_err(|_| bad("invalid final id")))
            .collect::<Result<_, _>>()?;

        let mut states: Vec<NfaState> = Vec::new();
        let mut current: Option<StateId> = None;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("state ") {
                let id: StateId = rest.trim().parse().map_err(|_| bad("invalid state id"))?;
                if states.len() <= id {
                    states.resize_with(id + 1, NfaState::default);
                }
                current = Some(id);
            } else if let Some(rest) = line.strip_prefix("eps ") {
                let id = current.ok_or_else(|| bad("eps before state"))?;
                let target: StateId = rest.trim().parse().map_err(|_| bad("invalid eps target"))?;
                states[id].epsilon.push(target);
            } else if let Some(rest) = line.strip_prefix("range ") {
                let id = current.ok_or_else(|| bad("range before state"))?;
                let mut parts = rest.split_whitespace();
                let lo: u8 = parts
                    .next()
                    .ok_or_else(|| bad("missing range lo"))?
                    .parse()
                    .map_err(|_| bad("invalid range lo"))?;
                let hi: u8 = parts
                    .next()
                    .ok_or_else(|| bad("missing range hi"))?
                    .parse()
                    .map_err(|_| bad("invalid range hi"))?;
                let target: StateId = parts
                    .next()
                    .ok_or_else(|| bad("missing range target"))?
                    .parse()
                    .map_err(|_| bad("invalid range target"))?;
                states[id].on.push((lo, hi, target));
            } else {
                return Err(bad("unrecognized line"));
            }
        }

        Ok(Self {
            states,
            start,
            finals,
        })
    }
}

/// A complete (total) DFA over the bounded alphabet: every state has
/// exactly one transition per symbol, including into an implicit dead
/// state where the source automaton had none. Completeness is what makes
/// `complement` correct by simply flipping the accept set.
struct Dfa {
    trans: Vec<[StateId; ALPHABET_LEN]>,
    start: StateId,
    finals: BTreeSet<StateId>,
}

impl Dfa {
    fn product(a: &Self, b: &Self, accept: impl Fn(bool, bool) -> bool) -> Self {
        let mut ids: BTreeMap<(StateId, StateId), StateId> = BTreeMap::new();
        let mut pairs = Vec::new();
        ids.insert((a.start, b.start), 0);
        pairs.push((a.start, b.start));

        let mut trans: Vec<[StateId; ALPHABET_LEN]> = Vec::new();
        let mut queue = VecDeque::from([0usize]);
        while let Some(id) = queue.pop_front() {
            if trans.len() <= id {
                trans.resize(id + 1, [0; ALPHABET_LEN]);
            }
            let (sa, sb) = pairs[id];
            for idx in 0..ALPHABET_LEN {
                let na = a.trans[sa][idx];
                let nb = b.trans[sb][idx];
                let next_id = *ids.entry((na, nb)).or_insert_with(|| {
                    pairs.push((na, nb));
                    let new_id = pairs.len() - 1;
                    queue.push_back(new_id);
                    new_id
                });
                trans[id][idx] = next_id;
            }
        }
        if trans.len() < pairs.len() {
            trans.resize(pairs.len(), [0; ALPHABET_LEN]);
        }

        let finals = pairs
            .iter()
            .enumerate()
            .filter(|(_, &(sa, sb))| accept(a.finals.contains(&sa), b.finals.contains(&sb)))
            .map(|(id, _)| id)
            .collect();

        Self {
            trans,
            start: 0,
            finals,
        }
    }

    fn reachable_states(&self) -> BTreeSet<StateId> {
        let mut seen = BTreeSet::from([self.start]);
        let mut queue = VecDeque::from([self.start]);
        while let Some(s) = queue.pop_front() {
            for idx in 0..ALPHABET_LEN {
                let next = self.trans[s][idx];
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Partition-refinement (Moore) minimization, preceded by trimming to
    /// only the reachable states.
    fn minimize(&self) -> Self {
        let reachable: Vec<StateId> = self.reachable_states().into_iter().collect();
        let renumber: BTreeMap<StateId, StateId> = reachable
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new))
            .collect();
        let n = reachable.len();
        let trans: Vec<[StateId; ALPHABET_LEN]> = reachable
            .iter()
            .map(|&old| {
                let mut row = [0usize; ALPHABET_LEN];
                for idx in 0..ALPHABET_LEN {
                    row[idx] = renumber[&self.trans[old][idx]];
                }
                row
            })
            .collect();
        let finals: BTreeSet<StateId> = reachable
            .iter()
            .enumerate()
            .filter(|(_, &old)| self.finals.contains(&old))
            .map(|(new, _)| new)
            .collect();

        let mut block_of: Vec<usize> = (0..n)
            .map(|s| usize::from(finals.contains(&s)))
            .collect();
        loop {
            let mut signature_ids: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
            let mut new_block_of = vec![0usize; n];
            for s in 0..n {
                let mut sig = vec![block_of[s]];
                for idx in 0..ALPHABET_LEN {
                    sig.push(block_of[trans[s][idx]]);
                }
                let next_id = signature_ids.len();
                let id = *signature_ids.entry(sig).or_insert(next_id);
                new_block_of[s] = id;
            }
            if new_block_of == block_of {
                break;
            }
            block_of = new_block_of;
        }

        let num_blocks = block_of.iter().copied().max().map_or(0, |m| m + 1);
        let mut rep_of_block = vec![None; num_blocks];
        for s in 0..n {
            rep_of_block[block_of[s]].get_or_insert(s);
        }

        let mut min_trans = vec![[0usize; ALPHABET_LEN]; num_blocks];
        for b in 0..num_blocks {
            let Some(rep) = rep_of_block[b] else { continue };
            for idx in 0..ALPHABET_LEN {
                min_trans[b][idx] = block_of[trans[rep][idx]];
            }
        }
        let min_finals: BTreeSet<StateId> = (0..num_blocks)
            .filter(|&b| rep_of_block[b].is_some_and(|rep| finals.contains(&rep)))
            .collect();

        Self {
            trans: min_trans,
            start: block_of[renumber[&self.start]],
            finals: min_finals,
        }
    }

    fn to_nfa(&self) -> Nfa {
        let mut states = Vec::with_capacity(self.trans.len());
        for row in &self.trans {
            let mut on: Vec<(u8, u8, StateId)> = Vec::new();
            let mut idx = 0usize;
            while idx < ALPHABET_LEN {
                let target = row[idx];
                let lo = ALPHABET_LO + idx as u8;
                let mut hi = lo;
                let mut next = idx + 1;
                while next < ALPHABET_LEN && row[next] == target {
                    hi = ALPHABET_LO + next as u8;
                    next += 1;
                }
                on.push((lo, hi, target));
                idx = next;
            }
            states.push(NfaState {
                epsilon: Vec::new(),
                on,
            });
        }
        Nfa {
            states,
            start: self.start,
            finals: self.finals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(nfa: &Nfa, s: &str) -> bool {
        let dfa = nfa.to_dfa();
        let mut state = dfa.start;
        for b in s.bytes() {
            if !(ALPHABET_LO..=ALPHABET_HI).contains(&b) {
                return false;
            }
            state = dfa.trans[state][(b - ALPHABET_LO) as usize];
        }
        dfa.finals.contains(&state)
    }

    #[test]
    fn literal_matches_exactly() {
        let nfa = Nfa::from_regex("/system/bin/sh").unwrap();
        assert!(accepts(&nfa, "/system/bin/sh"));
        assert!(!accepts(&nfa, "/system/bin/shx"));
        assert!(!accepts(&nfa, "/system/bin/s"));
    }

    #[test]
    fn star_and_alternation() {
        let nfa = Nfa::from_regex("/(data|cache)/.*").unwrap();
        assert!(accepts(&nfa, "/data/"));
        assert!(accepts(&nfa, "/data/local/tmp/foo"));
        assert!(accepts(&nfa, "/cache/"));
        assert!(!accepts(&nfa, "/vendor/"));
    }

    #[test]
    fn union_is_the_set_union() {
        let a = Nfa::from_regex("/a").unwrap();
        let b = Nfa::from_regex("/b").unwrap();
        let u = Nfa::union(&a, &b);
        assert!(accepts(&u, "/a"));
        assert!(accepts(&u, "/b"));
        assert!(!accepts(&u, "/c"));
    }

    #[test]
    fn intersection_is_the_set_intersection() {
        let a = Nfa::from_regex("/data/.*").unwrap();
        let b = Nfa::from_regex(".*/local/.*").unwrap();
        let inter = Nfa::intersection(&a, &b);
        assert!(accepts(&inter, "/data/local/tmp"));
        assert!(!accepts(&inter, "/data/cache"));
        assert!(!accepts(&inter, "/vendor/local/tmp"));
    }

    #[test]
    fn complement_flips_membership() {
        let a = Nfa::from_regex("/data/.*").unwrap();
        let comp = Nfa::complement(&a);
        assert!(!accepts(&comp, "/data/local"));
        assert!(accepts(&comp, "/vendor/bin"));
    }

    #[test]
    fn empty_language_is_empty() {
        assert!(Nfa::is_empty(&Nfa::empty_language()));
        assert!(!Nfa::is_empty(&Nfa::empty_string()));
    }

    #[test]
    fn intersection_with_disjoint_languages_is_empty() {
        let a = Nfa::from_regex("/data/.*").unwrap();
        let b = Nfa::from_regex("/vendor/.*").unwrap();
        assert!(Nfa::is_empty(&Nfa::intersection(&a, &b)));
    }

    #[test]
    fn shortest_words_reports_minimal_length_members() {
        let nfa = Nfa::from_regex("/file1|/file1/extra").unwrap();
        let words = Nfa::shortest_words(&nfa);
        assert_eq!(words, vec![b"/file1".to_vec()]);
    }

    /// Scenario S7: left and right each cover `/file1` plus a deeper path
    /// that differs between them, but only the right side's file contexts
    /// also match the bare `/file1` itself. The minimized FC-difference NFA
    /// (right intersected with the complement of left) must accept exactly
    /// `/file1` as its shortest word.
    #[test]
    fn shortest_words_of_fc_difference_is_file1() {
        let left = Nfa::from_regex("/file1/left_only").unwrap();
        let right = Nfa::union(
            &Nfa::from_regex("/file1").unwrap(),
            &Nfa::from_regex("/file1/right_only").unwrap(),
        );

        let diff = Nfa::minimize(&Nfa::intersection(&right, &Nfa::complement(&left)));

        assert_eq!(Nfa::shortest_words(&diff), vec![b"/file1".to_vec()]);
    }

    #[test]
    fn round_trip_serialization_preserves_language() {
        let nfa = Nfa::from_regex("/(data|cache)/[0-9]+").unwrap();
        let text = nfa.serialize();
        let restored = Nfa::deserialize(&text).unwrap();
        assert!(accepts(&restored, "/data/42"));
        assert!(!accepts(&restored, "/data/abc"));
        assert_eq!(
            Nfa::is_empty(&Nfa::intersection(&nfa, &Nfa::complement(&restored))),
            true
        );
        assert_eq!(
            Nfa::is_empty(&Nfa::intersection(&restored, &Nfa::complement(&nfa))),
            true
        );
    }

    #[test]
    fn minimize_preserves_language_and_shrinks_state_count() {
        let nfa = Nfa::from_regex("a|a|a").unwrap();
        let minimized = Nfa::minimize(&nfa);
        assert!(accepts(&minimized, "a"));
        assert!(!accepts(&minimized, "aa"));
        assert!(minimized.states.len() <= nfa.states.len());
    }
}
