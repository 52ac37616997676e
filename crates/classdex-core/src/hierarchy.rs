//! Memoized "concrete transitive subclass" queries over a header index

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::header::ClassHeader;
use crate::names::OBJECT_ROOT;

/// Ancestor hops a walk may take past the direct superclass before the chain
/// is treated as malformed
pub const MAX_HOPS: usize = 256;

/// Headers keyed by internal name, first write wins.
///
/// Own-module classes are inserted before dependencies, and dependencies in
/// resolution order, so an earlier source always shadows a later one.
#[derive(Debug, Default, Clone)]
pub struct HeaderIndex {
    headers: HashMap<String, ClassHeader>,
}

impl HeaderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `header` under `name` unless the name is already present.
    /// Returns whether the header was stored.
    pub fn insert(&mut self, name: impl Into<String>, header: ClassHeader) -> bool {
        match self.headers.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(header);
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ClassHeader> {
        self.headers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassHeader)> {
        self.headers.iter().map(|(name, header)| (name.as_str(), header))
    }
}

/// Memoized answers for exactly one base type.
///
/// The cache carries the base it was created for, so results for one base can
/// never leak into queries about another.
#[derive(Debug, Clone)]
pub struct SubclassCache {
    base: String,
    results: HashMap<String, bool>,
}

impl SubclassCache {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            results: HashMap::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.results.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// First write wins; later stamps for the same name are ignored
    pub fn stamp(&mut self, name: &str, value: bool) {
        if !self.results.contains_key(name) {
            self.results.insert(name.to_string(), value);
        }
    }
}

/// States of a single ancestor walk; everything but `Walking` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState<'a> {
    Walking(&'a str),
    Matched,
    AtRoot,
    Unknown,
    CacheHit(bool),
    HopLimitExceeded,
}

impl WalkState<'_> {
    fn is_match(self) -> bool {
        matches!(self, WalkState::Matched | WalkState::CacheHit(true))
    }
}

/// Is `name` a concrete class whose ancestor chain reaches `cache.base()`?
///
/// Only `name` itself has to be concrete for the base to match; the base may be
/// abstract. Every class walked through is stamped with the outcome in `cache`.
pub fn is_concrete_subclass_of(name: &str, index: &HeaderIndex, cache: &mut SubclassCache) -> bool {
    if let Some(cached) = cache.get(name) {
        return cached;
    }

    let header = match index.get(name) {
        Some(header) if header.is_concrete() => header,
        _ => {
            cache.stamp(name, false);
            return false;
        }
    };

    let base = cache.base().to_string();
    let mut visited = vec![name];
    let mut state = match header.super_name.as_deref() {
        Some(super_name) => WalkState::Walking(super_name),
        None => WalkState::AtRoot,
    };
    let mut hops = 0;

    let outcome = loop {
        state = match state {
            WalkState::Walking(_) if hops > MAX_HOPS => WalkState::HopLimitExceeded,
            WalkState::Walking(cur) => {
                hops += 1;
                step(cur, &base, index, cache, &mut visited)
            }
            terminal => break terminal.is_match(),
        };
    };

    trace!(class = name, base = %base, hops, outcome, "resolved ancestor chain");
    for walked in visited {
        cache.stamp(walked, outcome);
    }
    outcome
}

fn step<'a>(
    cur: &'a str,
    base: &str,
    index: &'a HeaderIndex,
    cache: &SubclassCache,
    visited: &mut Vec<&'a str>,
) -> WalkState<'a> {
    if cur == base {
        return WalkState::Matched;
    }
    if cur == OBJECT_ROOT {
        return WalkState::AtRoot;
    }
    if let Some(cached) = cache.get(cur) {
        return WalkState::CacheHit(cached);
    }
    match index.get(cur) {
        Some(header) if header.is_concrete() => {
            visited.push(cur);
            match header.super_name.as_deref() {
                Some(super_name) => WalkState::Walking(super_name),
                None => WalkState::AtRoot,
            }
        }
        _ => WalkState::Unknown,
    }
}

/// All implementations of `base`: the precomputed ones plus every concrete
/// subclass found in `index`, sorted.
pub fn collect_implementations(
    base: &str,
    index: &HeaderIndex,
    precomputed: Option<&BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut implementations = precomputed.cloned().unwrap_or_default();
    let mut cache = SubclassCache::new(base);

    for (name, header) in index.iter() {
        if header.is_concrete() && is_concrete_subclass_of(name, index, &mut cache) {
            implementations.insert(name.to_string());
        }
    }

    implementations
}
