//! Precomputed implementation indexes
//!
//! A module publishes its results as a small `.properties` fragment
//! (`dotted.Base=impl.One,impl.Two`, one line per base). Downstream modules
//! merge those fragments instead of rescanning the dependency, but only when a
//! dependency's fragments cover every base they ask about.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::names::{to_dotted, to_internal};

pub const FRAGMENT_SUFFIX: &str = ".properties";

/// Does an archive entry at `path` hold a fragment under `path_prefix`?
pub fn is_fragment_path(path: &str, path_prefix: &str) -> bool {
    path.starts_with(path_prefix) && path.ends_with(FRAGMENT_SUFFIX) && !path.ends_with('/')
}

/// Fragments merged from a single archive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FragmentMerge {
    /// Base internal name to implementation internal names
    pub implementations: BTreeMap<String, BTreeSet<String>>,
    /// Requested bases that appeared as a key in at least one fragment
    pub matched: BTreeSet<String>,
}

impl FragmentMerge {
    /// True iff every base in `allowed_bases` was matched by some fragment line.
    pub fn matched_all<'a>(&self, allowed_bases: impl IntoIterator<Item = &'a String>) -> bool {
        allowed_bases
            .into_iter()
            .all(|base| self.matched.contains(base))
    }

    fn merge_text(&mut self, text: &str, allowed_bases: &BTreeSet<String>) {
        for (key, values) in parse_fragment(text) {
            if !allowed_bases.contains(&key) {
                continue;
            }
            self.implementations
                .entry(key.clone())
                .or_default()
                .extend(values);
            self.matched.insert(key);
        }
    }
}

/// Merge every fragment among `entries` (archive path, UTF-8 text).
///
/// Entries outside `path_prefix` or without the fragment suffix are ignored, as
/// are fragment keys not in `allowed_bases`.
pub fn merge_fragments<I, P, T>(entries: I, path_prefix: &str, allowed_bases: &BTreeSet<String>) -> FragmentMerge
where
    I: IntoIterator<Item = (P, T)>,
    P: AsRef<str>,
    T: AsRef<str>,
{
    let mut merge = FragmentMerge::default();
    for (path, text) in entries {
        let path = path.as_ref();
        if !is_fragment_path(path, path_prefix) {
            continue;
        }
        debug!(fragment = path, "merging precomputed fragment");
        merge.merge_text(text.as_ref(), allowed_bases);
    }
    merge
}

/// Parse a fragment into `(base, implementations)` pairs, all in internal form.
///
/// Follows the `.properties` line grammar: blank lines and `#`/`!` comments are
/// skipped, a line ending in an odd number of backslashes continues on the next
/// line, and the key ends at the first unescaped `=`, `:` or whitespace (an
/// `=`/`:` after that whitespace is consumed too). Backslash escapes are decoded
/// in keys and values. Values are split on commas, trimmed, and blanks dropped;
/// a key with no values still yields a pair with an empty set. A key repeated
/// within one fragment keeps only its last line.
pub fn parse_fragment(text: &str) -> Vec<(String, BTreeSet<String>)> {
    let mut pairs: IndexMap<String, BTreeSet<String>> = IndexMap::new();
    for line in logical_lines(text) {
        let (key, value) = split_entry(&line);
        if key.is_empty() {
            continue;
        }

        let values = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(to_internal)
            .collect();
        pairs.insert(to_internal(&key), values);
    }
    pairs.into_iter().collect()
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Join continued physical lines, dropping comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_start_matches(is_blank);
        let mut current = match pending.take() {
            Some(joined) => joined,
            None if line.is_empty() || line.starts_with('#') || line.starts_with('!') => continue,
            None => String::new(),
        };

        let trailing = line.len() - line.trim_end_matches('\\').len();
        if trailing % 2 == 1 {
            current.push_str(&line[..line.len() - 1]);
            pending = Some(current);
        } else {
            current.push_str(line);
            lines.push(current);
        }
    }
    lines.extend(pending);
    lines
}

fn split_entry(line: &str) -> (String, String) {
    let mut chars = line.chars().peekable();
    let mut key = String::new();
    let mut separated = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => push_escaped(&mut key, &mut chars),
            '=' | ':' => {
                separated = true;
                break;
            }
            c if is_blank(c) => break,
            c => key.push(c),
        }
    }

    while chars.next_if(|&c| is_blank(c)).is_some() {}
    if !separated && chars.next_if(|&c| c == '=' || c == ':').is_some() {
        while chars.next_if(|&c| is_blank(c)).is_some() {}
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => push_escaped(&mut value, &mut chars),
            c => value.push(c),
        }
    }
    (key, value)
}

fn push_escaped(out: &mut String, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    match chars.next() {
        Some('t') => out.push('\t'),
        Some('n') => out.push('\n'),
        Some('r') => out.push('\r'),
        Some('f') => out.push('\x0c'),
        Some('u') => {
            let mut code = 0u32;
            for _ in 0..4 {
                match chars.next_if(char::is_ascii_hexdigit).and_then(|c| c.to_digit(16)) {
                    Some(digit) => code = code * 16 + digit,
                    None => return,
                }
            }
            out.extend(char::from_u32(code));
        }
        Some(other) => out.push(other),
        None => {}
    }
}

/// Implementations accumulated from every fully-matched dependency
#[derive(Debug, Default, Clone)]
pub struct PrecomputedIndex {
    implementations: BTreeMap<String, BTreeSet<String>>,
}

impl PrecomputedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union a dependency's merged fragments into the index
    pub fn absorb(&mut self, merge: FragmentMerge) {
        for (base, implementations) in merge.implementations {
            self.implementations
                .entry(base)
                .or_default()
                .extend(implementations);
        }
    }

    pub fn get(&self, base: &str) -> Option<&BTreeSet<String>> {
        self.implementations.get(base)
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

/// Render results as the emitted index: one `dotted.Base=impl.A,impl.B` line per
/// base in the given order, values sorted, newline-terminated.
pub fn format_index(results: &IndexMap<String, BTreeSet<String>>) -> String {
    let mut out = String::new();
    for (base, implementations) in results {
        let values: Vec<String> = implementations.iter().map(|i| to_dotted(i)).collect();
        out.push_str(&to_dotted(base));
        out.push('=');
        out.push_str(&values.join(","));
        out.push('\n');
    }
    out
}
