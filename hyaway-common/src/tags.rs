//! Tag parsing and ordering
//!
//! Display tags take the form `namespace:value` or a bare `value`. Only the
//! first separator splits, so `character:re:zero` has namespace `character`
//! and value `re:zero`.
//!
//! Listing order:
//! - namespaced tags before un-namespaced tags
//! - namespaced tags by namespace, then by value
//! - un-namespaced tags by value
//!
//! Text comparison folds case first and falls back to exact code point order,
//! so `Apple` and `apple` sit together but never compare equal.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Separator between namespace and value
pub const NAMESPACE_SEPARATOR: char = ':';

/// A display tag split into namespace and value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Empty when the raw string had no separator
    pub namespace: String,
    pub tag: String,
}

impl Tag {
    pub fn new(namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tag: tag.into(),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Re-join into display form
    ///
    /// Not an exact inverse of [`parse`]: a raw tag with an empty namespace
    /// before the separator (`:)`) parses as un-namespaced, so the leading
    /// separator is not restored.
    pub fn display(&self) -> String {
        if self.is_namespaced() {
            format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.tag)
        } else {
            self.tag.clone()
        }
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split a raw display tag on its first separator
pub fn parse(raw: &str) -> Tag {
    match raw.split_once(NAMESPACE_SEPARATOR) {
        Some((namespace, tag)) => Tag::new(namespace, tag),
        None => Tag::new("", raw),
    }
}

/// Listing order for parsed tags
pub fn compare(a: &Tag, b: &Tag) -> Ordering {
    match (a.is_namespaced(), b.is_namespaced()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => compare_text(&a.namespace, &b.namespace)
            .then_with(|| compare_text(&a.tag, &b.tag)),
        (false, false) => compare_text(&a.tag, &b.tag),
    }
}

/// Parse both strings, then [`compare`]
pub fn compare_raw(a: &str, b: &str) -> Ordering {
    compare(&parse(a), &parse(b))
}

/// Stable in-place sort of raw display tags
pub fn sort_tags<S: AsRef<str>>(tags: &mut [S]) {
    tags.sort_by(|a, b| compare_raw(a.as_ref(), b.as_ref()));
}

/// Sort tags and group consecutive runs by namespace
///
/// Members of a namespaced group are listed by value. Un-namespaced tags come
/// last under the empty namespace and keep their raw text, so `:)` is listed
/// as `:)` rather than `)`.
pub fn group_by_namespace<I, S>(raw: I) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sorted: Vec<String> = raw.into_iter().map(|s| s.as_ref().to_string()).collect();
    sort_tags(&mut sorted);

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for raw in sorted {
        let Tag { namespace, tag } = parse(&raw);
        let label = if namespace.is_empty() { raw } else { tag };
        match groups.last_mut() {
            Some((current, members)) if *current == namespace => members.push(label),
            _ => groups.push((namespace, vec![label])),
        }
    }
    groups
}

fn compare_text(a: &str, b: &str) -> Ordering {
    let folded_a = a.chars().flat_map(char::to_lowercase);
    let folded_b = b.chars().flat_map(char::to_lowercase);
    folded_a.cmp(folded_b).then_with(|| a.cmp(b))
}
