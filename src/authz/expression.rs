//! Lazily resolved expressions
//!
//! An expression is a template string carrying zero or more `${key}`
//! placeholders. Resolution ("enhancement") replaces the placeholders one
//! attribute at a time and always produces a new value:
//! - `${key}` - Replaced by the value of an attribute named `key`
//! - `${` without a closing `}` - Kept verbatim, never a placeholder
//! - `${other}` - Kept verbatim until an `other` attribute arrives

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// A single key/value attribute contributed during resolution
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for Attribute {
    fn from((key, value): (K, V)) -> Self {
        Attribute::new(key, value)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Set of attributes
///
/// The same key may appear with several values. Every value is a candidate and
/// fans out into its own resolved expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(BTreeSet<Attribute>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(BTreeSet::new())
    }

    /// Build from `(key, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().map(Attribute::from).collect()
    }

    /// Add an attribute, returning `false` if the exact pair was already present
    pub fn insert(&mut self, attribute: Attribute) -> bool {
        self.0.insert(attribute)
    }

    /// Union of both sets. Neither input is modified.
    pub fn union(&self, other: &Attributes) -> Attributes {
        Attributes(self.0.union(&other.0).cloned().collect())
    }

    /// Candidate values for a key, in order
    pub fn values_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Group attributes by key
    pub fn by_key(&self) -> BTreeMap<&str, Vec<&Attribute>> {
        let mut grouped: BTreeMap<&str, Vec<&Attribute>> = BTreeMap::new();
        for attribute in &self.0 {
            grouped
                .entry(attribute.key.as_str())
                .or_default()
                .push(attribute);
        }
        grouped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Attribute> for Attributes {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}

impl Extend<Attribute> for Attributes {
    fn extend<I: IntoIterator<Item = Attribute>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::collections::btree_set::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A value that can be incrementally resolved with attributes
///
/// Implementations are persistent: `enhance` never mutates, it returns the
/// next value. Enhancing with an attribute whose key is not referenced, or
/// enhancing a fully resolved value, returns an equal value.
pub trait Expression: Clone + Ord {
    /// Resolve placeholders named by a single attribute
    fn enhance(&self, attribute: &Attribute) -> Self;

    /// Canonical current value
    fn value(&self) -> Cow<'_, str>;

    /// Whether no well-formed placeholder remains
    fn is_fully_resolved(&self) -> bool;

    /// Resolve against a whole attribute set
    ///
    /// Attributes are grouped by key and each key is applied on its own, so a
    /// key with N values yields N expressions. A key that does not touch this
    /// expression yields the expression itself once. Combining several keys
    /// happens by enhancing the results again in a later pass.
    fn enhance_all<'a>(&'a self, attributes: &'a Attributes) -> impl Iterator<Item = Self> + 'a {
        attributes
            .by_key()
            .into_values()
            .flat_map(move |group| expand_key(self, &group))
    }
}

fn expand_key<T: Expression>(expression: &T, group: &[&Attribute]) -> Vec<T> {
    let current = expression.value();
    let mut expanded = Vec::with_capacity(group.len());
    for attribute in group {
        let enhanced = expression.enhance(attribute);
        if enhanced.value() == current {
            return vec![expression.clone()];
        }
        expanded.push(enhanced);
    }
    expanded
}

/// Whether the text holds at least one well-formed `${...}` placeholder
pub fn has_placeholder(text: &str) -> bool {
    text.find(OPEN)
        .is_some_and(|start| text[start + OPEN.len()..].contains(CLOSE))
}

/// Replace every `${key}` in `template` with `replacement`
///
/// Other placeholders and an unterminated `${` are copied verbatim.
pub fn substitute(template: &str, key: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(CLOSE) else {
            out.push_str(tail);
            return out;
        };
        if &tail[OPEN.len()..end] == key {
            out.push_str(replacement);
        } else {
            out.push_str(&tail[..=end]);
        }
        rest = &tail[end + 1..];
    }

    out.push_str(rest);
    out
}

/// A template string and its current resolution
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringExpression {
    original: String,
    value: String,
    dynamic: bool,
}

impl StringExpression {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        let dynamic = has_placeholder(&original);
        StringExpression {
            value: original.clone(),
            original,
            dynamic,
        }
    }

    /// The template this expression started from
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The current, possibly partially resolved, value
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl Expression for StringExpression {
    fn enhance(&self, attribute: &Attribute) -> Self {
        if !self.dynamic {
            return self.clone();
        }

        let value = substitute(&self.value, &attribute.key, &attribute.value);
        if value == self.value {
            return self.clone();
        }

        let dynamic = has_placeholder(&value);
        trace!(
            "Enhanced expression: {} -> {}, dynamic: {}",
            self.original,
            value,
            dynamic
        );
        StringExpression {
            original: self.original.clone(),
            value,
            dynamic,
        }
    }

    fn value(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.value)
    }

    fn is_fully_resolved(&self) -> bool {
        !self.dynamic
    }
}

impl fmt::Display for StringExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
