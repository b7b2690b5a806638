//! Wildcard matching for resolved expressions
//!
//! Supports one wildcard:
//! - `*` - Matches one or more characters within a single segment (e.g., `resources/*`)
//!
//! Segments are delimited by a separator character, `/` unless configured
//! otherwise. A wildcard never crosses a separator.

use crate::error::Result;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Default segment separator
pub const DEFAULT_SEPARATOR: char = '/';

const WILDCARD: char = '*';

/// Matcher compiled from a fully resolved pattern
///
/// Values without `*` match by string equality. Patterned values are compiled
/// to an anchored regex on first use, and the compiled form is kept.
pub struct WildcardMatcher {
    pattern: String,
    separator: char,
    patterned: bool,
    compiled: OnceLock<Regex>,
}

impl WildcardMatcher {
    /// Create a matcher using the default `/` separator
    ///
    /// # Examples
    /// ```
    /// use incremental_authz::WildcardMatcher;
    ///
    /// let matcher = WildcardMatcher::new("resources/*");
    /// assert!(matcher.matches("resources/foo").unwrap());
    /// assert!(!matcher.matches("resources/foo/bar").unwrap());
    /// ```
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_separator(pattern, DEFAULT_SEPARATOR)
    }

    pub fn with_separator(pattern: impl Into<String>, separator: char) -> Self {
        let pattern = pattern.into();
        WildcardMatcher {
            patterned: pattern.contains(WILDCARD),
            pattern,
            separator,
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Whether the pattern contains a wildcard
    pub fn is_patterned(&self) -> bool {
        self.patterned
    }

    /// Check if a target matches the whole pattern
    pub fn matches(&self, target: &str) -> Result<bool> {
        if !self.patterned {
            return Ok(self.pattern == target);
        }
        Ok(self.regex()?.is_match(target))
    }

    fn regex(&self) -> Result<&Regex> {
        if let Some(regex) = self.compiled.get() {
            return Ok(regex);
        }
        let regex = Regex::new(&self.to_regex())?;
        Ok(self.compiled.get_or_init(|| regex))
    }

    /// Translate the pattern into an anchored regex, escaping literal text
    fn to_regex(&self) -> String {
        let segment = format!("[^{}]+", regex::escape(&self.separator.to_string()));
        let body = self
            .pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(&segment);
        format!("^{}$", body)
    }
}

impl fmt::Debug for WildcardMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WildcardMatcher")
            .field("pattern", &self.pattern)
            .field("separator", &self.separator)
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}
