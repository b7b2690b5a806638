//! Expressions that become wildcard matchers once resolved

use super::cache::MatcherCache;
use super::expression::{Attribute, Expression, StringExpression};
use super::pattern::{WildcardMatcher, DEFAULT_SEPARATOR};
use crate::error::{AuthzError, Result};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// A [`StringExpression`] that can be matched against once fully resolved
///
/// The matcher is built on first use and kept with the expression. Equality
/// and ordering only consider the expression and separator.
#[derive(Clone)]
pub struct MatchableExpression {
    expression: StringExpression,
    separator: char,
    matcher: OnceLock<Arc<WildcardMatcher>>,
}

impl MatchableExpression {
    pub fn new(original: impl Into<String>) -> Self {
        Self::with_separator(original, DEFAULT_SEPARATOR)
    }

    pub fn with_separator(original: impl Into<String>, separator: char) -> Self {
        MatchableExpression {
            expression: StringExpression::new(original),
            separator,
            matcher: OnceLock::new(),
        }
    }

    pub fn expression(&self) -> &StringExpression {
        &self.expression
    }

    pub fn as_str(&self) -> &str {
        self.expression.as_str()
    }

    /// Return an expression with its matcher built
    ///
    /// Fails with [`AuthzError::NotFullyResolved`] while placeholders remain.
    pub fn to_matchable(&self) -> Result<Self> {
        self.matcher()?;
        Ok(self.clone())
    }

    /// The matcher for this expression, built privately on first call
    pub fn matcher(&self) -> Result<&WildcardMatcher> {
        self.ensure_resolved()?;
        let matcher: &WildcardMatcher = self.matcher.get_or_init(|| {
            Arc::new(WildcardMatcher::with_separator(
                self.expression.as_str(),
                self.separator,
            ))
        });
        Ok(matcher)
    }

    /// The matcher for this expression, shared through `cache`
    pub fn matcher_in(&self, cache: &MatcherCache) -> Result<&WildcardMatcher> {
        self.ensure_resolved()?;
        let matcher: &WildcardMatcher = self
            .matcher
            .get_or_init(|| cache.matcher(self.expression.as_str(), self.separator));
        Ok(matcher)
    }

    /// Check if the resolved expression matches `target`
    pub fn matches(&self, target: &str) -> Result<bool> {
        self.matcher()?.matches(target)
    }

    fn ensure_resolved(&self) -> Result<()> {
        if self.expression.is_fully_resolved() {
            Ok(())
        } else {
            Err(AuthzError::NotFullyResolved(
                self.expression.as_str().to_string(),
            ))
        }
    }
}

impl Expression for MatchableExpression {
    fn enhance(&self, attribute: &Attribute) -> Self {
        let expression = self.expression.enhance(attribute);
        if expression == self.expression {
            return self.clone();
        }
        MatchableExpression {
            expression,
            separator: self.separator,
            matcher: OnceLock::new(),
        }
    }

    fn value(&self) -> Cow<'_, str> {
        self.expression.value()
    }

    fn is_fully_resolved(&self) -> bool {
        self.expression.is_fully_resolved()
    }
}

impl PartialEq for MatchableExpression {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression && self.separator == other.separator
    }
}

impl Eq for MatchableExpression {}

impl PartialOrd for MatchableExpression {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatchableExpression {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expression
            .cmp(&other.expression)
            .then(self.separator.cmp(&other.separator))
    }
}

impl Hash for MatchableExpression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expression.hash(state);
        self.separator.hash(state);
    }
}

impl fmt::Debug for MatchableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchableExpression")
            .field("expression", &self.expression.as_str())
            .field("matcher", &self.matcher.get().map(|m| m.pattern()))
            .finish()
    }
}

impl fmt::Display for MatchableExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expression, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_cannot_match() {
        let expr = MatchableExpression::new("resources/${id}");
        assert!(matches!(
            expr.to_matchable(),
            Err(AuthzError::NotFullyResolved(ref v)) if v == "resources/${id}"
        ));
        assert!(matches!(
            expr.matches("resources/1"),
            Err(AuthzError::NotFullyResolved(_))
        ));
    }

    #[test]
    fn test_resolved_matches() {
        let expr = MatchableExpression::new("resources/${id}")
            .enhance(&Attribute::new("id", "*"))
            .to_matchable()
            .unwrap();
        assert!(expr.matches("resources/1").unwrap());
        assert!(!expr.matches("resources/1/2").unwrap());
    }

    #[test]
    fn test_enhance_drops_stale_matcher() {
        let expr = MatchableExpression::new("a/${x}");
        let resolved = expr.enhance(&Attribute::new("x", "b"));
        assert!(resolved.matches("a/b").unwrap());

        let again = resolved.enhance(&Attribute::new("x", "c"));
        assert_eq!(again, resolved);
        assert!(again.matcher.get().is_some());
    }

    #[test]
    fn test_matcher_in_shares_cache() {
        let cache = MatcherCache::new(4);
        let a = MatchableExpression::new("resources/*");
        let b = MatchableExpression::new("resources/*");

        assert!(a.matcher_in(&cache).unwrap().matches("resources/x").unwrap());
        assert!(b.matcher_in(&cache).unwrap().matches("resources/y").unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_custom_separator() {
        let expr = MatchableExpression::with_separator("accounts:*", ':');
        assert!(expr.matches("accounts:a/b").unwrap());
        assert!(!expr.matches("accounts:a:b").unwrap());
    }
}
