//! LRU cache for compiled wildcard matchers
//!
//! Statements are re-lifted on every decision and re-enhanced on every
//! contributor round, so the same resolved pattern is seen many times. The
//! cache hands out shared matchers so each pattern is compiled once.

use super::pattern::WildcardMatcher;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of cached matchers
pub const DEFAULT_CAPACITY: usize = 1024;

/// Cache key for a compiled matcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    pattern: String,
    separator: char,
}

/// LRU cache of compiled matchers
pub struct MatcherCache {
    cache: Mutex<LruCache<CacheKey, Arc<WildcardMatcher>>>,
}

impl MatcherCache {
    /// Create a new matcher cache with given capacity (a zero capacity holds one entry)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        MatcherCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get the matcher for a pattern, creating it on a miss
    pub fn matcher(&self, pattern: &str, separator: char) -> Arc<WildcardMatcher> {
        let key = CacheKey {
            pattern: pattern.to_string(),
            separator,
        };
        let mut cache = self.cache.lock();
        if let Some(matcher) = cache.get(&key) {
            return Arc::clone(matcher);
        }
        let matcher = Arc::new(WildcardMatcher::with_separator(pattern, separator));
        cache.put(key, Arc::clone(&matcher));
        matcher
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }

    /// Get cache statistics
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for MatcherCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for MatcherCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("MatcherCache")
            .field("len", &cache.len())
            .field("capacity", &cache.cap())
            .finish()
    }
}
