//! Process-wide cache of compiled link-check rules.
//!
//! Rules come from link type configuration, so there are few of them and
//! they never change while the server runs. Each distinct rule text is
//! compiled once and shared as an `Arc<RuleNode>`. Entries are never evicted;
//! running out of room means the configuration holds more rules than
//! expected and is reported as an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdr_linkrule::{RuleNode, RuleParser};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::RuleCacheConfig;
use crate::error::{LinkCheckError, LinkResult};

/// Thread-safe, append-only map from rule text to compiled rule.
///
/// A single lock covers lookup, compilation and insertion, so concurrent
/// callers with the same new rule text compile it exactly once. Waiting for
/// the lock is bounded by the configured timeout.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use cdr_linkcheck::{RuleCache, RuleCacheConfig};
///
/// let cache = RuleCache::new(RuleCacheConfig::default());
/// let first = cache.get_or_compile(r#"/Term/Status == "Active""#).unwrap();
/// let again = cache.get_or_compile(r#"/Term/Status == "Active""#).unwrap();
/// assert!(Arc::ptr_eq(&first, &again));
/// ```
pub struct RuleCache {
    inner: Mutex<HashMap<String, Arc<RuleNode>>>,
    capacity: usize,
    lock_timeout: Duration,
    parser: RuleParser,
    hits: AtomicU64,
    compiles: AtomicU64,
}

impl RuleCache {
    /// Creates an empty cache.
    pub fn new(config: RuleCacheConfig) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(config.capacity)),
            capacity: config.capacity,
            lock_timeout: config.lock_timeout,
            parser: RuleParser::new().with_max_tag_len(config.max_tag_len),
            hits: AtomicU64::new(0),
            compiles: AtomicU64::new(0),
        }
    }

    /// Returns the compiled form of `rule_text`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// - [`LinkCheckError::LockTimeout`] if the lock is not free in time.
    /// - [`LinkCheckError::CacheExhausted`] if a new rule does not fit.
    /// - [`LinkCheckError::Syntax`] if the rule does not parse. Nothing is
    ///   cached in that case.
    pub fn get_or_compile(&self, rule_text: &str) -> LinkResult<Arc<RuleNode>> {
        let mut rules = self.inner.try_lock_for(self.lock_timeout).ok_or_else(|| {
            warn!(timeout = ?self.lock_timeout, "timed out waiting for link rule cache");
            LinkCheckError::LockTimeout(self.lock_timeout)
        })?;

        if let Some(tree) = rules.get(rule_text) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(tree));
        }

        if rules.len() >= self.capacity {
            error!(capacity = self.capacity, rule = rule_text, "link rule cache exhausted");
            return Err(LinkCheckError::CacheExhausted {
                capacity: self.capacity,
            });
        }

        let tree = Arc::new(self.parser.parse(rule_text)?);
        self.compiles.fetch_add(1, Ordering::Relaxed);
        rules.insert(rule_text.to_string(), Arc::clone(&tree));
        debug!(rule = rule_text, entries = rules.len(), "compiled link check rule");

        Ok(tree)
    }

    /// Whether `rule_text` has been compiled.
    ///
    /// Returns false if the lock is not free within the timeout.
    pub fn contains(&self, rule_text: &str) -> bool {
        self.inner
            .try_lock_for(self.lock_timeout)
            .is_some_and(|rules| rules.contains_key(rule_text))
    }

    /// Number of compiled rules.
    ///
    /// Returns 0 if the lock is not free within the timeout.
    pub fn len(&self) -> usize {
        self.inner
            .try_lock_for(self.lock_timeout)
            .map_or(0, |rules| rules.len())
    }

    /// Returns true if nothing has been compiled.
    ///
    /// Also true if the lock is not free within the timeout.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of distinct rules.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns cache statistics.
    ///
    /// `entries` reads as 0 if the lock is not free within the timeout;
    /// the counters are always current.
    pub fn stats(&self) -> RuleCacheStats {
        RuleCacheStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
        }
    }
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new(RuleCacheConfig::default())
    }
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("RuleCache")
            .field("entries", &stats.entries)
            .field("capacity", &self.capacity)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

/// Statistics about the rule cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCacheStats {
    /// Number of compiled rules.
    pub entries: usize,
    /// Maximum number of compiled rules.
    pub capacity: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Rules compiled.
    pub compiles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn create_test_cache(capacity: usize) -> RuleCache {
        RuleCache::new(RuleCacheConfig {
            capacity,
            lock_timeout: Duration::from_millis(50),
            ..RuleCacheConfig::default()
        })
    }

    #[test]
    fn test_cache_new() {
        let cache = create_test_cache(10);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 10);
    }

    #[test]
    fn test_same_text_returns_same_tree() {
        let cache = create_test_cache(10);
        let first = cache.get_or_compile("a == *").unwrap();
        let second = cache.get_or_compile("a == *").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("a == *"));
        let stats = cache.stats();
        assert_eq!(stats.compiles, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_distinct_text_compiles_separately() {
        let cache = create_test_cache(10);
        let first = cache.get_or_compile("a == *").unwrap();
        let second = cache.get_or_compile("a ==  *").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_syntax_error_is_not_cached() {
        let cache = create_test_cache(10);
        let err = cache.get_or_compile(r#"a == "open"#).unwrap_err();
        assert!(matches!(err, LinkCheckError::Syntax(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_exhausted() {
        let cache = create_test_cache(2);
        cache.get_or_compile("a == *").unwrap();
        cache.get_or_compile("b == *").unwrap();

        let err = cache.get_or_compile("c == *").unwrap_err();
        assert!(matches!(err, LinkCheckError::CacheExhausted { capacity: 2 }));
        // Existing entries stay reachable.
        assert!(cache.get_or_compile("a == *").is_ok());
    }

    #[test]
    fn test_lock_timeout() {
        let cache = create_test_cache(2);
        let _held = cache.inner.lock();

        let err = cache.get_or_compile("a == *").unwrap_err();
        assert!(matches!(err, LinkCheckError::LockTimeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_size_queries_under_held_lock() {
        let cache = create_test_cache(2);
        cache.get_or_compile("a == *").unwrap();
        let held = cache.inner.lock();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert!(!cache.contains("a == *"));
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.compiles, 1);

        drop(held);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("a == *"));
    }

    #[test]
    fn test_configured_tag_limit() {
        let cache = RuleCache::new(RuleCacheConfig {
            max_tag_len: 3,
            ..RuleCacheConfig::default()
        });
        assert!(cache.get_or_compile("abc == *").is_ok());
        assert!(matches!(
            cache.get_or_compile("abcd == *"),
            Err(LinkCheckError::Syntax(_))
        ));
    }

    #[test]
    fn test_concurrent_compile_once() {
        let cache = Arc::new(create_test_cache(10));
        let mut handles = vec![];

        for _ in 0..8 {
            let cache_clone = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                cache_clone.get_or_compile(r#"x == "1" or y != *"#).unwrap()
            }));
        }

        let trees: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(trees.iter().all(|t| Arc::ptr_eq(t, &trees[0])));
        assert_eq!(cache.stats().compiles, 1);
        assert_eq!(cache.stats().hits, 7);
    }

    #[test]
    fn test_cache_debug() {
        let cache = create_test_cache(5);
        let debug_str = format!("{:?}", cache);
        assert!(debug_str.contains("RuleCache"));
        assert!(debug_str.contains("capacity"));
    }
}
