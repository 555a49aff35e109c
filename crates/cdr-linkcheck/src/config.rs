//! Configuration types for link checking.

use std::time::Duration;

use cdr_linkrule::DEFAULT_MAX_TAG_LEN;

/// Configuration for a [`LinkChecker`](crate::LinkChecker).
///
/// # Example
///
/// ```rust
/// use cdr_linkcheck::{LinkCheckConfig, RuleCacheConfig};
/// use std::time::Duration;
///
/// let config = LinkCheckConfig::builder()
///     .with_rule_cache(RuleCacheConfig {
///         capacity: 100,
///         lock_timeout: Duration::from_secs(2),
///         ..RuleCacheConfig::default()
///     })
///     .with_max_fragment_miss_reports(10)
///     .build();
/// assert_eq!(config.max_fragment_miss_reports, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkCheckConfig {
    /// Rule cache settings.
    pub rule_cache: RuleCacheConfig,
    /// Per-document errors listed for one missing fragment before summarizing.
    pub max_fragment_miss_reports: usize,
    /// Longest `cdr:id` value that can be stored.
    pub max_fragment_len: usize,
    /// Longest link reference that can be stored.
    pub max_reference_len: usize,
}

impl Default for LinkCheckConfig {
    fn default() -> Self {
        Self {
            rule_cache: RuleCacheConfig::default(),
            max_fragment_miss_reports: 5,
            max_fragment_len: 32,
            max_reference_len: 256,
        }
    }
}

impl LinkCheckConfig {
    /// Creates a new builder for LinkCheckConfig.
    pub fn builder() -> LinkCheckConfigBuilder {
        LinkCheckConfigBuilder::default()
    }
}

/// Builder for LinkCheckConfig.
#[derive(Debug, Clone, Default)]
pub struct LinkCheckConfigBuilder {
    config: LinkCheckConfig,
}

impl LinkCheckConfigBuilder {
    /// Sets the rule cache configuration.
    pub fn with_rule_cache(mut self, rule_cache: RuleCacheConfig) -> Self {
        self.config.rule_cache = rule_cache;
        self
    }

    /// Sets how many referencing documents are listed per missing fragment.
    pub fn with_max_fragment_miss_reports(mut self, max: usize) -> Self {
        self.config.max_fragment_miss_reports = max;
        self
    }

    /// Sets the longest storable fragment identifier.
    pub fn with_max_fragment_len(mut self, max: usize) -> Self {
        self.config.max_fragment_len = max;
        self
    }

    /// Sets the longest storable link reference.
    pub fn with_max_reference_len(mut self, max: usize) -> Self {
        self.config.max_reference_len = max;
        self
    }

    /// Builds the LinkCheckConfig.
    pub fn build(self) -> LinkCheckConfig {
        self.config
    }
}

/// Configuration for the compiled rule cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuleCacheConfig {
    /// Maximum number of distinct rules. Exceeding it is a configuration error.
    pub capacity: usize,
    /// How long a caller waits for the cache lock.
    pub lock_timeout: Duration,
    /// Longest field tag accepted in a rule.
    pub max_tag_len: usize,
}

impl Default for RuleCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            lock_timeout: Duration::from_millis(5000),
            max_tag_len: DEFAULT_MAX_TAG_LEN,
        }
    }
}
