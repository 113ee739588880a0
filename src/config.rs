//! Cache configuration.
//!
//! Configuration structs have all public fields for simple instantiation:
//! create the struct with the fields set and hand it to the cache. There are
//! no builders and no constructors to remember.

/// Limits for a [`crate::cache::Cache`].
///
/// Either limit may be zero, which disables that limit. Both limits are
/// enforced together: the cache evicts until the entry count and the
/// accounted memory are both at or under their maximums.
///
/// # Examples
///
/// ```
/// use treekit::config::CacheConfig;
///
/// // At most 1000 entries, no memory limit.
/// let config = CacheConfig {
///     max_entries: 1000,
///     max_memory: 0,
/// };
/// assert!(!config.is_unlimited());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries, or `0` for no entry limit.
    pub max_entries: usize,

    /// Maximum accounted memory in bytes, or `0` for no memory limit.
    ///
    /// Entry sizes are supplied by the caller at `put` time; the cache sums
    /// them but never inspects the values, so "bytes" means whatever the
    /// caller's size metric means.
    pub max_memory: u64,
}

impl CacheConfig {
    /// A configuration with both limits disabled.
    pub fn unlimited() -> CacheConfig {
        CacheConfig {
            max_entries: 0,
            max_memory: 0,
        }
    }

    /// `true` if neither limit is set.
    pub fn is_unlimited(&self) -> bool {
        self.max_entries == 0 && self.max_memory == 0
    }
}

impl Default for CacheConfig {
    fn default() -> CacheConfig {
        CacheConfig::unlimited()
    }
}
