//! A bounded key/value cache backed by a splay tree.
//!
//! The cache keeps its tree in overwrite mode, so a `put` with an existing
//! key politely replaces the old entry. Every access splays, which drags the
//! hot set toward the root and lets stale entries sink. When a limit is
//! exceeded the cache evicts deep leaf nodes, which in a splay tree are the
//! least recently touched entries, making eviction approximately LRU without
//! keeping any recency bookkeeping of its own.
//!
//! Two limits are enforced together: a maximum entry count and a maximum
//! accounted memory. Entry sizes are supplied by the caller at `put` time;
//! the cache sums them but never inspects them. Either limit can be zero,
//! meaning unlimited.

extern crate alloc;

use core::cmp::Ordering;
use core::fmt;

use crate::config::CacheConfig;
use crate::metrics::CacheStats;
use crate::splay::SplayTree;
use crate::tree::{Inserted, KeyPolicy};

/// A cached value plus the size the caller declared for it.
struct Entry<V> {
    size: u64,
    value: V,
}

/// A splay-tree cache with entry-count and memory limits.
///
/// See the [module docs](crate::cache) for the eviction model.
pub struct Cache<K, V> {
    tree: SplayTree<K, Entry<V>>,
    max_entries: usize,
    max_memory: u64,
    mem_used: u64,
    stats: CacheStats,
}

impl<K: Ord, V> Cache<K, V> {
    /// Creates an empty cache ordered by `K`'s `Ord` implementation.
    pub fn new(config: CacheConfig) -> Cache<K, V> {
        Cache {
            tree: SplayTree::new(KeyPolicy::Overwrite),
            max_entries: config.max_entries,
            max_memory: config.max_memory,
            mem_used: 0,
            stats: CacheStats::default(),
        }
    }
}

impl<K, V> Cache<K, V> {
    /// Creates an empty cache ordered by an explicit comparison function.
    pub fn with_comparator(cmp: fn(&K, &K) -> Ordering, config: CacheConfig) -> Cache<K, V> {
        Cache {
            tree: SplayTree::with_comparator(cmp, KeyPolicy::Overwrite),
            max_entries: config.max_entries,
            max_memory: config.max_memory,
            mem_used: 0,
            stats: CacheStats::default(),
        }
    }

    /// Adds an entry, replacing any entry with an equal key.
    ///
    /// `size` is charged against the memory limit. The cache is trimmed
    /// afterwards; the fresh entry sits at the root after its splay, so it
    /// is a very unlikely eviction victim. Returns the replaced value, if
    /// any.
    pub fn put(&mut self, key: K, value: V, size: u64) -> Option<V> {
        self.mem_used += size;
        let replaced = match self.tree.insert_value(key, Entry { size, value }) {
            Ok(Inserted::Linked) => None,
            Ok(Inserted::Replaced(old)) => {
                let (_, entry) = old.into_parts();
                self.mem_used -= entry.size;
                Some(entry.value)
            }
            Err(_) => unreachable!("overwrite-mode insert cannot be rejected"),
        };
        self.trim();
        replaced
    }

    /// Looks up a key, splaying it to the root on a hit.
    ///
    /// Every call updates the hit-ratio counters.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let found = self.tree.find(key);
        self.stats.record(found.is_some());
        found.map(|node| &node.value().value)
    }

    /// Like [`Cache::get`], but grants mutable access to the cached value.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let found = self.tree.find_mut(key);
        self.stats.record(found.is_some());
        found.map(|node| &mut node.value_mut().value)
    }

    /// Removes the entry with the given key and returns its value.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let dead = self.tree.remove(key)?;
        let (_, entry) = dead.into_parts();
        self.mem_used -= entry.size;
        Some(entry.value)
    }

    /// Evicts up to `count` entries from the bottom of the tree.
    ///
    /// Returns `true` if `count` entries were evicted, `false` if the cache
    /// ran empty first. Useful for shedding load without changing the
    /// configured limits.
    pub fn reduce(&mut self, count: usize) -> bool {
        for _ in 0..count {
            let Some(leaf) = self.tree.leaf_raw() else {
                return false;
            };
            // SAFETY: the handle was just produced by this cache's tree.
            let dead = unsafe { self.tree.remove_node(leaf) };
            let (_, entry) = dead.into_parts();
            self.mem_used -= entry.size;
        }
        true
    }

    /// Evicts until both limits are satisfied.
    fn trim(&mut self) {
        while (self.max_entries != 0 && self.tree.len() > self.max_entries)
            || (self.max_memory != 0 && self.mem_used > self.max_memory)
        {
            if !self.reduce(1) {
                return;
            }
        }
    }

    /// Sets a new entry limit (zero for unlimited) and returns the old one.
    /// Shrinking the limit trims the cache immediately.
    pub fn set_max_entries(&mut self, new_max: usize) -> usize {
        let old = self.max_entries;
        self.max_entries = new_max;
        if new_max < old || (new_max != 0 && old == 0) {
            self.trim();
        }
        old
    }

    /// Sets a new memory limit (zero for unlimited) and returns the old one.
    /// Shrinking the limit trims the cache immediately.
    pub fn set_max_memory(&mut self, new_max: u64) -> u64 {
        let old = self.max_memory;
        self.max_memory = new_max;
        if new_max < old || (new_max != 0 && old == 0) {
            self.trim();
        }
        old
    }

    /// Removes every entry and resets the hit-ratio counters. Returns the
    /// number of entries removed. The configured limits are kept.
    pub fn clear(&mut self) -> usize {
        let removed = self.tree.clear();
        self.mem_used = 0;
        self.stats.reset();
        removed
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Sum of the declared sizes of all cached entries.
    pub fn mem_used(&self) -> u64 {
        self.mem_used
    }

    /// The current entry limit; zero means unlimited.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// The current memory limit; zero means unlimited.
    pub fn max_memory(&self) -> u64 {
        self.max_memory
    }

    /// The weighted hit ratio in basis points; see
    /// [`CacheStats::hit_ratio`].
    pub fn hit_ratio(&self) -> u32 {
        self.stats.hit_ratio()
    }

    /// A copy of the decaying hit/try counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.tree.len())
            .field("mem_used", &self.mem_used)
            .field("max_entries", &self.max_entries)
            .field("max_memory", &self.max_memory)
            .finish_non_exhaustive()
    }
}
