//! Hit-ratio accounting for the cache.
//!
//! The counters are deliberately narrow (`u16`). When the try count
//! approaches its ceiling, both counters are halved; the ratio is preserved
//! but every later access carries twice the weight, so the reported ratio
//! decays toward recent behavior instead of averaging over the cache's whole
//! lifetime.

/// Decaying hit/try counters. Held by [`crate::cache::Cache`]; can also be
/// embedded by any other lookup structure that wants the same accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    hits: u16,
    tries: u16,
}

impl CacheStats {
    /// Halve both counters once the try count reaches this value.
    const DECAY_AT: u16 = 0xFFFE;

    /// Records one lookup and whether it hit.
    pub fn record(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        }
        self.tries += 1;
        if self.tries >= Self::DECAY_AT {
            self.hits >>= 1;
            self.tries >>= 1;
        }
    }

    /// The weighted hit ratio in basis points: `(10000 * hits) / tries`,
    /// always in `0..=10000`. Zero tries reads as zero hits.
    pub fn hit_ratio(&self) -> u32 {
        if self.tries == 0 {
            return 0;
        }
        (10_000 * u32::from(self.hits)) / u32::from(self.tries)
    }

    /// Lookups that found an entry, after decay.
    pub fn hits(&self) -> u16 {
        self.hits
    }

    /// Total lookups, after decay.
    pub fn tries(&self) -> u16 {
        self.tries
    }

    /// Zeroes both counters.
    pub fn reset(&mut self) {
        *self = CacheStats::default();
    }
}
