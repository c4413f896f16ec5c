//! Bounded LRU cache for recipe-expansion requirement lookups.
//!
//! Purely a speedup: entries are derived solely from the immutable catalog,
//! so a hit and a recompute are always identical. Capacity-bounded with true
//! least-recently-used eviction.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::types::ResourceId;

pub const REQUIREMENTS_CACHE_CAPACITY: usize = 1_000;

/// Per-output input requirements for a given requested quantity.
pub type Requirements = SmallVec<[(ResourceId, f32); 4]>;

/// Cache key: output kind plus the requested quantity's bit pattern, so
/// float keys hash exactly.
type Key = (ResourceId, u32);

#[derive(Debug, Clone)]
pub struct RequirementsCache {
    capacity: usize,
    entries: AHashMap<Key, (Requirements, u64)>,
    /// Monotonic use counter; the smallest stamp is the LRU entry.
    clock: u64,
}

impl Default for RequirementsCache {
    fn default() -> Self {
        Self::with_capacity(REQUIREMENTS_CACHE_CAPACITY)
    }
}

impl RequirementsCache {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            capacity,
            entries: AHashMap::with_capacity(capacity),
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A hit refreshes the entry's recency.
    pub fn get(&mut self, output: ResourceId, quantity: f32) -> Option<Requirements> {
        self.clock += 1;
        let clock = self.clock;
        self.entries
            .get_mut(&(output, quantity.to_bits()))
            .map(|(reqs, stamp)| {
                *stamp = clock;
                reqs.clone()
            })
    }

    pub fn insert(&mut self, output: ResourceId, quantity: f32, requirements: Requirements) {
        self.clock += 1;
        let key = (output, quantity.to_bits());
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(key, (requirements, self.clock));
    }

    fn evict_lru(&mut self) {
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, (_, stamp))| *stamp)
            .map(|(key, _)| *key)
        {
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn reqs(n: u16) -> Requirements {
        smallvec![(ResourceId(n), 1.0)]
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = RequirementsCache::with_capacity(2);
        cache.insert(ResourceId(0), 1.0, reqs(0));
        cache.insert(ResourceId(1), 1.0, reqs(1));

        // Touch entry 0 so entry 1 is now the LRU.
        assert!(cache.get(ResourceId(0), 1.0).is_some());

        cache.insert(ResourceId(2), 1.0, reqs(2));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(ResourceId(1), 1.0).is_none());
        assert!(cache.get(ResourceId(0), 1.0).is_some());
        assert!(cache.get(ResourceId(2), 1.0).is_some());
    }

    #[test]
    fn distinct_quantities_are_distinct_keys() {
        let mut cache = RequirementsCache::with_capacity(8);
        cache.insert(ResourceId(0), 1.0, reqs(1));
        cache.insert(ResourceId(0), 2.0, reqs(2));
        assert_eq!(cache.get(ResourceId(0), 1.0).unwrap()[0].0, ResourceId(1));
        assert_eq!(cache.get(ResourceId(0), 2.0).unwrap()[0].0, ResourceId(2));
    }

    #[test]
    fn reinsert_does_not_evict() {
        let mut cache = RequirementsCache::with_capacity(2);
        cache.insert(ResourceId(0), 1.0, reqs(0));
        cache.insert(ResourceId(1), 1.0, reqs(1));
        cache.insert(ResourceId(0), 1.0, reqs(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(ResourceId(1), 1.0).is_some());
    }
}
