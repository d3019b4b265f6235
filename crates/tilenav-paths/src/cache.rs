//! Least-recently-used store of path results.
//!
//! Keys include the grid revision, so any grid mutation orphans every entry
//! stored before it. Orphans are never looked up again and age out through
//! normal LRU eviction.

use std::collections::{BTreeMap, HashMap};

use tilenav_core::Point;

use crate::search::PathResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) revision: u64,
    pub(crate) start: Point,
    pub(crate) goal: Point,
    pub(crate) flags: u8,
}

pub(crate) struct PathCache {
    capacity: usize,
    entries: HashMap<CacheKey, (PathResult, u64)>,
    /// Recency stamp → key, oldest first.
    order: BTreeMap<u64, CacheKey>,
    clock: u64,
}

impl PathCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Change the capacity, evicting the oldest entries down to it.
    /// A capacity of 0 disables storage.
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_to(capacity);
    }

    /// Look up `key`, marking it most recently used.
    pub(crate) fn get(&mut self, key: &CacheKey) -> Option<&PathResult> {
        self.clock += 1;
        let clock = self.clock;
        let (result, stamp) = self.entries.get_mut(key)?;
        self.order.remove(stamp);
        *stamp = clock;
        self.order.insert(clock, *key);
        Some(result)
    }

    /// Store `result` under `key`, evicting the least recently used entries
    /// if the cache is full.
    pub(crate) fn put(&mut self, key: CacheKey, result: PathResult) {
        if self.capacity == 0 {
            return;
        }
        self.clock += 1;
        if let Some((_, old)) = self.entries.insert(key, (result, self.clock)) {
            self.order.remove(&old);
        }
        self.order.insert(self.clock, key);
        self.evict_to(self.capacity);
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            log::trace!("path cache evicted {} -> {} @ rev {}", key.start, key.goal, key.revision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rev: u64, x: i32) -> CacheKey {
        CacheKey {
            revision: rev,
            start: Point::new(0, 0),
            goal: Point::new(x, 0),
            flags: 0,
        }
    }

    fn result(x: i32) -> PathResult {
        PathResult {
            success: true,
            cost: x as f32,
            path: vec![Point::new(0, 0), Point::new(x, 0)],
        }
    }

    #[test]
    fn hit_and_miss() {
        let mut c = PathCache::new(4);
        c.put(key(1, 3), result(3));
        assert_eq!(c.get(&key(1, 3)), Some(&result(3)));
        assert!(c.get(&key(2, 3)).is_none());
        let other_flags = CacheKey { flags: 1, ..key(1, 3) };
        assert!(c.get(&other_flags).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut c = PathCache::new(2);
        c.put(key(1, 1), result(1));
        c.put(key(1, 2), result(2));
        // Touch 1 so 2 becomes the oldest.
        assert!(c.get(&key(1, 1)).is_some());
        c.put(key(1, 3), result(3));
        assert_eq!(c.len(), 2);
        assert!(c.get(&key(1, 2)).is_none());
        assert!(c.get(&key(1, 1)).is_some());
        assert!(c.get(&key(1, 3)).is_some());
    }

    #[test]
    fn reinsert_replaces() {
        let mut c = PathCache::new(2);
        c.put(key(1, 1), result(1));
        c.put(key(1, 1), result(5));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(&key(1, 1)).map(|r| r.cost), Some(5.0));
    }

    #[test]
    fn shrinking_capacity_evicts() {
        let mut c = PathCache::new(8);
        for x in 0..8 {
            c.put(key(1, x), result(x));
        }
        c.set_capacity(3);
        assert_eq!(c.len(), 3);
        assert!(c.get(&key(1, 7)).is_some());
        assert!(c.get(&key(1, 4)).is_none());
        c.set_capacity(0);
        assert_eq!(c.len(), 0);
        c.put(key(1, 1), result(1));
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn clear_empties() {
        let mut c = PathCache::new(3);
        c.put(key(1, 1), result(1));
        c.clear();
        assert_eq!(c.len(), 0);
        assert!(c.get(&key(1, 1)).is_none());
    }
}
