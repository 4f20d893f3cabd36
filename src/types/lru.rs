//! Bounded LRU Map
//!
//! Fixed-capacity map with least-recently-used eviction. Not synchronized on
//! its own; shared instances sit behind a lock owned by the caller.

use std::collections::HashMap;
use std::hash::Hash;

struct Slot<V> {
    value: V,
    last_used: u64,
}

/// Fixed-capacity map evicting the least recently touched key
pub struct BoundedLru<K, V> {
    entries: HashMap<K, Slot<V>>,
    capacity: usize,
    /// Monotonic access clock
    tick: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> BoundedLru<K, V> {
    /// Capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
            evictions: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Get a value and mark it as recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        slot.last_used = tick;
        Some(&slot.value)
    }

    /// Read without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|s| &s.value)
    }

    /// Insert or replace; returns the evicted key when capacity was exceeded
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        let tick = self.next_tick();
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.value = value;
            slot.last_used = tick;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(
            key,
            Slot {
                value,
                last_used: tick,
            },
        );
        evicted
    }

    /// Mutate an existing value in place, inserting `default()` first if absent
    pub fn upsert(&mut self, key: K, default: impl FnOnce() -> V, update: impl FnOnce(&mut V)) {
        if !self.entries.contains_key(&key) {
            self.insert(key.clone(), default());
        }
        let tick = self.next_tick();
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.last_used = tick;
            update(&mut slot.value);
        }
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&oldest);
        self.evictions += 1;
        Some(oldest)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries dropped to honour the capacity
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Iterate in arbitrary order without touching recency
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, s)| (k, &s.value))
    }

    /// Values ordered from least to most recently used
    pub fn values_by_recency(&self) -> Vec<&V> {
        let mut slots: Vec<&Slot<V>> = self.entries.values().collect();
        slots.sort_by_key(|s| s.last_used);
        slots.into_iter().map(|s| &s.value).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut lru = BoundedLru::new(2);
        lru.insert("a", 1);
        lru.insert("b", 2);
        lru.get(&"a");

        let evicted = lru.insert("c", 3);
        assert_eq!(evicted, Some("b"));
        assert!(lru.contains_key(&"a"));
        assert!(lru.contains_key(&"c"));
        assert_eq!(lru.evictions(), 1);
    }

    #[test]
    fn test_replace_keeps_size() {
        let mut lru = BoundedLru::new(2);
        lru.insert("a", 1);
        lru.insert("a", 5);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.peek(&"a"), Some(&5));
    }

    #[test]
    fn test_upsert_counts() {
        let mut lru: BoundedLru<String, u64> = BoundedLru::new(10);
        for _ in 0..3 {
            lru.upsert("x".to_string(), || 0, |v| *v += 1);
        }
        assert_eq!(lru.peek(&"x".to_string()), Some(&3));
    }

    #[test]
    fn test_values_by_recency() {
        let mut lru = BoundedLru::new(3);
        lru.insert(1, "one");
        lru.insert(2, "two");
        lru.insert(3, "three");
        lru.get(&1);
        assert_eq!(lru.values_by_recency(), vec![&"two", &"three", &"one"]);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut lru = BoundedLru::new(0);
        lru.insert(1, 1);
        lru.insert(2, 2);
        assert_eq!(lru.capacity(), 1);
        assert_eq!(lru.len(), 1);
    }
}
