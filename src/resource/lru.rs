use rustc_hash::FxHashMap;
use std::hash::Hash;

struct LruEntry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity map that evicts the least recently touched entry.
///
/// Entries live in a slab and form an intrusive doubly linked list ordered from most
/// (`head`) to least (`tail`) recently used.
pub struct LruCache<K, V> {
    capacity: usize,
    map: FxHashMap<K, usize>,
    entries: Vec<LruEntry<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: FxHashMap::default(),
            entries: Vec::with_capacity(capacity.min(1024)),
            head: None,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces `key`, making it the most recently used entry. Returns the
    /// evicted entry, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }

        if let Some(&index) = self.map.get(&key) {
            self.entries[index].value = value;
            self.promote(index);
            return None;
        }

        if self.entries.len() < self.capacity {
            let index = self.entries.len();
            self.entries.push(LruEntry {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.map.insert(key, index);
            self.push_front(index);
            return None;
        }

        // Reuse the least recently used slot.
        let index = self.tail?;
        self.unlink(index);
        let entry = &mut self.entries[index];
        let old_key = std::mem::replace(&mut entry.key, key.clone());
        let old_value = std::mem::replace(&mut entry.value, value);
        self.map.remove(&old_key);
        self.map.insert(key, index);
        self.push_front(index);
        Some((old_key, old_value))
    }

    /// Looks up `key` and promotes it to most recently used.
    pub fn find(&mut self, key: &K) -> Option<&V> {
        let index = *self.map.get(key)?;
        self.promote(index);
        Some(&self.entries[index].value)
    }

    /// Looks up `key` without touching the recency order.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&index| &self.entries[index].value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.entries.clear();
        self.head = None;
        self.tail = None;
    }

    fn promote(&mut self, index: usize) {
        if self.head == Some(index) {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let entry = &self.entries[index];
            (entry.prev, entry.next)
        };
        match prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.tail = prev,
        }
        let entry = &mut self.entries[index];
        entry.prev = None;
        entry.next = None;
    }

    fn push_front(&mut self, index: usize) {
        self.entries[index].prev = None;
        self.entries[index].next = self.head;
        if let Some(head) = self.head {
            self.entries[head].prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LruCache;

    #[test]
    fn evicts_least_recently_inserted() {
        let mut cache = LruCache::new(2);
        assert!(cache.insert("a", 1).is_none());
        assert!(cache.insert("b", 2).is_none());
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn find_promotes_entry() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.find(&"a"), Some(&1));
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.peek(&"c"), Some(&3));
    }

    #[test]
    fn peek_does_not_promote() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
    }

    #[test]
    fn reinsert_updates_and_promotes() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.insert("a", 10).is_none());
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
        assert_eq!(cache.peek(&"a"), Some(&10));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.insert(1, 1), Some((1, 1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn long_sequence_keeps_list_consistent() {
        let mut cache = LruCache::new(3);
        for i in 0..20 {
            cache.insert(i, i * 2);
            if i % 3 == 0 {
                cache.find(&(i / 2));
            }
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.peek(&19), Some(&38));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.insert(1, 1).is_none());
    }
}
