use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use byref_types::ObjectId;

/// Bounded least-recently-used byte cache.
///
/// Holds payloads a store has recently written or fetched so that
/// resolving one's own keys, or re-resolving after an invalidation, skips
/// the connector round trip. Capacity is counted in entries; a capacity
/// of zero disables caching entirely.
///
/// Capacity stays small (16 by default at the store layer), so the linear
/// recency scan is cheaper than any fancier bookkeeping.
pub struct LruCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

struct LruInner {
    entries: HashMap<ObjectId, Vec<u8>>,
    /// Most-recently-used first.
    recency: VecDeque<ObjectId>,
}

impl LruCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LruInner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
        }
    }

    /// Entry bound this cache was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a payload, promoting it to most-recently-used on hit.
    pub fn get(&self, id: &ObjectId) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if !inner.entries.contains_key(id) {
            return None;
        }
        if let Some(pos) = inner.recency.iter().position(|entry| entry == id) {
            inner.recency.remove(pos);
        }
        inner.recency.push_front(*id);
        inner.entries.get(id).cloned()
    }

    /// Insert a payload, evicting the least-recently-used entry past
    /// capacity. No-op when the cache is disabled.
    pub fn insert(&self, id: ObjectId, data: Vec<u8>) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.entries.insert(id, data).is_some() {
            if let Some(pos) = inner.recency.iter().position(|entry| *entry == id) {
                inner.recency.remove(pos);
            }
        }
        inner.recency.push_front(id);
        while inner.entries.len() > self.capacity {
            match inner.recency.pop_back() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop a payload, if cached.
    pub fn remove(&self, id: &ObjectId) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.entries.remove(id).is_some() {
            if let Some(pos) = inner.recency.iter().position(|entry| entry == id) {
                inner.recency.remove(pos);
            }
        }
    }

    /// Returns `true` if the payload is cached, without promoting it.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.inner
            .lock()
            .expect("lock poisoned")
            .entries
            .contains_key(id)
    }

    /// Number of cached payloads.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached payloads.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.entries.clear();
        inner.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjectId {
        ObjectId::of_content(&[n])
    }

    #[test]
    fn insert_and_get() {
        let cache = LruCache::new(4);
        cache.insert(id(1), b"one".to_vec());
        assert_eq!(cache.get(&id(1)).unwrap(), b"one");
        assert!(cache.get(&id(2)).is_none());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = LruCache::new(2);
        cache.insert(id(1), b"1".to_vec());
        cache.insert(id(2), b"2".to_vec());
        cache.insert(id(3), b"3".to_vec());
        assert!(!cache.contains(&id(1)));
        assert!(cache.contains(&id(2)));
        assert!(cache.contains(&id(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn get_promotes_entry() {
        let cache = LruCache::new(2);
        cache.insert(id(1), b"1".to_vec());
        cache.insert(id(2), b"2".to_vec());
        // Touch 1 so that 2 becomes the eviction candidate.
        cache.get(&id(1));
        cache.insert(id(3), b"3".to_vec());
        assert!(cache.contains(&id(1)));
        assert!(!cache.contains(&id(2)));
    }

    #[test]
    fn reinsert_updates_payload_without_growth() {
        let cache = LruCache::new(4);
        cache.insert(id(1), b"old".to_vec());
        cache.insert(id(1), b"new".to_vec());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&id(1)).unwrap(), b"new");
    }

    #[test]
    fn remove_drops_entry() {
        let cache = LruCache::new(4);
        cache.insert(id(1), b"1".to_vec());
        cache.remove(&id(1));
        assert!(cache.is_empty());
        // Removing again is harmless.
        cache.remove(&id(1));
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = LruCache::new(0);
        cache.insert(id(1), b"1".to_vec());
        assert!(cache.is_empty());
        assert!(cache.get(&id(1)).is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = LruCache::new(4);
        cache.insert(id(1), b"1".to_vec());
        cache.insert(id(2), b"2".to_vec());
        cache.clear();
        assert!(cache.is_empty());
    }
}
