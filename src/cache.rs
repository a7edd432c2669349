//! Bounded Cache Primitive (spec.md §4.2).
//!
//! A single generic building block backs all three cache roles named in
//! the spec: the attribute cache (TTL'd), and the document caches inside
//! the Document Store Client plus the metadata cache inside the Binary
//! Cache (both TTL-less). This generalizes the teacher's `fs/cache.rs`
//! `AttributeCache` enum, which was hardcoded to `FileAttr`, to an
//! arbitrary value type.

use lru::LruCache;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

struct TtlEntry<V> {
    value: V,
    expiry: Option<Instant>,
}

enum Backing<K, V> {
    Plain(HashMap<K, TtlEntry<V>>),
    Lru(LruCache<K, TtlEntry<V>>),
}

/// A `key -> value` store with optional time-based staleness and an
/// optional LRU size bound.
///
/// `ttl: None` disables staleness entirely (used by the document caches,
/// which spec.md §4.2 says "the attribute cache uses it, the document
/// caches do not"). No eviction beyond TTL is required for correctness,
/// but an `Lru` backing additionally bounds the cache's size.
pub struct TtlCache<K, V> {
    backing: Backing<K, V>,
    ttl: Option<Duration>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    /// A cache with no TTL and no size bound.
    pub fn unbounded() -> Self {
        Self { backing: Backing::Plain(HashMap::new()), ttl: None }
    }

    /// A cache that treats entries older than `ttl` as missing on `get`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { backing: Backing::Plain(HashMap::new()), ttl: Some(ttl) }
    }

    /// A size-bounded LRU cache, optionally also time-bounded.
    pub fn with_lru_capacity(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { backing: Backing::Lru(LruCache::new(capacity)), ttl }
    }

    fn is_fresh(&self, entry: &TtlEntry<V>) -> bool {
        match entry.expiry {
            Some(expiry) => Instant::now() < expiry,
            None => true,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let stale = match &self.backing {
            Backing::Plain(map) => map.get(key).map(|e| !self.is_fresh(e)).unwrap_or(false),
            Backing::Lru(map) => map.peek(key).map(|e| !self.is_fresh(e)).unwrap_or(false),
        };
        if stale {
            self.remove(key);
            return None;
        }
        match &mut self.backing {
            Backing::Plain(map) => map.get(key).map(|e| e.value.clone()),
            Backing::Lru(map) => map.get(key).map(|e| e.value.clone()),
        }
    }

    /// Insert or replace the entry for `key`.
    pub fn add(&mut self, key: K, value: V) {
        let expiry = self.ttl.map(|ttl| Instant::now() + ttl);
        let entry = TtlEntry { value, expiry };
        match &mut self.backing {
            Backing::Plain(map) => {
                map.insert(key, entry);
            }
            Backing::Lru(map) => {
                map.put(key, entry);
            }
        }
    }

    pub fn remove(&mut self, key: &K) {
        match &mut self.backing {
            Backing::Plain(map) => {
                map.remove(key);
            }
            Backing::Lru(map) => {
                map.pop(key);
            }
        }
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn unbounded_cache_round_trips() {
        let mut cache: TtlCache<String, u32> = TtlCache::unbounded();
        cache.add("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        cache.remove(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn ttl_entries_expire() {
        let mut cache: TtlCache<String, u32> = TtlCache::with_ttl(Duration::from_millis(10));
        cache.add("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn lru_cache_evicts_oldest_beyond_capacity() {
        let mut cache: TtlCache<u32, u32> = TtlCache::with_lru_capacity(2, None);
        cache.add(1, 10);
        cache.add(2, 20);
        cache.add(3, 30);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
    }
}
