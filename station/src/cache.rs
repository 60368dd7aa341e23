//! Bounded TTL cache with least-recently-used eviction.
//!
//! Built once and injected into the services that read through it.
//! Time comes from the injected [`Clock`], so expiry is testable without
//! sleeping.

use atlas_core::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    cached_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

/// Thread-safe TTL cache
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live entry, refreshing its recency
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let expired = entries.get(key).is_some_and(|e| self.is_expired(e, now));
        if expired {
            entries.remove(key);
            metrics::counter!("cache.expired").increment(1);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.last_accessed = now;
        metrics::counter!("cache.hits").increment(1);
        Some(entry.value.clone())
    }

    /// Insert or replace an entry, evicting the least recently used one when full
    pub fn set(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.lock();

        entries.retain(|_, entry| !self.is_expired(entry, now));

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let lru = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(k, _)| k.clone());
            if let Some(lru) = lru {
                entries.remove(&lru);
                metrics::counter!("cache.evictions").increment(1);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: now,
                last_accessed: now,
            },
        );
    }

    /// Drop one entry
    pub fn invalidate(&self, key: &K) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop everything
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired ones included until next access
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now - entry.cached_at >= self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_testing::{ManualClock, test_epoch};

    fn cache(capacity: usize, clock: &ManualClock) -> TtlCache<&'static str, u32> {
        TtlCache::new(capacity, Duration::minutes(5), Arc::new(clock.clone()))
    }

    #[test]
    fn set_then_get() {
        let clock = ManualClock::new(test_epoch());
        let cache = cache(2, &clock);

        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = ManualClock::new(test_epoch());
        let cache = cache(2, &clock);

        cache.set("a", 1);
        clock.advance(Duration::minutes(4));
        assert_eq!(cache.get(&"a"), Some(1));

        clock.advance(Duration::minutes(1));
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let clock = ManualClock::new(test_epoch());
        let cache = cache(2, &clock);

        cache.set("a", 1);
        clock.advance(Duration::seconds(1));
        cache.set("b", 2);
        clock.advance(Duration::seconds(1));
        let _ = cache.get(&"a");
        clock.advance(Duration::seconds(1));
        cache.set("c", 3);

        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let clock = ManualClock::new(test_epoch());
        let cache = cache(2, &clock);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn invalidate_and_clear() {
        let clock = ManualClock::new(test_epoch());
        let cache = cache(4, &clock);

        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
