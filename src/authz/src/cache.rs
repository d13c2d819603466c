//! Bounded LRU cache with per-entry TTL
//!
//! Backs both the token introspection cache and the session cache. Entries
//! are evicted least-recently-used once capacity is reached, and are dropped
//! on access once older than the configured TTL.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;

use crate::config::CacheConfig;

/// Cached value with its insertion time
#[derive(Clone)]
struct CachedEntry<V> {
    value: V,
    cached_at: Instant,
}

impl<V> CachedEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// LRU cache whose entries expire after a fixed TTL
pub struct ExpiringLru<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, CachedEntry<V>>>,
    ttl: Duration,
    capacity: usize,
    stats: DashMap<&'static str, usize>,
}

impl<K: Hash + Eq + Clone, V: Clone> ExpiringLru<K, V> {
    /// Creates a cache, or `None` when the configured capacity is zero
    pub fn new(config: &CacheConfig) -> Option<Self> {
        let capacity = NonZeroUsize::new(config.capacity)?;
        Some(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            capacity: config.capacity,
            stats: DashMap::new(),
        })
    }

    /// Returns an unexpired value, dropping the entry if it has expired
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let lookup = entries
            .get(key)
            .map(|entry| (entry.is_expired(self.ttl), entry.value.clone()));

        match lookup {
            Some((true, _)) => {
                entries.pop(key);
                drop(entries);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                None
            }
            Some((false, value)) => {
                drop(entries);
                self.increment_stat("hits");
                Some(value)
            }
            None => {
                drop(entries);
                self.increment_stat("misses");
                None
            }
        }
    }

    /// Stores a value, evicting the least recently used entry when full
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        let replacing = entries.contains(&key);
        let displaced = entries.push(key, CachedEntry::new(value));
        drop(entries);

        if displaced.is_some() && !replacing {
            self.increment_stat("evictions");
        }
    }

    /// Removes an entry
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().pop(key).map(|entry| entry.value)
    }

    /// Drops every expired entry
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        drop(entries);

        for _ in &expired {
            self.increment_stat("expirations");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            evictions: self.get_stat("evictions"),
            entries: self.len(),
            max_entries: self.capacity,
        }
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub evictions: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
