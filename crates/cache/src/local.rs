//! In-process TTL cache backed by DashMap for lock-free concurrent access.
//! Entries are replaced wholesale; there is no partial update.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Largest TTL chrono can represent as whole seconds.
const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
}

/// Per-account cache of fetched records.
pub struct LocalCache<T> {
    name: &'static str,
    store: Arc<DashMap<String, CacheEntry<T>>>,
    ttl: Duration,
}

impl<T: Clone> LocalCache<T> {
    pub fn new(name: &'static str, ttl_secs: u64) -> Self {
        Self {
            name,
            store: Arc::new(DashMap::new()),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    /// Cached value for `key` if still fresh. A forced refresh always misses.
    pub fn get(&self, key: &str, force_refresh: bool) -> Option<T> {
        self.get_at(key, force_refresh, Utc::now())
    }

    pub fn get_at(&self, key: &str, force_refresh: bool, now: DateTime<Utc>) -> Option<T> {
        if force_refresh {
            metrics::counter!("cache.bypass", "cache" => self.name).increment(1);
            return None;
        }
        let entry = self.store.get(key)?;
        if now.signed_duration_since(entry.fetched_at) >= self.ttl {
            metrics::counter!("cache.miss", "cache" => self.name).increment(1);
            return None;
        }
        metrics::counter!("cache.hit", "cache" => self.name).increment(1);
        debug!(cache = self.name, key = key, "Cache hit");
        Some(entry.data.clone())
    }

    pub fn set(&self, key: &str, data: T) {
        self.set_at(key, data, Utc::now());
    }

    /// Stores `data` and drops whatever expired as of `fetched_at`, so keys
    /// that are never read again do not pile up.
    pub fn set_at(&self, key: &str, data: T, fetched_at: DateTime<Utc>) {
        let evicted = self.evict_expired_at(fetched_at);
        if evicted > 0 {
            debug!(cache = self.name, evicted = evicted, "Expired entries evicted");
        }
        self.store
            .insert(key.to_string(), CacheEntry { data, fetched_at });
    }

    /// Drops one key, or every key when `key` is `None`.
    pub fn invalidate(&self, key: Option<&str>) {
        match key {
            Some(k) => {
                self.store.remove(k);
            }
            None => self.store.clear(),
        }
        debug!(cache = self.name, key = ?key, "Cache invalidated");
    }

    fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| now.signed_duration_since(entry.fetched_at) < self.ttl);
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
