//! Bounded in-process cache with per-entry TTL.
//!
//! Expiry is absolute (`timestamp + ttl`) and never refreshed by reads. When
//! the cache is full the earliest-inserted surviving key is evicted, whatever
//! its TTL or how recently it was read. This is a FIFO queue, not LRU.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::utils::now_millis;

pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp: u64,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl.as_millis() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// Live keys in insertion order.
    pub keys: Vec<String>,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: VecDeque<String>,
    /// Bumped by every delete and clear.
    invalidations: u64,
}

impl<V> Inner<V> {
    fn purge_expired(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        if self.entries.len() != before {
            let entries = &self.entries;
            self.order.retain(|key| entries.contains_key(key));
        }
        before - self.entries.len()
    }

    /// Insert after sweeping expired entries. A full cache drops its
    /// earliest-inserted key first, even when `key` is already present.
    fn insert(&mut self, key: String, entry: CacheEntry<V>, max_size: usize) {
        self.purge_expired(entry.timestamp);

        if self.entries.len() >= max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
    }

    fn lookup(&mut self, key: &str, now: u64) -> Option<V>
    where
        V: Clone,
    {
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
            Some(_) => {}
        }
        self.remove(key);
        None
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

pub struct TtlCache<V> {
    max_size: usize,
    default_ttl: Duration,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            default_ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                invalidations: 0,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<V>>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Internal("Failed to acquire cache lock".to_string()))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn set(&self, key: impl Into<String>, data: V, ttl: Duration) -> Result<()> {
        self.set_at(key, data, ttl, now_millis())
    }

    /// Store `data` under `key`, expiring `ttl` after `now`.
    ///
    /// Overwriting a surviving key keeps its insertion position.
    pub fn set_at(&self, key: impl Into<String>, data: V, ttl: Duration, now: u64) -> Result<()> {
        let entry = CacheEntry {
            data,
            timestamp: now,
            ttl,
        };
        self.lock()?.insert(key.into(), entry, self.max_size);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        self.get_at(key, now_millis())
    }

    /// Live value for `key`; an expired entry is deleted and reported as absent.
    pub fn get_at(&self, key: &str, now: u64) -> Result<Option<V>> {
        Ok(self.lock()?.lookup(key, now))
    }

    /// Presence check without TTL semantics.
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.entries.contains_key(key))
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        inner.invalidations += 1;
        Ok(inner.remove(key))
    }

    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.invalidations += 1;
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    pub fn cleanup_at(&self, now: u64) -> Result<usize> {
        Ok(self.lock()?.purge_expired(now))
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let inner = self.lock()?;
        Ok(CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            keys: inner.order.iter().cloned().collect(),
        })
    }

    /// Read-through helper: return the cached value or run `load` and cache
    /// its result. The lock is not held while `load` runs, so a result loaded
    /// across a delete or clear is returned but not cached.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let seen = {
            let mut inner = self.lock()?;
            if let Some(hit) = inner.lookup(key, now_millis()) {
                return Ok(hit);
            }
            inner.invalidations
        };

        let value = load().await?;

        let mut inner = self.lock()?;
        if inner.invalidations == seen {
            let entry = CacheEntry {
                data: value.clone(),
                timestamp: now_millis(),
                ttl,
            };
            inner.insert(key.to_string(), entry, self.max_size);
        } else {
            tracing::debug!(key, "Invalidated while loading; result not cached");
        }
        Ok(value)
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

/// Cache keys for store-scoped listings.
pub mod cache_keys {
    use uuid::Uuid;

    pub fn products(store_id: Uuid) -> String {
        format!("products:{}", store_id)
    }

    pub fn categories(store_id: Uuid) -> String {
        format!("categories:{}", store_id)
    }

    pub fn sizes(store_id: Uuid) -> String {
        format!("sizes:{}", store_id)
    }

    pub fn colors(store_id: Uuid) -> String {
        format!("colors:{}", store_id)
    }

    pub fn billboards(store_id: Uuid) -> String {
        format!("billboards:{}", store_id)
    }

    pub fn store(store_id: Uuid) -> String {
        format!("store:{}", store_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_value_expires_after_ttl() {
        let cache = TtlCache::new(10, SEC);
        cache.set_at("k", 1, SEC, 0).unwrap();

        assert_eq!(cache.get_at("k", 999).unwrap(), Some(1));
        assert_eq!(cache.get_at("k", 1_000).unwrap(), Some(1));
        assert_eq!(cache.get_at("k", 1_001).unwrap(), None);
        // Lazy expiry deleted it.
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn test_reads_do_not_refresh_expiry() {
        let cache = TtlCache::new(10, SEC);
        cache.set_at("k", "v", SEC, 0).unwrap();
        assert!(cache.get_at("k", 900).unwrap().is_some());
        assert!(cache.get_at("k", 1_500).unwrap().is_none());
    }

    #[test]
    fn test_evicts_earliest_inserted_not_least_recent() {
        let cache = TtlCache::new(3, SEC);
        let ttl = Duration::from_secs(60);
        cache.set_at("a", 1, ttl, 0).unwrap();
        cache.set_at("b", 2, ttl, 1).unwrap();
        cache.set_at("c", 3, ttl, 2).unwrap();

        // Touching "a" does not save it.
        assert_eq!(cache.get_at("a", 3).unwrap(), Some(1));
        cache.set_at("d", 4, ttl, 4).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.max_size, 3);
        assert_eq!(stats.keys, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_overwrite_keeps_position_below_capacity() {
        let cache = TtlCache::new(3, SEC);
        let ttl = Duration::from_secs(60);
        cache.set_at("a", 1, ttl, 0).unwrap();
        cache.set_at("b", 2, ttl, 0).unwrap();
        cache.set_at("a", 10, ttl, 1).unwrap();

        assert_eq!(cache.stats().unwrap().keys, vec!["a", "b"]);
        assert_eq!(cache.get_at("a", 2).unwrap(), Some(10));
    }

    #[test]
    fn test_overwrite_at_capacity_evicts_oldest() {
        let cache = TtlCache::new(2, SEC);
        let ttl = Duration::from_secs(60);
        cache.set_at("a", 1, ttl, 0).unwrap();
        cache.set_at("b", 2, ttl, 0).unwrap();

        // "a" is the oldest key, so it is evicted and re-inserted at the back.
        cache.set_at("a", 10, ttl, 1).unwrap();
        assert_eq!(cache.stats().unwrap().keys, vec!["b", "a"]);
        assert_eq!(cache.get_at("a", 2).unwrap(), Some(10));

        // Overwriting "a" at capacity costs "b" its slot.
        cache.set_at("a", 11, ttl, 3).unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.keys, vec!["a"]);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_expired_entries_are_swept_before_eviction() {
        let cache = TtlCache::new(2, SEC);
        cache.set_at("short", 1, Duration::from_millis(10), 0).unwrap();
        cache.set_at("long", 2, Duration::from_secs(60), 0).unwrap();

        cache.set_at("new", 3, Duration::from_secs(60), 100).unwrap();
        assert_eq!(cache.stats().unwrap().keys, vec!["long", "new"]);
    }

    #[test]
    fn test_cleanup_pass_removes_expired() {
        let cache = TtlCache::new(10, SEC);
        cache.set_at("a", 1, Duration::from_millis(10), 0).unwrap();
        cache.set_at("b", 2, Duration::from_secs(60), 0).unwrap();

        assert_eq!(cache.cleanup_at(50).unwrap(), 1);
        assert_eq!(cache.stats().unwrap().keys, vec!["b"]);
    }

    #[test]
    fn test_has_delete_clear_ignore_ttl() {
        let cache = TtlCache::new(10, SEC);
        cache.set_at("a", 1, Duration::from_millis(1), 0).unwrap();
        // Expired but not yet observed by a read.
        assert!(cache.has("a").unwrap());
        assert!(cache.delete("a").unwrap());
        assert!(!cache.delete("a").unwrap());

        cache.set("b", 2, SEC).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().size, 0);
    }

    #[tokio::test]
    async fn test_read_through_loads_once() {
        let cache: TtlCache<u32> = TtlCache::default();
        let mut calls = 0;

        let first = cache
            .get_or_try_insert_with("k", Duration::from_secs(60), || {
                calls += 1;
                async { Ok(7) }
            })
            .await
            .unwrap();
        let second = cache
            .get_or_try_insert_with("k", Duration::from_secs(60), || async { Ok(8) })
            .await
            .unwrap();

        assert_eq!((first, second, calls), (7, 7, 1));
    }

    #[tokio::test]
    async fn test_read_through_skips_caching_after_invalidation() {
        let cache: TtlCache<u32> = TtlCache::default();
        let ttl = Duration::from_secs(60);

        let stale = cache
            .get_or_try_insert_with("k", ttl, || async {
                // A writer invalidates the key while the load is in flight.
                cache.delete("k").unwrap();
                Ok(1)
            })
            .await
            .unwrap();
        assert_eq!(stale, 1);
        assert!(!cache.has("k").unwrap());

        let fresh = cache
            .get_or_try_insert_with("k", ttl, || async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(fresh, 2);
        assert_eq!(cache.get("k").unwrap(), Some(2));
    }
}
