//! Bounded TTL caches
//!
//! One `ResourceCache` type serves all three resource classes (playlists,
//! keys, segments); each instance is configured independently. Entries are
//! evicted least-recently-used when the cache is full, and expired entries
//! are dropped lazily when they are read. There is no background sweeper.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;

/// Which kind of upstream resource a cache holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheClass {
    Playlist,
    Key,
    Segment,
}

impl fmt::Display for CacheClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheClass::Playlist => f.write_str("playlist"),
            CacheClass::Key => f.write_str("key"),
            CacheClass::Segment => f.write_str("segment"),
        }
    }
}

/// Cached payload with its absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn new(data: Bytes, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Bounded, TTL-expiring byte cache keyed by the full target URL
pub struct ResourceCache {
    class: CacheClass,
    ttl: Duration,
    /// `None` when the cache is disabled; holds no memory in that case
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
}

impl ResourceCache {
    /// Create a cache. A disabled cache, or one with zero capacity, never stores.
    pub fn new(class: CacheClass, config: &CacheConfig) -> Self {
        let entries = if config.enabled {
            NonZeroUsize::new(config.max_entries).map(|cap| Mutex::new(LruCache::new(cap)))
        } else {
            None
        };

        Self {
            class,
            ttl: config.ttl,
            entries,
        }
    }

    pub fn class(&self) -> CacheClass {
        self.class
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// Look up `key`. An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries.as_ref()?.lock();

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                tracing::debug!("{} cache hit: {}", self.class, key);
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => {
                tracing::debug!("{} cache miss: {}", self.class, key);
                false
            }
        };

        if expired {
            entries.pop(key);
            tracing::debug!("{} cache expired: {}", self.class, key);
        }
        None
    }

    /// Insert or overwrite `key`, evicting the least-recently-used entry if full.
    pub fn set(&self, key: &str, data: Bytes) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };

        let entry = CacheEntry::new(data, self.ttl);
        if let Some((evicted, _)) = entries.lock().push(key.to_string(), entry) {
            if evicted != key {
                tracing::debug!("{} cache evicted: {}", self.class, evicted);
            }
        }
    }

    /// Number of stored entries, expired ones included until they are read
    pub fn len(&self) -> usize {
        self.entries.as_ref().map(|e| e.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .map(|e| e.lock().cap().get())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            class: self.class,
            enabled: self.is_enabled(),
            entries: self.len(),
            capacity: self.capacity(),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("class", &self.class)
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub class: CacheClass,
    pub enabled: bool,
    pub entries: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
}
