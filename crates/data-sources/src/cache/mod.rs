//! Expiring in-process response cache.
//!
//! A dumb store: read-through is the caller's responsibility. Adapters
//! check the cache before calling upstream and populate it after a
//! successful call. Entries are only ever replaced by key overwrite;
//! nothing trims expired entries in place.
//!
//! Instances are created by the composition root and handed to adapters,
//! so tests can inject isolated caches and drive expiry deterministically.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

/// Per-provider, per-key memory cache with caller-chosen TTLs.
///
/// Lives in process memory only; a restart loses it, which is acceptable
/// because the cache is a latency/rate-limit optimization, not a source
/// of truth.
pub struct ResponseCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value only while its expiry is in the future.
    pub fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.data.clone())
            } else {
                None
            }
        })
    }

    /// Stores a value under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, data: T, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl<T: Clone> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
