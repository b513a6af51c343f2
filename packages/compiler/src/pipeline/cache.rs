//! Persisted stage cache (§6 "Persisted cache layout") and the lock used to
//! serialize concurrent writers to the same cache key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub version: String,
    pub artifact_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBlob {
    pub meta: CacheMeta,
    pub artifact: serde_json::Value,
}

/// Storage for one blob per cache key. `version` mismatches are treated as
/// misses (§6): a stage-version bump safely shadows old entries rather than
/// returning stale data.
pub trait PersistentCache: Send + Sync {
    fn get(&self, cache_key: &str, expected_version: &str) -> Option<CacheBlob>;
    fn put(&self, cache_key: &str, blob: CacheBlob);
}

/// An in-process cache, the default a `compiler-cli` run reaches for when no
/// on-disk cache directory is configured. A real embedder backing this with
/// a filesystem or remote store implements the same trait.
#[derive(Default)]
pub struct InMemoryCache {
    blobs: Mutex<HashMap<String, CacheBlob>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        InMemoryCache::default()
    }
}

impl PersistentCache for InMemoryCache {
    fn get(&self, cache_key: &str, expected_version: &str) -> Option<CacheBlob> {
        let blobs = self.blobs.lock().expect("cache mutex poisoned");
        let blob = blobs.get(cache_key)?;
        if blob.meta.version != expected_version {
            trace!(cache_key, expected_version, found_version = %blob.meta.version, "cache entry version mismatch, treating as miss");
            return None;
        }
        Some(blob.clone())
    }

    fn put(&self, cache_key: &str, blob: CacheBlob) {
        let mut blobs = self.blobs.lock().expect("cache mutex poisoned");
        debug!(cache_key, "storing stage artifact in persistent cache");
        blobs.insert(cache_key.to_string(), blob);
    }
}

/// Cross-process writers racing to populate the same cache key poll a lock
/// instead of blocking on wall-clock time, so tests stay deterministic
/// (§9 Open Question resolutions: "Cache lock contention timeout").
pub struct CacheLock {
    held: Arc<Mutex<()>>,
}

impl CacheLock {
    pub const DEFAULT_POLL_ATTEMPTS: u32 = 32;

    pub fn new() -> Self {
        CacheLock { held: Arc::new(Mutex::new(())) }
    }

    /// Attempt to acquire the lock, retrying up to `attempts` times. Returns
    /// `true` once acquired (and releases immediately, since this models a
    /// single in-process critical section rather than a held cross-process
    /// lease); `false` if every attempt found the lock taken.
    pub fn acquire(&self, attempts: u32) -> bool {
        for attempt in 0..attempts {
            if let Ok(_guard) = self.held.try_lock() {
                return true;
            }
            trace!(attempt, "cache lock busy, polling");
        }
        false
    }
}

impl Default for CacheLock {
    fn default() -> Self {
        CacheLock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_a_miss() {
        let cache = InMemoryCache::new();
        cache.put("k1", CacheBlob { meta: CacheMeta { version: "1".to_string(), artifact_hash: "abc".to_string() }, artifact: serde_json::json!({}) });
        assert!(cache.get("k1", "2").is_none());
        assert!(cache.get("k1", "1").is_some());
    }

    #[test]
    fn lock_acquires_when_uncontended() {
        let lock = CacheLock::new();
        assert!(lock.acquire(CacheLock::DEFAULT_POLL_ATTEMPTS));
    }
}
