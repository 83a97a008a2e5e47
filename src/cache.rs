//! Read cache with lazy TTL expiry
//!
//! Holds logically successful GET responses keyed by `{url}#{options_digest}`,
//! where `options_digest` is the SHA-256 digest of the canonical request options
//! (method, lower-cased headers, body). The URL stays readable in the key so
//! [`ResponseCache::invalidate`] can match endpoint substrings.
//!
//! Expiry is lazy: a lookup ignores an entry older than the TTL but leaves it
//! in place until it is overwritten, invalidated, or dropped by the optional
//! sweep task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Thread-safe response cache with a single TTL
pub struct ResponseCache {
    /// Cache entries keyed by `url#options_digest`
    entries: DashMap<String, CachedResponse>,
    /// Time-to-live applied to every entry
    ttl: Duration,
    /// Cache statistics
    stats: CacheStats,
}

/// A cached response with its storage time
struct CachedResponse {
    value: Value,
    stored_at: Instant,
}

impl CachedResponse {
    fn is_stale(&self, ttl: Duration) -> bool {
        Instant::now().duration_since(self.stored_at) > ttl
    }
}

/// Cache statistics tracked atomically
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    invalidations: AtomicU64,
    swept: AtomicU64,
}

impl ResponseCache {
    /// Create a new empty cache
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// TTL applied to entries
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a cached response if it exists and is still fresh
    ///
    /// A stale entry counts as a miss and is left in place.
    pub fn get(&self, key: &str) -> Option<Value> {
        let Some(entry) = self.entries.get(key) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.is_stale(self.ttl) {
            self.stats.stale.fetch_add(1, Ordering::Relaxed);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Cache entry stale");
            None
        } else {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            Some(entry.value.clone())
        }
    }

    /// Store a value, replacing any previous entry for `key`
    pub fn set(&self, key: &str, value: Value) {
        let entry = CachedResponse {
            value,
            stored_at: Instant::now(),
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// Remove every entry whose key contains `pattern`
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = !key.contains(pattern);
            removed += usize::from(!keep);
            keep
        });

        if removed > 0 {
            self.stats
                .invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(pattern, removed, "Cache invalidated");
        }
        removed
    }

    /// Drop entries whose TTL has elapsed
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_stale(ttl);
            removed += usize::from(!keep);
            keep
        });

        if removed > 0 {
            self.stats.swept.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, fresh or stale
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStatsSnapshot {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStatsSnapshot {
            hits,
            misses,
            stale: self.stats.stale.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            swept: self.stats.swept.load(Ordering::Relaxed),
            size: self.entries.len(),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }

    /// Build a cache key from a URL and the canonical request options
    ///
    /// `options` should already be canonical (sorted keys). `serde_json::Value`
    /// objects serialize in key order, so a `Value` built from a `BTreeMap`
    /// or from `json!` is stable.
    #[must_use]
    pub fn build_key(url: &str, options: &Value) -> String {
        let canonical = serde_json::to_string(options).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{url}#{}", hex::encode(digest))
    }
}

/// Spawn a background task that periodically drops stale entries
///
/// The task stops once it holds the last reference to the cache.
pub fn spawn_sweep_task(cache: Arc<ResponseCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if Arc::strong_count(&cache) <= 1 {
                break;
            }
            let removed = cache.evict_expired();
            if removed > 0 {
                debug!(removed, "Swept stale cache entries");
            }
        }
    })
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Misses caused by an expired entry
    pub stale: u64,
    /// Entries removed by invalidation
    pub invalidations: u64,
    /// Entries removed by the sweep task
    pub swept: u64,
    /// Current number of entries
    pub size: usize,
    /// Hit rate (0.0-1.0)
    pub hit_rate: f64,
}
