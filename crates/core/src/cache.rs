//! Bounded in-memory response cache with per-entry TTL and LRU eviction
//!
//! Entries are keyed by a deterministic string built from an endpoint and its
//! query parameters (see [`cache_key`]). Both [`ResponseCache::get`] and
//! [`ResponseCache::set`] count as a touch for recency purposes; when the cache
//! is full the least recently touched entry is evicted before an insert.
//!
//! Time is read through `tokio::time::Instant`, so tests running on a paused
//! runtime can advance the clock to expire entries deterministically.
//!
//! # Example
//!
//! ```rust
//! use leadflow_core::cache::{cache_key, CacheConfig, ResponseCache};
//!
//! let cache = ResponseCache::new(CacheConfig::default());
//! let key = cache_key("leads", [("status", "new")]);
//!
//! cache.set(&key, "payload".to_string(), None);
//! assert_eq!(cache.get(&key).as_deref(), Some("payload"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Default maximum number of cached responses
pub const CACHE_MAX_SIZE: usize = 100;

/// Default time-to-live for cached responses, in milliseconds
pub const CACHE_TTL_MS: u64 = 60_000;

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held at once
    pub max_entries: usize,
    /// TTL applied when `set` is called without an explicit one
    #[serde(with = "crate::duration_ms")]
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: CACHE_MAX_SIZE,
            default_ttl: Duration::from_millis(CACHE_TTL_MS),
        }
    }
}

/// A cached value with its lifetime bounds
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was inserted
    pub created_at: Instant,
    /// First instant at which the entry is no longer served
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// An entry is expired once `now >= expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of live entries
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped to make room for new ones
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

/// Tracks access order for LRU eviction.
///
/// Front = most recently used, back = least recently used.
#[derive(Debug, Default)]
struct LruTracker {
    order: VecDeque<String>,
}

impl LruTracker {
    fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    fn evict_oldest(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    stats: CacheStats,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> bool {
        self.lru.remove(key);
        self.entries.remove(key).is_some()
    }
}

/// Thread-safe TTL + LRU cache
pub struct ResponseCache<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: LruTracker::default(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Build the cache key for an endpoint and its query parameters.
    ///
    /// Same as [`cache_key`].
    pub fn key<I, K, P>(endpoint: &str, params: I) -> String
    where
        I: IntoIterator<Item = (K, P)>,
        K: AsRef<str>,
        P: AsRef<str>,
    {
        cache_key(endpoint, params)
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a value, dropping it if its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            None => {
                inner.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            inner.remove(key);
            inner.stats.expirations += 1;
            inner.stats.misses += 1;
            trace!(key = %key, "Cache entry expired");
            return None;
        }

        inner.lru.touch(key);
        inner.stats.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert a value. `None` uses the configured default TTL.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        if self.config.max_entries == 0 {
            return;
        }

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut inner = self.lock();

        if !inner.entries.contains_key(key) {
            while inner.entries.len() >= self.config.max_entries {
                let Some(oldest) = inner.lru.evict_oldest() else {
                    break;
                };
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
                trace!(key = %oldest, "Evicted least recently used cache entry");
            }
        }

        inner.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        inner.lru.touch(key);
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key)
    }

    /// Remove every entry under the endpoint `prefix`. Returns the count removed.
    ///
    /// Matches the endpoint itself, its parameterised variants (`prefix:...`)
    /// and sub-paths (`prefix/...`), but not unrelated endpoints that merely
    /// share leading characters: `leads` does not match `leads_archive`.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let doomed: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| under_prefix(k, prefix))
            .cloned()
            .collect();

        for key in &doomed {
            inner.remove(key);
        }
        doomed.len()
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.lru.clear();
    }

    /// Drop all entries whose TTL has elapsed. Returns the count removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.stats.expirations += expired.len() as u64;
        expired.len()
    }

    /// Number of entries currently held (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn under_prefix(key: &str, prefix: &str) -> bool {
    let Some(rest) = key.strip_prefix(prefix) else {
        return false;
    };
    rest.is_empty()
        || prefix.ends_with(['/', ':'])
        || rest.starts_with(['/', ':'])
}

/// Serialize an endpoint and its parameters into a cache key.
///
/// Parameters are sorted by name first, so two parameter sets with the same
/// name/value pairs always produce the same key regardless of insertion order.
pub fn cache_key<I, K, P>(endpoint: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, P)>,
    K: AsRef<str>,
    P: AsRef<str>,
{
    let sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect();

    if sorted.is_empty() {
        return endpoint.to_string();
    }

    // serde_json escapes quotes and separators, so keys can't collide by concatenation
    let encoded = serde_json::to_string(&sorted).unwrap_or_default();
    format!("{endpoint}:{encoded}")
}
