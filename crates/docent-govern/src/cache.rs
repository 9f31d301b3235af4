//! Result cache for search, chat, and summary handlers.
//!
//! Values are serialized to JSON and stored in the distributed store
//! with a per-entry TTL; when the store is unreachable the entry lives
//! in a bounded in-process map instead. A global enabled flag lets
//! operators kill caching without a code change: when disabled, reads
//! miss and writes are no-ops (no memory growth either).

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use docent_core::{defaults, GovernanceConfig};

use crate::store::DistributedStore;

/// In-memory cache entry with an absolute expiry.
struct MemoryEntry {
    expires_at: Instant,
    value: serde_json::Value,
}

struct CacheInner {
    store: DistributedStore,
    enabled: bool,
    default_ttl_secs: u64,
    memory: Mutex<LruCache<String, MemoryEntry>>,
}

/// JSON value cache with per-entry TTL.
///
/// One instance is constructed at process start and cloned into
/// handlers (clones share state).
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<CacheInner>,
}

impl CacheService {
    /// Create a cache service from governance configuration.
    pub fn new(config: &GovernanceConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memory_max_keys.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                store: DistributedStore::new(config.redis_url.clone()),
                enabled: config.cache_enabled,
                default_ttl_secs: config.cache_ttl_secs,
                memory: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Create a disabled cache (for testing or operational kill switch).
    pub fn disabled() -> Self {
        Self::new(&GovernanceConfig::default().with_cache_enabled(false))
    }

    /// Whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// TTL applied by [`set_json_default`](Self::set_json_default),
    /// from `CACHE_TTL_SECS` at construction.
    pub fn default_ttl_secs(&self) -> u64 {
        self.inner.default_ttl_secs
    }

    /// Fetch and deserialize a cached value.
    ///
    /// Returns `None` on miss, expiry, disabled caching, or any
    /// store/deserialization failure. An expired in-memory entry is
    /// purged on the read that discovers it.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.inner.enabled {
            return None;
        }

        match self.inner.store.get(key).await {
            Some(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key, "Cache hit (distributed)");
                    return Some(value);
                }
                Err(e) => {
                    // Corrupt entry; fall through to the memory path.
                    warn!(key, error = %e, "Cache deserialization error");
                }
            },
            Some(None) => {
                // Authoritative miss from the store.
                debug!(key, "Cache miss (distributed)");
                return None;
            }
            None => {}
        }

        let now = Instant::now();
        let mut memory = self.inner.memory.lock().await;
        let cached = memory
            .get(key)
            .map(|entry| (entry.expires_at, entry.value.clone()));
        match cached {
            Some((expires_at, value)) if now < expires_at => {
                drop(memory);
                debug!(key, "Cache hit (memory)");
                serde_json::from_value(value).ok()
            }
            Some(_) => {
                // Expired: purge rather than merely ignore.
                memory.pop(key);
                debug!(key, "Cache entry expired (memory)");
                None
            }
            None => None,
        }
    }

    /// Serialize and store a value with a TTL in seconds.
    ///
    /// No-op when caching is disabled. A store failure falls back to
    /// the in-memory map for this call; a serialization failure is
    /// logged and the value is simply not cached.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if !self.inner.enabled {
            return;
        }

        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Cache serialization error");
                return;
            }
        };

        if self
            .inner
            .store
            .set_ex(key, &json.to_string(), ttl_secs)
            .await
            .is_some()
        {
            debug!(key, ttl_secs, "Cache set (distributed)");
            return;
        }

        let mut memory = self.inner.memory.lock().await;
        memory.put(
            key.to_string(),
            MemoryEntry {
                expires_at: Instant::now() + Duration::from_secs(ttl_secs),
                value: json,
            },
        );
        drop(memory);
        debug!(key, ttl_secs, "Cache set (memory)");
    }

    /// Serialize and store a value with the configured default TTL.
    pub async fn set_json_default<T: Serialize>(&self, key: &str, value: &T) {
        self.set_json(key, value, self.inner.default_ttl_secs).await;
    }

    /// Number of entries currently held by the in-memory fallback map.
    pub async fn memory_len(&self) -> usize {
        self.inner.memory.lock().await.len()
    }

    /// Empty the memory map and drop the store handle; the next
    /// operation reconnects lazily. Never fails.
    pub async fn clear(&self) {
        self.inner.memory.lock().await.clear();
        self.inner.store.reset().await;
    }
}

/// Build a cache key for a search/chat query over one file.
///
/// Hashes the normalized query (lowercased, trimmed) together with the
/// file id and `top_k`, so equivalent queries share an entry and the
/// key stays bounded regardless of query length.
pub fn search_cache_key(file_id: &str, top_k: usize, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    hasher.update(top_k.to_le_bytes());
    hasher.update(query.to_lowercase().trim().as_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("{}{}", defaults::SEARCH_CACHE_PREFIX, &hash[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_cache_key_deterministic() {
        let key1 = search_cache_key("file-1", 5, "hello world");
        let key2 = search_cache_key("file-1", 5, "hello world");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_search_cache_key_normalizes_query() {
        let key1 = search_cache_key("file-1", 5, "hello world");
        let key2 = search_cache_key("file-1", 5, "  HELLO WORLD  ");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_search_cache_key_distinguishes_inputs() {
        let base = search_cache_key("file-1", 5, "hello");
        assert_ne!(base, search_cache_key("file-2", 5, "hello"));
        assert_ne!(base, search_cache_key("file-1", 10, "hello"));
        assert_ne!(base, search_cache_key("file-1", 5, "goodbye"));
    }

    #[test]
    fn test_search_cache_key_prefix() {
        let key = search_cache_key("file-1", 5, "hello");
        assert!(key.starts_with(defaults::SEARCH_CACHE_PREFIX));
    }
}
