//! Per-key fixed-window rate limiting.
//!
//! Counting is fixed-window: the window is anchored at the first hit
//! for a key and resets entirely once it has elapsed, as opposed to a
//! sliding window. The distributed store is authoritative across
//! process replicas; when it is unreachable each process counts in a
//! bounded in-memory map instead, so throttling degrades to per-process
//! rather than failing requests.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use docent_core::{defaults, Error, GovernanceConfig, Result};

use crate::store::DistributedStore;

/// A `(limit, window)` pair for one endpoint category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Maximum requests per window.
    pub limit: u64,
    /// Fixed window length in seconds.
    pub window_secs: u64,
}

/// Resolve the rate policy for an endpoint category.
///
/// Unrecognized categories fall back to the default policy. This table
/// is configuration, not logic; keep it in sync with the route list.
pub fn resolve_policy(category: &str) -> RatePolicy {
    let limit = match category {
        "upload" => defaults::RATE_LIMIT_UPLOAD,
        "chat" => defaults::RATE_LIMIT_CHAT,
        "summarize" => defaults::RATE_LIMIT_SUMMARIZE,
        "search" => defaults::RATE_LIMIT_SEARCH,
        "users" => defaults::RATE_LIMIT_USERS,
        "notes" => defaults::RATE_LIMIT_NOTES,
        _ => defaults::RATE_LIMIT_DEFAULT,
    };
    RatePolicy {
        limit,
        window_secs: defaults::RATE_WINDOW_SECS,
    }
}

/// In-memory window counter for one key.
struct WindowCounter {
    count: u64,
    window_expires_at: Instant,
}

struct RateLimiterInner {
    store: DistributedStore,
    memory: Mutex<LruCache<String, WindowCounter>>,
}

/// Fixed-window rate limiter shared by all request handlers.
///
/// One instance is constructed at process start and cloned into
/// handlers (clones share state).
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    /// Create a rate limiter from governance configuration.
    pub fn new(config: &GovernanceConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memory_max_keys.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RateLimiterInner {
                store: DistributedStore::new(config.redis_url.clone()),
                memory: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Create a memory-only limiter (for testing or when no store is
    /// configured).
    pub fn disabled() -> Self {
        Self::new(&GovernanceConfig::default())
    }

    /// Record a hit for `key` and decide whether it is allowed.
    ///
    /// Returns `(allowed, remaining)`. The first hit for a key starts a
    /// window; each subsequent hit within the window increments the
    /// counter. Over-limit hits still count — the counter is not rolled
    /// back — so a client hammering a blocked key stays blocked for the
    /// whole window.
    pub async fn hit(&self, key: &str, limit: u64, window_secs: u64) -> (bool, u64) {
        // Distributed path: INCR + EXPIRE on first increment, the
        // post-increment value decides the outcome.
        if let Some(count) = self.inner.store.incr(key).await {
            if count == 1 {
                self.inner.store.expire(key, window_secs as i64).await;
            }
            let count = count.max(0) as u64;
            let allowed = count <= limit;
            let remaining = limit.saturating_sub(count);
            debug!(key, count, limit, allowed, "Rate limit hit (distributed)");
            return (allowed, remaining);
        }

        // Memory path: read-modify-write under the lock, no I/O inside
        // the critical section.
        let now = Instant::now();
        let mut memory = self.inner.memory.lock().await;
        let live = match memory.get_mut(key) {
            Some(counter) if now < counter.window_expires_at => {
                counter.count += 1;
                Some(counter.count)
            }
            _ => None,
        };
        let count = match live {
            Some(count) => count,
            None => {
                // First hit for this key, or the old window has
                // elapsed: start a fresh window anchored at now.
                memory.put(
                    key.to_string(),
                    WindowCounter {
                        count: 1,
                        window_expires_at: now + Duration::from_secs(window_secs),
                    },
                );
                1
            }
        };
        drop(memory);

        let allowed = count <= limit;
        let remaining = limit.saturating_sub(count);
        debug!(key, count, limit, allowed, "Rate limit hit (memory)");
        (allowed, remaining)
    }

    /// Resolve the policy for `category`, record a hit, and reject with
    /// [`Error::RateLimited`] when over the limit.
    ///
    /// This is the injection point routes use; on success it returns
    /// the remaining allowance for response headers.
    pub async fn enforce(&self, key: &str, category: &str) -> Result<u64> {
        let policy = resolve_policy(category);
        let (allowed, remaining) = self.hit(key, policy.limit, policy.window_secs).await;
        if allowed {
            Ok(remaining)
        } else {
            Err(Error::RateLimited(format!(
                "{key} over {} requests per {}s",
                policy.limit, policy.window_secs
            )))
        }
    }

    /// Reset all state: empty the memory map and drop the store handle
    /// so the next operation reconnects lazily. Never fails.
    pub async fn clear(&self) {
        self.inner.memory.lock().await.clear();
        self.inner.store.reset().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_categories_have_policies() {
        for category in ["upload", "chat", "summarize", "search", "users", "notes"] {
            let policy = resolve_policy(category);
            assert!(policy.limit > 0, "{category} should have a limit");
            assert!(policy.window_secs > 0);
        }
    }

    #[test]
    fn test_unknown_category_yields_default() {
        let policy = resolve_policy("unknown_endpoint");
        assert_eq!(policy.limit, defaults::RATE_LIMIT_DEFAULT);
        assert_eq!(policy.window_secs, defaults::RATE_WINDOW_SECS);
    }

    #[tokio::test]
    async fn test_enforce_maps_to_rate_limited_error() {
        let limiter = RateLimiter::new(&GovernanceConfig::default());
        // "summarize" has the smallest limit; exhaust it.
        let policy = resolve_policy("summarize");
        for _ in 0..policy.limit {
            limiter.enforce("user:s", "summarize").await.unwrap();
        }
        let err = limiter.enforce("user:s", "summarize").await.unwrap_err();
        assert!(err.is_too_many_requests());
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_memory_map_is_bounded() {
        let config = GovernanceConfig::default().with_memory_max_keys(3);
        let limiter = RateLimiter::new(&config);
        for i in 0..10 {
            limiter.hit(&format!("key:{i}"), 5, 60).await;
        }
        let memory = limiter.inner.memory.lock().await;
        assert!(memory.len() <= 3);
    }
}
