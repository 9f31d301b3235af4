//! Per-user daily unit budgets and concurrent stream slots.
//!
//! Two independent sub-contracts share the same backend:
//!
//! - **Daily budget**: every LLM call charges a number of abstract
//!   units against a counter keyed by user and UTC day index. A call
//!   that would push the day's total over the budget is rejected with
//!   [`Error::DailyQuotaExceeded`].
//! - **Stream slots**: long-lived streaming responses take a per-user
//!   concurrency permit; acquiring past the cap is rejected with
//!   [`Error::ConcurrentStreamLimit`].
//!
//! On the distributed path both checks use increment-then-compensate:
//! atomically add, read the new total, and subtract back before
//! rejecting. The compensation is not atomic with the increment, so
//! under heavy contention from one user a transient overshoot is
//! possible before rollback completes. This is an accepted trade-off;
//! the memory path checks before mutating under its lock and has no
//! such window.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use docent_core::{defaults, Error, GovernanceConfig, Result};

use crate::store::DistributedStore;

/// Compute the UTC day index for a Unix timestamp in seconds.
///
/// Two calls in the same UTC calendar day always map to the same
/// index; calls in different days never collide.
fn day_index(unix_secs: i64) -> i64 {
    unix_secs.div_euclid(defaults::SECS_PER_DAY)
}

fn units_key(user_scope: &str, day: i64) -> String {
    format!("docent:usage:units:{user_scope}:{day}")
}

fn streams_key(user_scope: &str) -> String {
    format!("docent:usage:streams:{user_scope}")
}

struct UsageLimiterInner {
    store: DistributedStore,
    daily_budget_units: i64,
    max_concurrent_streams: i64,
    /// Day-keyed unit totals; old days linger until evicted by the LRU
    /// ceiling, which is the pruning bound the fallback relies on.
    memory_units: Mutex<LruCache<String, i64>>,
    /// Per-user active stream counts; entries are removed at zero.
    memory_streams: Mutex<LruCache<String, i64>>,
}

/// Daily budget and stream slot limiter.
///
/// One instance is constructed at process start and cloned into
/// handlers (clones share state).
#[derive(Clone)]
pub struct UsageLimiter {
    inner: Arc<UsageLimiterInner>,
}

impl UsageLimiter {
    /// Create a usage limiter from governance configuration.
    pub fn new(config: &GovernanceConfig) -> Self {
        let capacity = NonZeroUsize::new(config.memory_max_keys.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(UsageLimiterInner {
                store: DistributedStore::new(config.redis_url.clone()),
                daily_budget_units: config.daily_budget_units,
                max_concurrent_streams: config.max_concurrent_streams,
                memory_units: Mutex::new(LruCache::new(capacity)),
                memory_streams: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Charge `units` against the user's budget for the current UTC day.
    ///
    /// Fails with [`Error::DailyQuotaExceeded`] when the cumulative
    /// total after this charge would exceed the budget; a rejected call
    /// does not consume budget (distributed path rolls the increment
    /// back, memory path checks before mutating).
    pub async fn consume_daily_units(
        &self,
        user_scope: &str,
        endpoint: &str,
        units: i64,
    ) -> Result<()> {
        if units <= 0 {
            return Ok(());
        }
        let budget = self.inner.daily_budget_units;
        let day = day_index(chrono::Utc::now().timestamp());
        let key = units_key(user_scope, day);

        // Distributed path: INCRBY and read the new total in one round
        // trip, compensating on rejection.
        if let Some(total) = self.inner.store.incr_by(&key, units).await {
            if total == units {
                // Fresh counter for this day; expire a little past the
                // day boundary so it cleans itself up.
                self.inner
                    .store
                    .expire(&key, defaults::DAY_COUNTER_TTL_SECS)
                    .await;
            }
            if total > budget {
                if self.inner.store.decr_by(&key, units).await.is_none() {
                    warn!(key = %key, units, "Quota rollback failed; counter may overshoot");
                }
                return Err(Error::DailyQuotaExceeded(format!(
                    "{user_scope} over {budget} units for {endpoint}"
                )));
            }
            debug!(key = %key, units, total, budget, "Charged daily units (distributed)");
            return Ok(());
        }

        // Memory path: check before mutating under the lock, so no
        // compensation step is needed.
        let mut memory = self.inner.memory_units.lock().await;
        let current = memory.get(&key).copied().unwrap_or(0);
        if current + units > budget {
            return Err(Error::DailyQuotaExceeded(format!(
                "{user_scope} over {budget} units for {endpoint}"
            )));
        }
        memory.put(key.clone(), current + units);
        drop(memory);

        debug!(key = %key, units, total = current + units, budget, "Charged daily units (memory)");
        Ok(())
    }

    /// Acquire a streaming concurrency slot for the user.
    ///
    /// Fails with [`Error::ConcurrentStreamLimit`] when the user is
    /// already at the configured maximum. On success the returned
    /// [`StreamSlotGuard`] releases the slot when dropped or via
    /// [`StreamSlotGuard::release`], covering error and cancellation
    /// exit paths.
    pub async fn acquire_stream_slot(&self, user_scope: &str) -> Result<StreamSlotGuard> {
        let max = self.inner.max_concurrent_streams;
        let key = streams_key(user_scope);

        if let Some(active) = self.inner.store.incr(&key).await {
            // Passive expiry so a crashed process frees its slots.
            self.inner
                .store
                .expire(&key, defaults::STREAM_SLOT_TTL_SECS)
                .await;
            if active > max {
                if self.inner.store.decr_by(&key, 1).await.is_none() {
                    warn!(key = %key, "Slot rollback failed; count may overshoot until expiry");
                }
                return Err(Error::ConcurrentStreamLimit(format!(
                    "{user_scope} already has {max} active streams"
                )));
            }
            debug!(key = %key, active, max, "Acquired stream slot (distributed)");
        } else {
            let mut memory = self.inner.memory_streams.lock().await;
            let active = memory.get(&key).copied().unwrap_or(0);
            if active >= max {
                return Err(Error::ConcurrentStreamLimit(format!(
                    "{user_scope} already has {max} active streams"
                )));
            }
            memory.put(key.clone(), active + 1);
            drop(memory);
            debug!(key = %key, active = active + 1, max, "Acquired stream slot (memory)");
        }

        Ok(StreamSlotGuard {
            limiter: self.clone(),
            scope: user_scope.to_string(),
            released: false,
        })
    }

    /// Release a streaming slot for the user.
    ///
    /// Clamped at zero: releasing without a matching acquire is a
    /// no-op. The distributed key is deleted once the count reaches
    /// zero rather than left as a stale value.
    pub async fn release_stream_slot(&self, user_scope: &str) {
        let key = streams_key(user_scope);

        if let Some(active) = self.inner.store.decr_by(&key, 1).await {
            if active <= 0 {
                self.inner.store.del(&key).await;
            }
            debug!(key = %key, active = active.max(0), "Released stream slot (distributed)");
            return;
        }

        let mut memory = self.inner.memory_streams.lock().await;
        if let Some(active) = memory.get(&key).copied() {
            if active <= 1 {
                memory.pop(&key);
            } else {
                memory.put(key.clone(), active - 1);
            }
        }
        drop(memory);
        debug!(key = %key, "Released stream slot (memory)");
    }

    /// Reset all state: empty both memory maps and drop the store
    /// handle so the next operation reconnects lazily. Never fails.
    pub async fn clear(&self) {
        self.inner.memory_units.lock().await.clear();
        self.inner.memory_streams.lock().await.clear();
        self.inner.store.reset().await;
    }
}

/// Scoped stream slot: releases exactly once, on all exit paths.
///
/// Prefer the explicit [`release`](Self::release) at the end of the
/// stream; the `Drop` fallback spawns the release so a cancelled or
/// erroring handler still frees the slot.
pub struct StreamSlotGuard {
    limiter: UsageLimiter,
    scope: String,
    released: bool,
}

impl StreamSlotGuard {
    /// The user scope this slot was acquired for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Release the slot now.
    pub async fn release(mut self) {
        self.released = true;
        let scope = std::mem::take(&mut self.scope);
        self.limiter.release_stream_slot(&scope).await;
    }
}

impl std::fmt::Debug for StreamSlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSlotGuard")
            .field("scope", &self.scope)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Drop for StreamSlotGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let limiter = self.limiter.clone();
        let scope = std::mem::take(&mut self.scope);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    limiter.release_stream_slot(&scope).await;
                });
            }
            Err(_) => {
                warn!(scope = %scope, "Stream slot guard dropped outside a runtime; slot held until expiry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_index_deterministic() {
        let now = 1_700_000_000;
        assert_eq!(day_index(now), day_index(now));
    }

    #[test]
    fn test_day_index_changes_across_days() {
        let now = 1_700_000_000;
        assert_ne!(day_index(now), day_index(now + defaults::SECS_PER_DAY));
    }

    #[test]
    fn test_same_day_same_index() {
        // Midnight and one second before the next midnight.
        let midnight = 1_700_006_400; // divisible by 86400
        assert_eq!(day_index(midnight), day_index(midnight + 86_399));
        assert_ne!(day_index(midnight), day_index(midnight - 1));
    }

    #[test]
    fn test_key_composition_separates_users_and_days() {
        assert_ne!(units_key("user:a", 100), units_key("user:b", 100));
        assert_ne!(units_key("user:a", 100), units_key("user:a", 101));
        assert_ne!(streams_key("user:a"), streams_key("user:b"));
    }

    #[tokio::test]
    async fn test_zero_units_is_noop() {
        let limiter = UsageLimiter::new(&GovernanceConfig::default().with_daily_budget(1));
        limiter.consume_daily_units("user:z", "chat", 0).await.unwrap();
        limiter.consume_daily_units("user:z", "chat", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_guard_debug_shows_scope() {
        let limiter = UsageLimiter::new(&GovernanceConfig::default());
        let guard = limiter.acquire_stream_slot("user:dbg").await.unwrap();
        assert!(format!("{guard:?}").contains("user:dbg"));
        guard.release().await;
    }

    #[tokio::test]
    async fn test_memory_maps_are_bounded() {
        let limiter = UsageLimiter::new(
            &GovernanceConfig::default()
                .with_daily_budget(1000)
                .with_memory_max_keys(3),
        );

        // Flood with distinct user scopes; hold the guards so no
        // release shrinks the streams map mid-test.
        let mut guards = Vec::new();
        for i in 0..50 {
            let scope = format!("user:{i}");
            limiter
                .consume_daily_units(&scope, "chat", 1)
                .await
                .unwrap();
            guards.push(limiter.acquire_stream_slot(&scope).await.unwrap());
        }

        assert!(limiter.inner.memory_units.lock().await.len() <= 3);
        assert!(limiter.inner.memory_streams.lock().await.len() <= 3);
    }
}
