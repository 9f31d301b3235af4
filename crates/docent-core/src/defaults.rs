//! Centralized default constants for the docent governance layer.
//!
//! **This module is the single source of truth** for all shared default
//! values. Other crates should reference these constants instead of
//! defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Default rate limit for unrecognized endpoint categories (requests/window).
pub const RATE_LIMIT_DEFAULT: u64 = 60;

/// Rate limit for file uploads. Uploads fan out into extraction and
/// embedding jobs, so this is the tightest per-minute budget.
pub const RATE_LIMIT_UPLOAD: u64 = 10;

/// Rate limit for chat requests (each one is an LLM call).
pub const RATE_LIMIT_CHAT: u64 = 30;

/// Rate limit for summarize requests.
pub const RATE_LIMIT_SUMMARIZE: u64 = 10;

/// Rate limit for search requests (vector index lookups are cheap but
/// cacheable, so this is generous).
pub const RATE_LIMIT_SEARCH: u64 = 60;

/// Rate limit for user profile endpoints.
pub const RATE_LIMIT_USERS: u64 = 30;

/// Rate limit for note CRUD endpoints.
pub const RATE_LIMIT_NOTES: u64 = 60;

/// Default fixed-window length in seconds for all rate policies.
pub const RATE_WINDOW_SECS: u64 = 60;

// =============================================================================
// USAGE QUOTAS
// =============================================================================

/// Default per-user daily budget of LLM units (abstract cost proxy).
pub const DAILY_BUDGET_UNITS: i64 = 1000;

/// Default per-user maximum concurrent streaming responses.
pub const MAX_CONCURRENT_STREAMS: i64 = 2;

/// Seconds in a UTC day; denominator of the day index.
pub const SECS_PER_DAY: i64 = 86_400;

/// Expiry for day-keyed unit counters in the distributed store.
/// One day plus an hour of slack so a counter written just before
/// midnight still covers its whole day.
pub const DAY_COUNTER_TTL_SECS: i64 = 90_000;

/// Passive expiry for per-user stream-slot counters. A crashed process
/// that never released its slot frees it after this long.
pub const STREAM_SLOT_TTL_SECS: i64 = 3_600;

// =============================================================================
// CACHING
// =============================================================================

/// Default TTL for cached search/chat/summary results in seconds.
pub const CACHE_TTL_SECS: u64 = 300;

/// Key prefix for search result cache entries.
pub const SEARCH_CACHE_PREFIX: &str = "docent:search:";

// =============================================================================
// MEMORY FALLBACK
// =============================================================================

/// Maximum distinct keys each component's in-memory fallback map may
/// hold before the least-recently-used entries are evicted. Bounds the
/// per-process memory cost when the distributed store is unreachable
/// and a caller floods the service with distinct scope keys.
pub const MEMORY_MAX_KEYS: usize = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_are_positive() {
        const {
            assert!(RATE_LIMIT_DEFAULT > 0);
            assert!(RATE_LIMIT_UPLOAD > 0);
            assert!(RATE_LIMIT_CHAT > 0);
            assert!(RATE_LIMIT_SUMMARIZE > 0);
            assert!(RATE_LIMIT_SEARCH > 0);
            assert!(RATE_LIMIT_USERS > 0);
            assert!(RATE_LIMIT_NOTES > 0);
            assert!(RATE_WINDOW_SECS > 0);
        }
    }

    #[test]
    fn day_counter_ttl_covers_a_day() {
        const {
            assert!(DAY_COUNTER_TTL_SECS > SECS_PER_DAY);
        }
    }

    #[test]
    fn memory_ceiling_is_nonzero() {
        const {
            assert!(MEMORY_MAX_KEYS > 0);
        }
    }
}
