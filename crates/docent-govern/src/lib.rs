//! # docent-govern
//!
//! Resource governance for the docent backend: fixed-window rate
//! limiting, daily usage quotas with concurrent-stream slots, and a
//! TTL result cache.
//!
//! All three components share one pattern: the distributed store is
//! authoritative across process replicas, and a bounded in-process
//! fallback keeps the service correct and available when the store is
//! unreachable. Store outages are absorbed inside this crate — the
//! only errors governance calls raise are the quota/rate rejections
//! themselves.

pub mod cache;
pub mod rate_limit;
pub mod store;
pub mod usage_limits;

// Re-export commonly used types at crate root
pub use cache::{search_cache_key, CacheService};
pub use rate_limit::{resolve_policy, RateLimiter, RatePolicy};
pub use store::DistributedStore;
pub use usage_limits::{StreamSlotGuard, UsageLimiter};
