//! Structured logging schema and field name constants for docent.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log aggregation tools can query by standardized field
//! names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, reset), operation completions |
//! | DEBUG | Decision points, cache hits/misses, config choices |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Component within the governance layer.
/// Values: "store", "rate_limit", "usage_limits", "cache"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "hit", "consume_daily_units", "acquire_stream_slot", "get_json"
pub const OPERATION: &str = "op";

/// Scope key a counter or cache entry is keyed by (caller-composed).
pub const SCOPE_KEY: &str = "scope_key";

/// Endpoint category a rate policy or unit charge applies to.
pub const CATEGORY: &str = "category";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Current counter value after the operation.
pub const COUNT: &str = "count";

/// Configured limit or budget the counter is checked against.
pub const LIMIT: &str = "limit";

/// Remaining allowance after the operation.
pub const REMAINING: &str = "remaining";

/// Units charged by a quota operation.
pub const UNITS: &str = "units";

/// TTL applied to a key, in seconds.
pub const TTL_SECS: &str = "ttl_secs";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Whether the governed operation was allowed.
pub const ALLOWED: &str = "allowed";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
