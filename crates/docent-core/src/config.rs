//! Governance configuration loaded from environment variables.
//!
//! One `GovernanceConfig` is built at process start and passed by
//! reference into the limiter and cache constructors; there is no
//! module-level singleton.

use crate::defaults;

/// Configuration for the resource-governance layer.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `REDIS_URL` | unset | Distributed store URL; unset means memory-only |
/// | `CACHE_ENABLED` | `true` | Kill switch for result caching |
/// | `CACHE_TTL_SECS` | `300` | TTL for cached derived results |
/// | `LLM_DAILY_BUDGET_UNITS` | `1000` | Per-user daily unit budget |
/// | `LLM_MAX_CONCURRENT_STREAMS` | `2` | Per-user streaming slot cap |
/// | `GOVERN_MEMORY_MAX_KEYS` | `10000` | Fallback map key ceiling |
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Distributed store connection URL; `None` disables the
    /// distributed path entirely (memory-only operation).
    pub redis_url: Option<String>,
    /// Whether derived-result caching is enabled.
    pub cache_enabled: bool,
    /// TTL for cached derived results in seconds.
    pub cache_ttl_secs: u64,
    /// Per-user daily unit budget.
    pub daily_budget_units: i64,
    /// Per-user maximum concurrent streaming responses.
    pub max_concurrent_streams: i64,
    /// Ceiling on distinct keys per in-memory fallback map.
    pub memory_max_keys: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            cache_enabled: true,
            cache_ttl_secs: defaults::CACHE_TTL_SECS,
            daily_budget_units: defaults::DAILY_BUDGET_UNITS,
            max_concurrent_streams: defaults::MAX_CONCURRENT_STREAMS,
            memory_max_keys: defaults::MEMORY_MAX_KEYS,
        }
    }
}

impl GovernanceConfig {
    /// Load configuration from environment variables with fallback to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.trim().is_empty() {
                config.redis_url = Some(url);
            }
        }

        if let Ok(val) = std::env::var("CACHE_ENABLED") {
            config.cache_enabled = val != "false" && val != "0";
        }

        if let Ok(val) = std::env::var("CACHE_TTL_SECS") {
            if let Ok(ttl) = val.parse::<u64>() {
                config.cache_ttl_secs = ttl.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid CACHE_TTL_SECS, using default");
            }
        }

        if let Ok(val) = std::env::var("LLM_DAILY_BUDGET_UNITS") {
            if let Ok(units) = val.parse::<i64>() {
                config.daily_budget_units = units.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid LLM_DAILY_BUDGET_UNITS, using default");
            }
        }

        if let Ok(val) = std::env::var("LLM_MAX_CONCURRENT_STREAMS") {
            if let Ok(max) = val.parse::<i64>() {
                config.max_concurrent_streams = max.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid LLM_MAX_CONCURRENT_STREAMS, using default");
            }
        }

        if let Ok(val) = std::env::var("GOVERN_MEMORY_MAX_KEYS") {
            if let Ok(max) = val.parse::<usize>() {
                config.memory_max_keys = max.max(1);
            } else {
                tracing::warn!(value = %val, "Invalid GOVERN_MEMORY_MAX_KEYS, using default");
            }
        }

        config
    }

    /// Override the distributed store URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Enable or disable result caching.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Override the default TTL for cached results.
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = ttl_secs;
        self
    }

    /// Override the per-user daily unit budget.
    pub fn with_daily_budget(mut self, units: i64) -> Self {
        self.daily_budget_units = units;
        self
    }

    /// Override the per-user concurrent stream cap.
    pub fn with_max_streams(mut self, max: i64) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    /// Override the fallback map key ceiling.
    pub fn with_memory_max_keys(mut self, max: usize) -> Self {
        self.memory_max_keys = max;
        self
    }
}
