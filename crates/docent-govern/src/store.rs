//! Distributed counter/key-value store with lazy connection handling.
//!
//! `DistributedStore` is the shared primitive behind the rate limiter,
//! the usage limiter, and the cache service. It wraps a Redis-compatible
//! store reachable by URL and exposes the small set of atomic operations
//! the governance layer needs: increment, expiry-on-key, get/set/delete.
//!
//! Every operation absorbs connectivity and protocol errors: a failed
//! call logs a warning and reports "unavailable" (`None`) so the caller
//! falls back to its in-process memory path for that single operation.
//! Governance must fail safe — a down store never fails a user request.
//!
//! The connection state is an explicit `Disconnected | Connected` enum.
//! The handle is created on first use and reused; if creation fails the
//! store stays disconnected and the next call re-attempts, without any
//! retry loop on the request path.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Connection state for the distributed backend.
enum BackendState {
    /// No live handle; the next operation attempts a connect.
    Disconnected,
    /// Live connection manager, cloned per operation.
    Connected(ConnectionManager),
}

/// Handle to the distributed store. Each governance component owns its
/// own handle and keyspace.
pub struct DistributedStore {
    url: Option<String>,
    state: RwLock<BackendState>,
}

impl DistributedStore {
    /// Create a store for the given URL. `None` disables the
    /// distributed path entirely; all operations report unavailable
    /// and callers run memory-only.
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            state: RwLock::new(BackendState::Disconnected),
        }
    }

    /// Create a store with no distributed backend (memory-only operation).
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Whether a distributed backend URL is configured.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Get a live connection, connecting lazily on first use.
    ///
    /// Returns `None` when no URL is configured or the connect attempt
    /// fails; the failure is logged and the next call re-attempts.
    async fn connection(&self) -> Option<ConnectionManager> {
        let url = self.url.as_deref()?;

        if let BackendState::Connected(conn) = &*self.state.read().await {
            return Some(conn.clone());
        }

        let mut state = self.state.write().await;
        // Another task may have connected while we waited for the lock.
        if let BackendState::Connected(conn) = &*state {
            return Some(conn.clone());
        }

        let client = match redis::Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Invalid store URL, running memory-only");
                return None;
            }
        };

        let mut conn = match ConnectionManager::new(client).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Store connect failed, falling back to memory");
                return None;
            }
        };

        // Liveness check before handing the connection out.
        if let Err(e) = redis::cmd("PING").query_async::<String>(&mut conn).await {
            warn!(error = %e, "Store ping failed, falling back to memory");
            return None;
        }

        debug!("Connected to distributed store");
        *state = BackendState::Connected(conn.clone());
        Some(conn)
    }

    /// Drop the connection handle. The next operation reconnects lazily.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = BackendState::Disconnected;
    }

    /// Atomically increment a key by 1, returning the new value.
    pub async fn incr(&self, key: &str) -> Option<i64> {
        self.incr_by(key, 1).await
    }

    /// Atomically increment a key, returning the new value.
    pub async fn incr_by(&self, key: &str, delta: i64) -> Option<i64> {
        let mut conn = self.connection().await?;
        match conn.incr::<_, _, i64>(key, delta).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Store INCRBY failed, falling back to memory");
                None
            }
        }
    }

    /// Atomically decrement a key, returning the new value.
    pub async fn decr_by(&self, key: &str, delta: i64) -> Option<i64> {
        let mut conn = self.connection().await?;
        match conn.decr::<_, _, i64>(key, delta).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Store DECRBY failed");
                None
            }
        }
    }

    /// Set a key's time-to-live in seconds.
    pub async fn expire(&self, key: &str, secs: i64) -> Option<()> {
        let mut conn = self.connection().await?;
        match conn.expire::<_, bool>(key, secs).await {
            Ok(_) => Some(()),
            Err(e) => {
                warn!(key, error = %e, "Store EXPIRE failed");
                None
            }
        }
    }

    /// Get a string value. Outer `None` means the store was
    /// unavailable; inner `None` is an authoritative miss.
    pub async fn get(&self, key: &str) -> Option<Option<String>> {
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Store GET failed, falling back to memory");
                None
            }
        }
    }

    /// Set a string value with a TTL in seconds.
    pub async fn set_ex(&self, key: &str, value: &str, secs: u64) -> Option<()> {
        let mut conn = self.connection().await?;
        match conn.set_ex::<_, _, ()>(key, value, secs).await {
            Ok(()) => Some(()),
            Err(e) => {
                warn!(key, error = %e, "Store SETEX failed, falling back to memory");
                None
            }
        }
    }

    /// Delete a key.
    pub async fn del(&self, key: &str) -> Option<()> {
        let mut conn = self.connection().await?;
        match conn.del::<_, i64>(key).await {
            Ok(_) => Some(()),
            Err(e) => {
                warn!(key, error = %e, "Store DEL failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_reports_unavailable() {
        let store = DistributedStore::disabled();
        assert!(!store.is_configured());

        assert!(store.incr("k").await.is_none());
        assert!(store.incr_by("k", 5).await.is_none());
        assert!(store.decr_by("k", 1).await.is_none());
        assert!(store.expire("k", 60).await.is_none());
        assert!(store.get("k").await.is_none());
        assert!(store.set_ex("k", "v", 60).await.is_none());
        assert!(store.del("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_reports_unavailable() {
        let store = DistributedStore::new(Some("not-a-url".to_string()));
        assert!(store.is_configured());
        assert!(store.incr("k").await.is_none());
        // Subsequent calls re-attempt without panicking.
        assert!(store.incr("k").await.is_none());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let store = DistributedStore::disabled();
        store.reset().await;
        store.reset().await;
        assert!(store.get("k").await.is_none());
    }
}
