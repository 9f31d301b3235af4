//! Error types for the docent governance layer.

use thiserror::Error;

/// Result type alias using docent's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for governance operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request rate for a key exceeded its fixed-window limit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// A user's cumulative LLM units for the current UTC day would exceed the budget
    #[error("Daily quota exceeded: {0}")]
    DailyQuotaExceeded(String),

    /// A user already has the maximum number of streaming responses in flight
    #[error("Concurrent stream limit exceeded: {0}")]
    ConcurrentStreamLimit(String),

    /// Distributed store operation failed (absorbed internally, never
    /// surfaced from governance calls; public for store construction)
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error should surface to a client as a
    /// "too many requests" rejection (HTTP 429 at the API layer).
    pub fn is_too_many_requests(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::DailyQuotaExceeded(_) | Error::ConcurrentStreamLimit(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
