//! Unified error types for the odds aggregation engine.

use thiserror::Error;

/// Unified error type for the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Odds feed error (quota, upstream, decoding).
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Cache/quota persistence error.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the upstream odds feed.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Daily call budget exhausted and nothing cached, not even stale.
    #[error("rate limited: {used}/{limit} daily calls used, no cached payload")]
    RateLimited {
        /// Calls already spent today.
        used: u32,
        /// Configured daily limit.
        limit: u32,
    },

    /// Non-2xx response from the provider.
    #[error("upstream error: HTTP {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Raw response body, surfaced for logging.
        body: String,
    },

    /// Response body was not the expected JSON shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cache/quota persistence failure bubbling up through a fetch.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl FeedError {
    /// Stable reason code for the output artifact.
    pub fn reason_code(&self) -> &'static str {
        match self {
            FeedError::RateLimited { .. } => "rate_limited",
            FeedError::Upstream { .. } => "upstream_error",
            FeedError::Malformed(_) => "malformed_payload",
            FeedError::Http(_) => "transport_error",
            FeedError::Persistence(_) => "persistence_error",
        }
    }
}

/// Store read/write errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to read a key.
    #[error("failed to read {key}: {reason}")]
    ReadFailed {
        /// Store key.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write a key.
    #[error("failed to write {key}: {reason}")]
    WriteFailed {
        /// Store key.
        key: String,
        /// Reason for failure.
        reason: String,
    },

    /// Stored value did not parse.
    #[error("corrupt state under {key}: {reason}")]
    Corrupt {
        /// Store key.
        key: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
