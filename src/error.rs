//! Error types for the refreshing cache

use std::time::Duration;

use thiserror::Error;

use crate::generator::GenerateError;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by [`RefreshingCache`](crate::cache::RefreshingCache)
#[derive(Debug, Error)]
pub enum CacheError {
    /// The configured TTL is zero
    #[error("TTL must be greater than zero")]
    InvalidTtl,

    /// The configured per-key generation timeout is zero
    #[error("generate timeout must be greater than zero")]
    InvalidTimeout,

    /// The generator failed for a key, so the whole pass was abandoned
    #[error("failed to generate value for key '{key}': {source}")]
    Generation {
        key: String,
        #[source]
        source: GenerateError,
    },

    /// The generator did not answer for a key within the configured timeout
    #[error("generating value for key '{key}' timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    /// The cache has been stopped and no longer accepts refreshes
    #[error("cache has been stopped")]
    Stopped,
}
