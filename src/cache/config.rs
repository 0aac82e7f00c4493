//! Cache configuration

use std::time::Duration;

use crate::error::{CacheError, Result};

/// TTL used when none is configured
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Lower bound for the refresher's check period
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a [`RefreshingCache`](super::RefreshingCache)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Age after which a snapshot is due for regeneration
    pub ttl: Duration,
    /// Upper bound for a single generator call, unbounded when `None`
    pub generate_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            generate_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Sets the TTL; the refresher then checks every `ttl / 2`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Bounds every generator call by `timeout`
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(timeout);
        self
    }

    /// Period of the refresher's staleness check
    ///
    /// Half the TTL, so a snapshot is never older than 1.5 × TTL.
    pub fn check_interval(&self) -> Duration {
        (self.ttl / 2).max(MIN_CHECK_INTERVAL)
    }

    /// Rejects a zero TTL or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }
        if self.generate_timeout.is_some_and(|t| t.is_zero()) {
            return Err(CacheError::InvalidTimeout);
        }
        Ok(())
    }
}
