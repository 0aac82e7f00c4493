//! In-memory cache over a fixed key set
//!
//! This module provides [`RefreshingCache`], which loads a value for every key at
//! construction and regenerates all of them in the background once the current
//! [`Snapshot`] reaches its TTL. Readers always see one complete snapshot: a
//! refresh builds the next snapshot off to the side and swaps it in whole. When
//! a refresh fails the previous snapshot is kept and served until the next
//! successful pass.

mod config;
mod refreshing;
mod snapshot;

pub use config::{CacheConfig, DEFAULT_TTL};
pub(crate) use refreshing::Shared;
pub use refreshing::{CacheStats, RefreshingCache};
pub use snapshot::Snapshot;
