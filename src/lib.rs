//! ttlcache library
//!
//! An in-memory cache over a fixed set of keys whose values are regenerated in
//! the background on a TTL. Exposes the CLI module for use in integration tests.

pub mod cache;
pub mod cli;
pub mod error;
pub mod generator;
mod refresh;

pub use cache::{CacheConfig, CacheStats, RefreshingCache, Snapshot};
pub use error::{CacheError, Result};
pub use generator::{FnGenerator, GenerateError, Generator, RandomStringGenerator};
