//! Immutable store snapshots

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// One refresh pass worth of values, together with when it was swapped in
///
/// A snapshot is never modified after construction; a refresh replaces the
/// whole snapshot, so every entry in it comes from the same pass.
#[derive(Debug)]
pub struct Snapshot<V> {
    entries: HashMap<String, V>,
    generation: u64,
    refreshed_at: Instant,
    updated_at: DateTime<Utc>,
}

impl<V> Snapshot<V> {
    pub(crate) fn new(entries: HashMap<String, V>, generation: u64) -> Self {
        Self {
            entries,
            generation,
            refreshed_at: Instant::now(),
            updated_at: Utc::now(),
        }
    }

    /// Value for `key`, if it is in the configured key set
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Whether `key` is in the configured key set
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, equal to the number of configured keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache was built over an empty key set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sequence number of the pass that produced this snapshot, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Monotonic time at which this snapshot was swapped in
    pub fn refreshed_at(&self) -> Instant {
        self.refreshed_at
    }

    /// Wall-clock time at which this snapshot was swapped in
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time elapsed since this snapshot was swapped in
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }

    /// Whether the snapshot has reached `ttl` and should be regenerated
    pub fn is_due(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}
