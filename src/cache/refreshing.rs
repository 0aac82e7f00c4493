//! The refreshing cache
//!
//! Holds the current [`Snapshot`] behind a read/write lock and owns the
//! background refresher that regenerates it once it reaches its TTL.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{CacheConfig, Snapshot};
use crate::error::{CacheError, Result};
use crate::generator::Generator;
use crate::refresh::RefreshHandle;

/// Point-in-time statistics for a cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of configured keys
    pub keys: usize,
    /// Generation of the current snapshot
    pub generation: u64,
    /// Successful refresh passes since construction
    pub refreshes: u64,
    /// Refresh passes abandoned because a key failed or timed out
    pub failed_refreshes: u64,
    /// When the current snapshot was swapped in
    pub last_update: DateTime<Utc>,
    /// Age of the current snapshot in milliseconds
    pub age_ms: u64,
    /// Whether the refresher has been stopped
    pub stopped: bool,
}

/// State shared between the cache handle and its refresher task
pub(crate) struct Shared<V> {
    keys: Vec<String>,
    pub(crate) config: CacheConfig,
    generator: Arc<dyn Generator<Value = V>>,
    current: RwLock<Arc<Snapshot<V>>>,
    stopped: AtomicBool,
    /// Number of reload passes started; each pass takes the next number
    passes_started: AtomicU64,
    /// Number of the newest pass swapped in, only written under the write lock
    newest_swapped: AtomicU64,
    refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> Shared<V> {
    pub(crate) fn current(&self) -> Arc<Snapshot<V>> {
        Arc::clone(&*self.current.read())
    }

    /// Regenerates every key and swaps the result in
    ///
    /// On failure the current snapshot stays in place. A pass that completes
    /// after the cache was stopped is discarded, as is a pass that finishes
    /// after a later-started pass was already swapped in.
    pub(crate) async fn reload(&self) -> Result<Arc<Snapshot<V>>> {
        let started = Instant::now();
        let pass = self.passes_started.fetch_add(1, Ordering::Relaxed) + 1;
        let entries = match load_entries(&self.keys, self.generator.as_ref(), &self.config).await {
            Ok(entries) => entries,
            Err(err) => {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };

        let snapshot = {
            let mut current = self.current.write();
            if self.stopped.load(Ordering::Acquire) {
                return Err(CacheError::Stopped);
            }
            if self.newest_swapped.load(Ordering::Relaxed) > pass {
                debug!(pass, "newer pass already swapped in, discarding");
                return Ok(Arc::clone(&*current));
            }
            self.newest_swapped.store(pass, Ordering::Relaxed);
            let next = Arc::new(Snapshot::new(entries, current.generation() + 1));
            *current = Arc::clone(&next);
            next
        };
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        debug!(
            generation = snapshot.generation(),
            keys = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "swapped in refreshed snapshot"
        );
        Ok(snapshot)
    }
}

/// Generates a value for every key, concurrently, failing on the first error
async fn load_entries<V>(
    keys: &[String],
    generator: &dyn Generator<Value = V>,
    config: &CacheConfig,
) -> Result<HashMap<String, V>>
where
    V: Clone + Send + Sync + 'static,
{
    let pending = keys
        .iter()
        .map(|key| generate_one(key, generator, config.generate_timeout));
    let values = try_join_all(pending).await?;
    Ok(keys.iter().cloned().zip(values).collect())
}

async fn generate_one<V>(
    key: &str,
    generator: &dyn Generator<Value = V>,
    timeout: Option<Duration>,
) -> Result<V>
where
    V: Clone + Send + Sync + 'static,
{
    let pending = generator.generate(key);
    let generated = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, pending)
            .await
            .map_err(|_| CacheError::Timeout {
                key: key.to_string(),
                timeout,
            })?,
        None => pending.await,
    };
    generated.map_err(|source| CacheError::Generation {
        key: key.to_string(),
        source,
    })
}

/// In-memory cache over a fixed key set, regenerated in the background
///
/// Reads never wait for regeneration: they see the previous snapshot until the
/// refresher swaps a complete new one in.
pub struct RefreshingCache<V> {
    shared: Arc<Shared<V>>,
    refresher: Mutex<Option<RefreshHandle>>,
}

impl<V: Clone + Send + Sync + 'static> RefreshingCache<V> {
    /// Loads every key once and starts the background refresher
    ///
    /// Must be called from within a tokio runtime. Duplicate keys are collapsed.
    ///
    /// # Returns
    /// * `Ok(RefreshingCache)` with every key populated
    /// * `Err(CacheError)` if the configuration is invalid or any key failed to generate
    pub async fn new<I, K, G>(keys: I, config: CacheConfig, generator: G) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        G: Generator<Value = V> + 'static,
    {
        config.validate()?;

        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|key| seen.insert(key.clone()))
            .collect();

        let generator: Arc<dyn Generator<Value = V>> = Arc::new(generator);
        let entries = load_entries(&keys, generator.as_ref(), &config).await?;

        let shared = Arc::new(Shared {
            keys,
            config,
            generator,
            current: RwLock::new(Arc::new(Snapshot::new(entries, 1))),
            stopped: AtomicBool::new(false),
            passes_started: AtomicU64::new(0),
            newest_swapped: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
        });
        info!(
            keys = shared.keys.len(),
            ttl_ms = shared.config.ttl.as_millis() as u64,
            "cache loaded"
        );

        let refresher = RefreshHandle::spawn(Arc::clone(&shared));
        Ok(Self {
            shared,
            refresher: Mutex::new(Some(refresher)),
        })
    }

    /// Returns the current value for `key`, or `None` if the key is not configured
    pub fn get(&self, key: &str) -> Option<V> {
        self.shared.current.read().get(key).cloned()
    }

    /// Returns the current snapshot, for reads that must span a single pass
    pub fn snapshot(&self) -> Arc<Snapshot<V>> {
        self.shared.current()
    }

    /// When the current snapshot was swapped in
    pub fn last_update(&self) -> DateTime<Utc> {
        self.shared.current.read().updated_at()
    }

    /// Generation of the current snapshot, 1 after construction
    pub fn generation(&self) -> u64 {
        self.shared.current.read().generation()
    }

    /// Configured keys, in construction order
    pub fn keys(&self) -> &[String] {
        &self.shared.keys
    }

    /// Configuration the cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    /// Regenerates every key now, regardless of the snapshot's age
    ///
    /// # Returns
    /// * `Ok(Snapshot)` the snapshot that was swapped in
    /// * `Err(CacheError::Stopped)` once [`stop`](Self::stop) has been called
    /// * `Err(CacheError)` if a key failed; the previous snapshot is kept
    ///
    /// When this overlaps a background pass, a pass that started later and
    /// already swapped in wins; this call then returns that newer snapshot.
    pub async fn refresh(&self) -> Result<Arc<Snapshot<V>>> {
        if self.is_stopped() {
            return Err(CacheError::Stopped);
        }
        self.shared.reload().await
    }

    /// Stops the background refresher and waits for it to exit
    ///
    /// No snapshot is swapped in after this returns; reads keep returning the
    /// last one. Calling it again is a no-op.
    pub async fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        let refresher = self.refresher.lock().take();
        if let Some(refresher) = refresher {
            refresher.shutdown().await;
            info!(generation = self.generation(), "cache stopped");
        }
    }

    /// Whether [`stop`](Self::stop) has been called
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Counters and timestamps describing the current snapshot
    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        CacheStats {
            keys: self.shared.keys.len(),
            generation: snapshot.generation(),
            refreshes: self.shared.refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.shared.failed_refreshes.load(Ordering::Relaxed),
            last_update: snapshot.updated_at(),
            age_ms: snapshot.age().as_millis() as u64,
            stopped: self.is_stopped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FnGenerator, GenerateError, RandomStringGenerator};
    use std::sync::atomic::AtomicUsize;

    /// Tags each value with the pass it was generated in
    struct TaggingGenerator {
        calls: AtomicUsize,
        keys: usize,
    }

    #[async_trait::async_trait]
    impl Generator for TaggingGenerator {
        type Value = usize;

        async fn generate(&self, _key: &str) -> std::result::Result<usize, GenerateError> {
            Ok(self.calls.fetch_add(1, Ordering::SeqCst) / self.keys)
        }
    }

    fn keys() -> Vec<&'static str> {
        vec!["apple", "orange", "banana"]
    }

    #[tokio::test]
    async fn test_new_populates_every_key() {
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), RandomStringGenerator::new())
            .await
            .unwrap();

        for key in keys() {
            let value = cache.get(key).expect("configured key should be present");
            assert_eq!(value.len(), 10);
        }
        assert_eq!(cache.generation(), 1);
        assert_eq!(cache.keys(), &["apple", "orange", "banana"]);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_get_unknown_key_returns_none() {
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), RandomStringGenerator::new())
            .await
            .unwrap();
        assert!(cache.get("cherry").is_none());
        assert!(cache.get("").is_none());
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_collapsed() {
        let cache = RefreshingCache::new(
            ["a", "b", "a"],
            CacheConfig::default(),
            RandomStringGenerator::new(),
        )
        .await
        .unwrap();
        assert_eq!(cache.keys(), &["a", "b"]);
        assert_eq!(cache.snapshot().len(), 2);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_empty_key_set_is_allowed() {
        let cache = RefreshingCache::new(
            Vec::<String>::new(),
            CacheConfig::default(),
            RandomStringGenerator::new(),
        )
        .await
        .unwrap();
        assert!(cache.snapshot().is_empty());
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_new_rejects_zero_ttl() {
        let result = RefreshingCache::new(
            keys(),
            CacheConfig::default().with_ttl(Duration::ZERO),
            RandomStringGenerator::new(),
        )
        .await;
        assert!(matches!(result, Err(CacheError::InvalidTtl)));
    }

    #[tokio::test]
    async fn test_new_fails_when_a_key_fails() {
        let generator = FnGenerator::new(|key: &str| {
            if key == "orange" {
                Err(GenerateError::Failed("no oranges".into()))
            } else {
                Ok(key.to_string())
            }
        });
        let result = RefreshingCache::new(keys(), CacheConfig::default(), generator).await;
        match result {
            Err(CacheError::Generation { key, .. }) => assert_eq!(key, "orange"),
            other => panic!("expected generation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_refresh_swaps_whole_snapshot() {
        let generator = TaggingGenerator {
            calls: AtomicUsize::new(0),
            keys: 3,
        };
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), generator)
            .await
            .unwrap();
        assert!(keys().iter().all(|k| cache.get(k) == Some(0)));

        let snapshot = cache.refresh().await.unwrap();
        assert_eq!(snapshot.generation(), 2);
        assert!(snapshot.iter().all(|(_, pass)| *pass == 1));
        assert!(keys().iter().all(|k| cache.get(k) == Some(1)));
        assert_eq!(cache.stats().refreshes, 1);
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_held_snapshot_survives_refresh() {
        let generator = TaggingGenerator {
            calls: AtomicUsize::new(0),
            keys: 3,
        };
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), generator)
            .await
            .unwrap();
        let before = cache.snapshot();
        cache.refresh().await.unwrap();

        assert_eq!(before.generation(), 1);
        assert_eq!(before.get("apple"), Some(&0));
        assert_eq!(cache.get("apple"), Some(1));
        cache.stop().await;
    }

    #[tokio::test]
    async fn test_refresh_after_stop_is_rejected() {
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), RandomStringGenerator::new())
            .await
            .unwrap();
        cache.stop().await;

        assert!(cache.is_stopped());
        assert!(matches!(cache.refresh().await, Err(CacheError::Stopped)));
        assert!(cache.get("apple").is_some());
    }

    #[tokio::test]
    async fn test_stop_twice_is_harmless() {
        let cache = RefreshingCache::new(keys(), CacheConfig::default(), RandomStringGenerator::new())
            .await
            .unwrap();
        cache.stop().await;
        cache.stop().await;
        assert!(cache.stats().stopped);
    }
}
