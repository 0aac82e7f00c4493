//! Background snapshot refresh
//!
//! Runs one tokio task per cache that wakes every `ttl / 2`, regenerates the
//! snapshot once it is due, and exits when signalled through a watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::cache::Shared;
use crate::error::CacheError;

/// Handle for controlling a cache's background refresher
pub(crate) struct RefreshHandle {
    /// Set to `true` to request shutdown; dropping it also stops the task
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Spawns the refresher task for `shared`
    pub(crate) fn spawn<V>(shared: Arc<Shared<V>>) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(shared, shutdown_rx));
        Self { shutdown_tx, task }
    }

    /// Signals the task to stop and waits for it to exit
    pub(crate) async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "refresher task did not exit cleanly");
        }
    }
}

async fn run<V>(shared: Arc<Shared<V>>, mut shutdown_rx: watch::Receiver<bool>)
where
    V: Clone + Send + Sync + 'static,
{
    let ttl = shared.config.ttl;
    let mut interval = tokio::time::interval(shared.config.check_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first tick (immediate)
    interval.tick().await;

    info!(
        check_interval_ms = shared.config.check_interval().as_millis() as u64,
        "refresher started"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                // An error means the cache handle was dropped
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let current = shared.current();
                if !current.is_due(ttl) {
                    trace!(age_ms = current.age().as_millis() as u64, "snapshot still fresh");
                    continue;
                }
                drop(current);

                // A stop request abandons the pass in flight; the swap has no
                // await point, so dropping the pass never leaves a partial store.
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        debug!("stop requested, abandoning refresh in flight");
                        break;
                    }
                    result = shared.reload() => match result {
                        Ok(_) => {}
                        Err(CacheError::Stopped) => {
                            debug!("discarded refresh finished after stop");
                        }
                        Err(err) => {
                            warn!(error = %err, "refresh failed, keeping previous snapshot");
                        }
                    },
                }
            }
        }
    }

    debug!("refresher exited");
}
