//! Periodic removal of expired local entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Anything holding entries that can go stale.
pub trait Sweepable: Send + Sync {
    fn name(&self) -> &str;

    fn remove_expired(&self) -> usize;
}

pub struct Sweeper {
    targets: Vec<Arc<dyn Sweepable>>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(targets: Vec<Arc<dyn Sweepable>>, interval: Duration) -> Self {
        Self { targets, interval }
    }

    /// Sweep every target once; returns the total number of removed entries.
    pub fn sweep_once(&self) -> usize {
        let mut total = 0;
        for target in &self.targets {
            let removed = target.remove_expired();
            if removed > 0 {
                debug!(store = target.name(), removed, "local sweep");
            }
            total += removed;
        }
        total
    }

    /// Run the sweep in a background task, first tick one interval from now.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                stores = self.targets.len(),
                "local cache sweeper started"
            );

            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep_once();
                        if removed > 0 {
                            info!(removed, "removed expired local cache entries");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("local cache sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Owner handle for a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "local cache sweeper task failed");
        }
    }
}
