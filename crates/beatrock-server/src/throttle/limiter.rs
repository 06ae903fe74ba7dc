use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use super::CallCategory;
use crate::cache::{SharedCacheClient, StoreReply};
use crate::clock::SharedClock;
use crate::metrics;

/// Lifetime of the shared last-call timestamp.
const TIMESTAMP_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct CategoryState {
    gate: tokio::sync::Mutex<()>,
    last_local_ms: AtomicU64,
}

/// Minimum spacing between outbound calls, per category, across processes.
///
/// Every caller claims a call slot from the shared tier in one atomic step,
/// so two processes never get the same slot. The last claimed slot lives in
/// the shared tier as epoch milliseconds. When the shared tier cannot answer,
/// the process-local slot keeps spacing calls made from this process.
/// Callers in one process queue on a per-category lock.
#[derive(Debug)]
pub struct RateLimiter {
    shared: SharedCacheClient,
    clock: SharedClock,
    min_interval: Duration,
    judgment: CategoryState,
    feedback: CategoryState,
}

impl RateLimiter {
    pub fn new(shared: SharedCacheClient, min_interval: Duration, clock: SharedClock) -> Self {
        Self {
            shared,
            clock,
            min_interval,
            judgment: CategoryState::default(),
            feedback: CategoryState::default(),
        }
    }

    /// Wait until a call in `category` is permitted and record it. Returns
    /// how long the caller was held back.
    pub async fn acquire(&self, category: CallCategory) -> Duration {
        let state = self.state(category);
        let _turn = state.gate.lock().await;
        let key = category.timestamp_key();

        let now = self.clock.epoch_millis();
        let local_last = state.last_local_ms.load(Ordering::Acquire);
        let earliest = if local_last == 0 {
            now
        } else {
            now.max(local_last + self.min_interval.as_millis() as u64)
        };

        let slot = match self
            .shared
            .reserve_slot(key, earliest, self.min_interval, TIMESTAMP_TTL)
            .await
        {
            StoreReply::Available(slot) => slot,
            StoreReply::Unavailable => {
                debug!(category = %category, "rate limiter using local timestamp only");
                earliest
            }
        };
        state.last_local_ms.store(slot, Ordering::Release);

        let now = self.clock.epoch_millis();
        if slot <= now {
            return Duration::ZERO;
        }
        let delay = Duration::from_millis(slot - now);
        debug!(category = %category, delay_ms = delay.as_millis() as u64, "rate limited");
        self.clock.sleep(delay).await;
        metrics::record_rate_limit_wait(category.as_str(), delay);
        delay
    }

    fn state(&self, category: CallCategory) -> &CategoryState {
        match category {
            CallCategory::Judgment => &self.judgment,
            CallCategory::Feedback => &self.feedback,
        }
    }
}
