//! Throttling for calls to the external judge.
//!
//! [`RateLimiter`] spaces calls per category, [`Backoff`] tracks the retry
//! delay per category and [`RetryPlan`] counts attempts for one logical
//! call. [`CallGate`] combines the three.

pub mod backoff;
pub mod limiter;
pub mod retry;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, warn};

pub use backoff::Backoff;
pub use limiter::RateLimiter;
pub use retry::{RetryPlan, RetryStep};

use crate::cache::SharedCacheClient;
use crate::clock::SharedClock;
use crate::config::RateLimitConfig;
use crate::metrics;

/// Kind of outbound call. Each kind has its own spacing and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallCategory {
    Judgment,
    Feedback,
}

impl CallCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CallCategory::Judgment => "judgment",
            CallCategory::Feedback => "feedback",
        }
    }

    /// Shared key holding the last permitted call time.
    pub fn timestamp_key(self) -> &'static str {
        match self {
            CallCategory::Judgment => "ai_request:last_time",
            CallCategory::Feedback => "ai_feedback_request:last_time",
        }
    }
}

impl fmt::Display for CallCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limiting plus retry with per-category backoff.
#[derive(Debug)]
pub struct CallGate {
    limiter: RateLimiter,
    judgment_backoff: Mutex<Backoff>,
    feedback_backoff: Mutex<Backoff>,
    max_attempts: u32,
    clock: SharedClock,
}

impl CallGate {
    pub fn new(shared: SharedCacheClient, config: &RateLimitConfig, clock: SharedClock) -> Self {
        let backoff = Backoff::new(config.backoff_floor(), config.backoff_ceiling());
        Self {
            limiter: RateLimiter::new(shared, config.min_interval(), clock.clone()),
            judgment_backoff: Mutex::new(backoff.clone()),
            feedback_backoff: Mutex::new(backoff),
            max_attempts: config.max_attempts,
            clock,
        }
    }

    /// Wait for a rate-limit slot, then run `call` until it succeeds or the
    /// attempts are used up. `None` means every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, category: CallCategory, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.limiter.acquire(category).await;
        let mut plan = RetryPlan::new(self.max_attempts);

        loop {
            let started = self.clock.now();
            let result = call().await;
            let elapsed = self.clock.now().saturating_duration_since(started);

            let e = match result {
                Ok(value) => {
                    metrics::record_external_call(category.as_str(), true, elapsed);
                    self.backoff(category).lock().reset();
                    return Some(value);
                }
                Err(e) => e,
            };

            metrics::record_external_call(category.as_str(), false, elapsed);
            let step = plan.on_failure(&mut self.backoff(category).lock());
            match step {
                RetryStep::Wait(delay) => {
                    warn!(
                        category = %category,
                        attempt = plan.attempt() - 1,
                        max_attempts = plan.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "judge call failed, retrying"
                    );
                    self.clock.sleep(delay).await;
                }
                RetryStep::GiveUp => {
                    error!(
                        category = %category,
                        attempts = plan.max_attempts(),
                        error = %e,
                        "judge call failed after all attempts, using default"
                    );
                    return None;
                }
            }
        }
    }

    /// Delay the next failure in `category` would wait.
    pub fn current_backoff(&self, category: CallCategory) -> Duration {
        self.backoff(category).lock().current()
    }

    fn backoff(&self, category: CallCategory) -> &Mutex<Backoff> {
        match category {
            CallCategory::Judgment => &self.judgment_backoff,
            CallCategory::Feedback => &self.feedback_backoff,
        }
    }
}
