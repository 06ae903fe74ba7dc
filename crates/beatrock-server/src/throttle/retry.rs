use std::time::Duration;

use super::backoff::Backoff;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Sleep for the delay, then make the next attempt.
    Wait(Duration),
    /// Attempts are exhausted; resolve to the default.
    GiveUp,
}

/// Attempt counter for one logical call.
#[derive(Debug, Clone)]
pub struct RetryPlan {
    attempt: u32,
    max_attempts: u32,
}

impl RetryPlan {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The attempt about to run, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record a failure. The backoff grows either way; the last failure
    /// gives up without a wait.
    pub fn on_failure(&mut self, backoff: &mut Backoff) -> RetryStep {
        let delay = backoff.next_delay();
        if self.attempt >= self.max_attempts {
            return RetryStep::GiveUp;
        }
        self.attempt += 1;
        RetryStep::Wait(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_attempts_wait_twice() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let mut plan = RetryPlan::new(3);

        assert_eq!(plan.attempt(), 1);
        assert_eq!(plan.on_failure(&mut backoff), RetryStep::Wait(Duration::from_secs(1)));
        assert_eq!(plan.attempt(), 2);
        assert_eq!(plan.on_failure(&mut backoff), RetryStep::Wait(Duration::from_secs(2)));
        assert_eq!(plan.attempt(), 3);
        assert_eq!(plan.on_failure(&mut backoff), RetryStep::GiveUp);

        // The category stays backed off for the next logical call.
        assert_eq!(backoff.current(), Duration::from_secs(8));
    }

    #[test]
    fn single_attempt_gives_up_immediately() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let mut plan = RetryPlan::new(0);
        assert_eq!(plan.max_attempts(), 1);
        assert_eq!(plan.on_failure(&mut backoff), RetryStep::GiveUp);
    }
}
