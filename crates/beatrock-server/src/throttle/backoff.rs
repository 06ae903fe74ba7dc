use std::time::Duration;

/// Exponential backoff delay for one call category.
///
/// Starts at the floor, doubles on every failure up to the ceiling, and goes
/// back to the floor on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to wait after the failure just observed. The following call
    /// returns at least double this value, capped at the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        delay
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_then_caps_then_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    proptest! {
        #[test]
        fn each_delay_at_least_doubles_until_capped(
            floor_ms in 1u64..5_000,
            ceiling_ms in 1u64..120_000,
            steps in 1usize..40,
        ) {
            let floor = Duration::from_millis(floor_ms);
            let ceiling = Duration::from_millis(ceiling_ms).max(floor);
            let mut backoff = Backoff::new(floor, ceiling);
            let mut previous = backoff.next_delay();
            prop_assert_eq!(previous, floor);
            for _ in 0..steps {
                let next = backoff.next_delay();
                prop_assert!(next <= ceiling);
                prop_assert!(next == ceiling || next >= previous * 2);
                previous = next;
            }
        }
    }
}
