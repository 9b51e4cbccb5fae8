//! Exponential backoff.

use std::time::Duration;

/// Doubling delay with a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Starts at `initial`, never exceeds `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Returns the current delay and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

/// Delay before the `attempt`th retry (1-based): `base * 2^(attempt-1)`, capped.
#[must_use]
pub fn delay_for_attempt(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(1));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![250, 500, 1000, 1000, 1000]);
    }

    #[test]
    fn test_delay_for_attempt() {
        let base = Duration::from_millis(500);
        let max = Duration::from_secs(8);
        assert_eq!(delay_for_attempt(base, max, 1), Duration::from_millis(500));
        assert_eq!(delay_for_attempt(base, max, 3), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(base, max, 10), max);
        assert_eq!(delay_for_attempt(base, max, u32::MAX), max);
    }
}
