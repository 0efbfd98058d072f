//! Reconnect delay policy

use std::time::Duration;

/// Exponential backoff with ±25% jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(
            self.max,
            Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier),
        );
        let jitter = rand::random::<f64>() * 0.5 - 0.25;
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
    }

    /// Back to the initial delay (after a successful connect)
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_backoff() -> ExponentialBackoff {
        ExponentialBackoff::new(Duration::from_millis(5000), Duration::from_millis(30000), 2.0)
    }

    #[test]
    fn test_delays_double_within_jitter() {
        let mut backoff = make_backoff();

        let first = backoff.next_delay().as_millis();
        assert!((3750..=6250).contains(&first), "first delay {first}");

        let second = backoff.next_delay().as_millis();
        assert!((7500..=12500).contains(&second), "second delay {second}");
    }

    #[test]
    fn test_delay_caps_at_max() {
        let mut backoff = make_backoff();
        for _ in 0..10 {
            backoff.next_delay();
        }
        // 30s cap plus 25% jitter
        assert!(backoff.next_delay().as_millis() <= 37500);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = make_backoff();
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        let delay = backoff.next_delay().as_millis();
        assert!((3750..=6250).contains(&delay), "delay after reset {delay}");
    }
}
