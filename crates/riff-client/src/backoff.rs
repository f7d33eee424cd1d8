//! Reconnect backoff policy.

use std::time::Duration;

use rand::Rng;

/// Maximum number of reconnection attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Base delay between reconnection attempts.
pub const RECONNECT_STEP: Duration = Duration::from_secs(1);

/// Linear backoff with a hard attempt ceiling.
///
/// The delay before attempt `n` is `step * n`. Jitter, when enabled, adds less
/// than `step / 2`, so delays stay strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub step: Duration,
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            step: RECONNECT_STEP,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the 1-based `attempt`, or `None` once the budget is spent.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let base = self.step.saturating_mul(attempt);
        if !self.jitter {
            return Some(base);
        }

        let bound = (self.step / 2).as_millis() as u64;
        if bound == 0 {
            return Some(base);
        }
        let jitter = rand::rng().random_range(0..bound);
        Some(base + Duration::from_millis(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_without_jitter() {
        let policy = ReconnectPolicy {
            jitter: false,
            ..ReconnectPolicy::default()
        };
        let delays: Vec<_> = (1..=5).map(|n| policy.delay(n).unwrap()).collect();
        assert_eq!(
            delays,
            (1..=5).map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let policy = ReconnectPolicy::default();
        assert!(policy.delay(0).is_none());
        assert!(policy.delay(5).is_some());
        assert!(policy.delay(6).is_none());
    }

    #[test]
    fn test_jitter_keeps_delays_strictly_increasing() {
        let policy = ReconnectPolicy::default();
        for _ in 0..100 {
            let delays: Vec<_> = (1..=policy.max_attempts)
                .map(|n| policy.delay(n).unwrap())
                .collect();
            assert!(delays.windows(2).all(|w| w[0] < w[1]), "{delays:?}");
            for (n, delay) in delays.iter().enumerate() {
                let base = policy.step * (n as u32 + 1);
                assert!(*delay >= base && *delay < base + policy.step / 2);
            }
        }
    }
}
