//! Per-step retry policy

use std::time::Duration;

use rand::Rng;

/// Backoff shape between attempts
#[derive(Clone, Debug)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed {
        /// Delay between attempts (milliseconds)
        delay_millis: u64,
    },
    /// Exponentially growing delay, capped
    Exponential {
        /// Initial delay before first retry (milliseconds)
        initial_delay_millis: u64,
        /// Maximum delay cap (milliseconds)
        max_delay_millis: u64,
        /// Backoff multiplier
        multiplier: f64,
    },
}

/// Decision returned by [`RetryPolicy::decide`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the step should be attempted again
    pub retry: bool,
    /// Scheduled wait before the next attempt
    pub delay: Duration,
}

impl RetryDecision {
    /// Terminal decision: the retry budget is exhausted
    pub fn exhausted() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Retry policy for one step.
///
/// A pure function of attempt number and configuration; error content is
/// not inspected here (see [`crate::StepError`] for the fatal escape
/// hatch). `max_attempts = 1` means no retry.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first attempt
    pub max_attempts: u32,
    /// Delay shape between attempts
    pub backoff: Backoff,
    /// Upper bound for uniform random jitter added to each delay (milliseconds)
    pub jitter_millis: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial_delay_millis: 1000,
                max_delay_millis: 30000,
                multiplier: 2.0,
            },
            jitter_millis: 0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed { delay_millis: 0 },
            jitter_millis: 0,
        }
    }

    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed {
                delay_millis: delay.as_millis() as u64,
            },
            jitter_millis: 0,
        }
    }

    /// Exponential-backoff policy
    pub fn exponential(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential {
                initial_delay_millis: initial_delay.as_millis() as u64,
                max_delay_millis: 30000,
                multiplier,
            },
            jitter_millis: 0,
        }
    }

    /// Add a uniform random jitter bound to every computed delay
    pub fn with_jitter(mut self, bound: Duration) -> Self {
        self.jitter_millis = bound.as_millis() as u64;
        self
    }

    /// Cap the exponential delay (no effect on fixed backoff)
    pub fn with_max_delay(mut self, cap: Duration) -> Self {
        if let Backoff::Exponential {
            ref mut max_delay_millis,
            ..
        } = self.backoff
        {
            *max_delay_millis = cap.as_millis() as u64;
        }
        self
    }

    /// Decide whether to retry after `attempt` failed attempts (1-indexed).
    ///
    /// Exhaustion is reached when `attempt >= max_attempts`.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::exhausted();
        }
        let mut delay = self.delay_for_attempt(attempt);
        if self.jitter_millis > 0 {
            delay += Duration::from_millis(rand::rng().random_range(0..=self.jitter_millis));
        }
        RetryDecision { retry: true, delay }
    }

    /// Calculate the base delay after a given failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        match self.backoff {
            Backoff::Fixed { delay_millis } => Duration::from_millis(delay_millis),
            Backoff::Exponential {
                initial_delay_millis,
                max_delay_millis,
                multiplier,
            } => {
                let delay = initial_delay_millis as f64
                    * multiplier.powi(attempt.saturating_sub(1) as i32);
                let capped = delay.min(max_delay_millis as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        // Would keep doubling but capped at max
        assert!(policy.delay_for_attempt(10) <= Duration::from_millis(30000));
    }

    #[test]
    fn test_exhaustion_boundary() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10));

        assert!(policy.decide(1).retry);
        assert!(policy.decide(2).retry);
        assert_eq!(policy.decide(3), RetryDecision::exhausted());
        assert_eq!(policy.decide(4), RetryDecision::exhausted());
    }

    #[test]
    fn test_single_attempt_never_retries() {
        assert!(!RetryPolicy::none().decide(1).retry);
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy =
            RetryPolicy::fixed(5, Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        for _ in 0..32 {
            let decision = policy.decide(1);
            assert!(decision.delay >= Duration::from_millis(100));
            assert!(decision.delay <= Duration::from_millis(150));
        }
    }
}
