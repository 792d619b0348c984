use std::time::Duration;

/// Decision returned by the retry policy for a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back at the tail of the queue after waiting this long.
    Requeue(Duration),
    /// Resolve the task without downloading it.
    GiveUp,
}

/// Policy for transient failures.
///
/// The default requeues forever with no delay: a permanently broken file keeps
/// cycling through the pool until the run is interrupted. A bound with
/// exponential backoff can be configured through `[retry]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first); `None` = unbounded.
    pub max_attempts: Option<u32>,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Requeue forever, immediately.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            base_delay,
            max_delay,
        }
    }

    /// Decide what to do after the `attempt`-th transient failure (1-based).
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return RetryDecision::GiveUp;
            }
        }
        // base * 2^(attempt-1), capped at max_delay; overflow means the cap.
        let delay = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay));
        RetryDecision::Requeue(delay)
    }
}
