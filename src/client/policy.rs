use crate::config::RetrySettings;
use crate::Error;
use std::time::Duration;

/// Decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Bounded retry with a linearly growing delay.
///
/// Retry `n` (1-based) waits `(n - 1) * delay_step`: 0s, 2s, 4s, 6s with the
/// defaults. After `max_retries` retries the last error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay_step: Duration::from_secs(settings.delay_step_secs),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay_step: Duration) -> Self {
        Self {
            max_retries,
            delay_step,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        self.delay_step.saturating_mul(retry.saturating_sub(1))
    }

    /// Decide what to do after a failure; `retry` counts this failure (1-based).
    pub fn decide(&self, err: &Error, retry: u32) -> Decision {
        if err.is_retryable() && retry <= self.max_retries {
            Decision::Retry {
                delay: self.delay_for(retry),
            }
        } else {
            Decision::Fail
        }
    }
}
