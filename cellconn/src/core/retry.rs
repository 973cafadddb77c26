//! Reconnect retry budget.

use std::time::Duration;

use crate::api::config::RetryPolicy;

/// Counts reconnect attempts against a [`RetryPolicy`].
///
/// Owned by the `Reconnecting` state and reset to zero whenever the
/// manager reaches `Connected`.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryBudget {
    /// Creates a budget with no attempts claimed.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Claims the next attempt.
    ///
    /// Returns the delay to wait before running it, or `None` once the
    /// budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.policy.delay_for(self.attempts))
    }

    /// Attempts claimed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns `true` once every attempt of the policy has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Returns the full budget, as on reaching `Connected`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
