// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! How the engine retries opening the plant session.
//!
//! Only the connect phase goes through a policy. A failed read or write
//! inside a cycle keeps the previous value and is tried again next cycle.

use std::time::Duration;

use crate::plant::error::PlantError;

/// Decides whether a failed connect attempt is repeated, and after how long.
///
/// `attempt` counts the attempts already made, starting at 1.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, attempt: u32, error: &PlantError) -> bool;

    /// Pause before retry number `retry` (0 for the first retry).
    fn delay(&self, retry: u32) -> Duration;

    fn max_attempts(&self) -> u32;

    /// Every pause the policy can produce, in order.
    fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts().saturating_sub(1))
            .map(|retry| self.delay(retry))
            .collect()
    }
}

/// Attempt budget shared by the policies that retry at all.
fn within_budget(attempt: u32, max_attempts: u32, error: &PlantError) -> bool {
    attempt < max_attempts && error.is_transient()
}

/// Doubling pause, capped at `max_delay`.
///
/// Fits a simulator that is still loading its scene when the controller
/// starts: early attempts come quickly, later ones back off.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn default_plant() -> Self {
        Self::new(3, Duration::from_millis(250), Duration::from_secs(2))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::default_plant()
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, error: &PlantError) -> bool {
        within_budget(attempt, self.max_attempts, error)
    }

    fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Same pause before every retry.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: u32, error: &PlantError) -> bool {
        within_budget(attempt, self.max_attempts, error)
    }

    fn delay(&self, _retry: u32) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// A single attempt; the first failure is final.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _attempt: u32, _error: &PlantError) -> bool {
        false
    }

    fn delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}
