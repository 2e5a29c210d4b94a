// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry timing with exponential backoff and jitter.

use std::time::Duration;

/// Retry policy for transient adapter failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first (default 3).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 25% to each delay to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Fast retries for tests.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Delay before attempt `attempt` (1-based; the first attempt has no
    /// delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 2);
        let capped = base.min(self.max_delay.as_millis() as f64);
        let final_delay = if self.jitter { capped * (1.0 + nano_jitter() * 0.25) } else { capped };
        Duration::from_millis(final_delay as u64)
    }
}

/// Pseudo-random jitter in [0, 1) from the clock's sub-second noise.
fn nano_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
