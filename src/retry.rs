// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded exponential backoff for the discovery stage.
//!
//! Address assignment is asynchronous relative to resource creation, so a
//! freshly restored VirtualMachineInstance may exist before its status
//! carries an address. That single condition is retried with exponential
//! backoff and jitter until a bounded time budget is exhausted. Nothing else
//! in the workflow retries.

use crate::constants::{
    BACKOFF_MULTIPLIER, DEFAULT_DISCOVERY_INITIAL_INTERVAL_MILLIS,
    DEFAULT_DISCOVERY_MAX_ELAPSED_SECS, DEFAULT_DISCOVERY_MAX_INTERVAL_SECS, RANDOMIZATION_FACTOR,
};
use rand::Rng;
use std::time::{Duration, Instant};

/// Tuning knobs for the discovery retry window.
///
/// Overridable from the run configuration; defaults come from
/// [`crate::constants`].
#[derive(Clone, Debug, PartialEq)]
pub struct RetryTuning {
    /// First interval between attempts
    pub initial_interval: Duration,
    /// Cap on the interval between attempts
    pub max_interval: Duration,
    /// Total time budget across all attempts
    pub max_elapsed: Duration,
}

impl Default for RetryTuning {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(DEFAULT_DISCOVERY_INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_secs(DEFAULT_DISCOVERY_MAX_INTERVAL_SECS),
            max_elapsed: Duration::from_secs(DEFAULT_DISCOVERY_MAX_ELAPSED_SECS),
        }
    }
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent
/// thundering herd across concurrently recovering targets.
pub struct ExponentialBackoff {
    /// Current interval duration
    current_interval: Duration,
    /// Maximum interval duration
    max_interval: Duration,
    /// Maximum total elapsed time
    max_elapsed_time: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    randomization_factor: f64,
    /// Start time for tracking total elapsed time
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(tuning: &RetryTuning, multiplier: f64, randomization_factor: f64) -> Self {
        Self {
            current_interval: tuning.initial_interval,
            max_interval: tuning.max_interval,
            max_elapsed_time: tuning.max_elapsed,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None once the time budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.start_time.elapsed() >= self.max_elapsed_time {
            return None;
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        // Exponential growth, capped at the max interval
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    /// Total time spent since the first attempt.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::rng();
        let jittered = rng.random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Create the backoff used while waiting for a VMI status address.
///
/// # Configuration
///
/// - **Initial interval**: 500ms (default)
/// - **Max interval**: 15 seconds (default)
/// - **Max elapsed time**: 2 minutes total (default)
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
///
/// With the defaults, retries occur at approximately 500ms, 1s, 2s, 4s, 8s,
/// 15s, then every 15s until the budget is exhausted.
#[must_use]
pub fn discovery_backoff(tuning: &RetryTuning) -> ExponentialBackoff {
    ExponentialBackoff::new(tuning, BACKOFF_MULTIPLIER, RANDOMIZATION_FACTOR)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
