// SPDX-License-Identifier: AGPL-3.0
// Gosh Transfer Queue - Remaining time estimation
//
// Speed samples are smoothed with an exponential moving average so the
// displayed ETA does not jump on every progress callback.

use std::time::Duration;

/// Default weight of the newest speed sample
pub const DEFAULT_SMOOTHING: f64 = 0.3;

/// Per-transfer ETA estimator
#[derive(Debug, Clone)]
pub struct RemainingTimeEstimator {
    smoothed_speed: f64,
    smoothing: f64,
}

impl RemainingTimeEstimator {
    /// Create an estimator seeded with the first observed speed.
    ///
    /// `smoothing` is clamped into `(0, 1]`; 1 disables smoothing.
    pub fn new(speed: u64, smoothing: f64) -> Self {
        let smoothing = if smoothing.is_finite() && smoothing > 0.0 {
            smoothing.min(1.0)
        } else {
            DEFAULT_SMOOTHING
        };

        Self {
            smoothed_speed: speed as f64,
            smoothing,
        }
    }

    /// Feed a new speed sample and estimate the time left for `remaining_bytes`.
    ///
    /// Returns `None` while no throughput has been observed.
    pub fn estimate(&mut self, speed: u64, remaining_bytes: u64) -> Option<Duration> {
        self.smoothed_speed =
            self.smoothing * speed as f64 + (1.0 - self.smoothing) * self.smoothed_speed;

        if remaining_bytes == 0 {
            return Some(Duration::ZERO);
        }
        if self.smoothed_speed < 1.0 {
            return None;
        }

        Some(Duration::from_secs_f64(
            (remaining_bytes as f64 / self.smoothed_speed).ceil(),
        ))
    }

    /// Current smoothed speed in bytes per second
    pub fn smoothed_speed(&self) -> u64 {
        self.smoothed_speed.round() as u64
    }
}
