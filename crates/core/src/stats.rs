//! Speed-up statistics.
//!
//! This module aggregates the timing evidence of one evictor invocation. It provides:
//! 1. **Accepted Trials:** Running sum, count and mean of accepted speed-ups.
//! 2. **Rejected Trials:** A separate rejection counter.
//! 3. **Extremes:** Largest accepted speed-up, for quick reporting.
//!
//! An aggregator is owned by exactly one invocation and never shared across
//! phases; the refiner and the caller only read it.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Running statistics over accepted and rejected trials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpeedUpStats {
    /// Sum of accepted speed-ups.
    #[serde(with = "crate::common::nanos")]
    pub sum: Duration,
    /// Number of accepted trials.
    pub accepted: u32,
    /// Number of rejected trials.
    pub rejected: u32,
    /// Largest accepted speed-up.
    #[serde(with = "crate::common::nanos")]
    pub max: Duration,
}

impl SpeedUpStats {
    /// Records an accepted trial.
    ///
    /// # Arguments
    ///
    /// * `speed_up` - Measured speed-up of the accepted candidate.
    pub fn record_accept(&mut self, speed_up: Duration) {
        self.sum = self.sum.saturating_add(speed_up);
        self.accepted += 1;
        self.max = self.max.max(speed_up);
    }

    /// Records a rejected trial.
    pub fn record_reject(&mut self) {
        self.rejected += 1;
    }

    /// Mean accepted speed-up, or `None` before the first acceptance.
    pub fn mean(&self) -> Option<Duration> {
        (self.accepted > 0).then(|| self.sum / self.accepted)
    }

    /// Total trials recorded.
    pub const fn trials(&self) -> u32 {
        self.accepted + self.rejected
    }

    /// Fraction of trials that were accepted, or `None` before the first trial.
    pub fn acceptance_rate(&self) -> Option<f64> {
        let trials = self.trials();
        (trials > 0).then(|| f64::from(self.accepted) / f64::from(trials))
    }
}

impl fmt::Display for SpeedUpStats {
    /// Formats a one-line summary with the mean in nanoseconds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean_ns = self.mean().map_or(0, |m| m.as_nanos());
        write!(
            f,
            "accepted={} rejected={} sum={}ns mean={}ns max={}ns",
            self.accepted,
            self.rejected,
            self.sum.as_nanos(),
            mean_ns,
            self.max.as_nanos()
        )
    }
}
