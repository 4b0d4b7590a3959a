//! Cache miss penalty calibration.
//!
//! A pre-flight check independent of the search. Each trial primes the whole
//! buffer, which evicts the victim, then times the victim twice: the first
//! touch misses and the second hits. The miss-minus-hit deltas tell whether
//! the host's timer can separate the two at all, and roughly by how much,
//! which is what `threshold` should be tuned against.
//!
//! **Verdict**:
//!
//! - `Discriminating`: misses are measurably slower than hits.
//! - `TimerTooCoarse`: most deltas quantize to zero.
//! - `Indistinguishable`: misses come out faster at least as often as slower.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::common::{EvictionError, LineAddr};
use crate::config::CalibrationConfig;
use crate::evictor::ProbeContext;
use crate::memory::AccessHook;
use crate::timing::{TimingOracle, Victim, time_touch};

/// Whether the timer separates cache misses from hits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationVerdict {
    /// Misses are consistently slower than hits.
    Discriminating,
    /// Too many deltas were exactly zero.
    TimerTooCoarse {
        /// Fraction of trials whose delta was zero.
        zero_fraction: f64,
    },
    /// Errors are at least as frequent as positive deltas.
    Indistinguishable,
}

impl CalibrationVerdict {
    /// Returns `true` if a search at this timer quality is expected to work.
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Discriminating)
    }
}

impl fmt::Display for CalibrationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discriminating => write!(f, "misses are distinguishable from hits"),
            Self::TimerTooCoarse { zero_fraction } => write!(
                f,
                "timer too coarse: {:.0}% of deltas are zero",
                zero_fraction * 100.0
            ),
            Self::Indistinguishable => {
                write!(f, "misses are not measurably slower than hits")
            }
        }
    }
}

/// Outcome of [`measure_cache_miss_penalty`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    /// Trials executed.
    pub try_count: u32,
    /// Sum of non-negative miss-minus-hit deltas.
    #[serde(with = "crate::common::nanos")]
    pub sum_speed_up: Duration,
    /// Mean non-negative delta.
    #[serde(with = "crate::common::nanos::option")]
    pub ave_speed_up: Option<Duration>,
    /// Trials with a non-negative delta (zero included).
    pub speed_up_count: u32,
    /// Trials where the miss was faster than the hit.
    pub error_count: u32,
    /// Trials whose delta was exactly zero.
    pub zero_count: u32,
    /// Every non-negative delta, in trial order.
    #[serde(with = "crate::common::nanos::seq")]
    pub speed_ups: Vec<Duration>,
    /// Summary judgement.
    pub verdict: CalibrationVerdict,
}

/// Derives the verdict from trial counts.
///
/// # Arguments
///
/// * `try_count` - Trials executed.
/// * `zero_count` - Trials with a zero delta.
/// * `positive_count` - Trials with a strictly positive delta.
/// * `error_count` - Trials where the miss was faster.
/// * `coarse_zero_fraction` - Zero fraction above which the timer is too coarse.
pub fn classify(
    try_count: u32,
    zero_count: u32,
    positive_count: u32,
    error_count: u32,
    coarse_zero_fraction: f64,
) -> CalibrationVerdict {
    if try_count == 0 {
        return CalibrationVerdict::Indistinguishable;
    }
    let zero_fraction = f64::from(zero_count) / f64::from(try_count);
    if zero_fraction > coarse_zero_fraction {
        CalibrationVerdict::TimerTooCoarse { zero_fraction }
    } else if error_count >= positive_count {
        CalibrationVerdict::Indistinguishable
    } else {
        CalibrationVerdict::Discriminating
    }
}

/// Measures the victim's miss-versus-hit latency gap.
///
/// Reinitializes the buffer to the full ascending cycle first.
///
/// # Arguments
///
/// * `ctx` - Buffer, clock, victim and randomness.
/// * `config` - Trial count and verdict bound.
///
/// # Errors
///
/// [`EvictionError::InvalidParameter`] for zero fuel, before the buffer is
/// touched; [`EvictionError::InvariantViolation`] if a priming walk fails.
pub fn measure_cache_miss_penalty<H, T, V, R>(
    ctx: &mut ProbeContext<'_, H, T, V, R>,
    config: &CalibrationConfig,
) -> Result<CalibrationResult, EvictionError>
where
    H: AccessHook,
    T: TimingOracle,
    V: Victim,
    R: Rng,
{
    if config.fuel == 0 {
        return Err(EvictionError::invalid_parameter("fuel", "must be positive"));
    }
    info!(fuel = config.fuel, "measuring cache miss penalty");
    ctx.buffer.initialize();
    let line_count = ctx.buffer.line_count();
    let stride = ctx.buffer.line_size();

    let mut speed_ups = Vec::with_capacity(config.fuel as usize);
    let mut sum = Duration::ZERO;
    let mut zero_count = 0;
    let mut error_count = 0;
    for _ in 0..config.fuel {
        let index = ctx.rng.gen_range(0..line_count) as u32;
        let _ = ctx.buffer.walk_cycle(LineAddr::new(index * stride))?;
        let miss = time_touch(ctx.clock, ctx.victim);
        let hit = time_touch(ctx.clock, ctx.victim);
        match miss.checked_sub(hit) {
            Some(delta) => {
                if delta.is_zero() {
                    zero_count += 1;
                }
                sum = sum.saturating_add(delta);
                speed_ups.push(delta);
            }
            None => error_count += 1,
        }
    }

    let speed_up_count = speed_ups.len() as u32;
    let verdict = classify(
        config.fuel,
        zero_count,
        speed_up_count - zero_count,
        error_count,
        config.coarse_zero_fraction,
    );
    if verdict.is_usable() {
        info!(%verdict, speed_up_count, error_count, "calibration finished");
    } else {
        warn!(%verdict, speed_up_count, error_count, zero_count, "calibration finished");
    }

    Ok(CalibrationResult {
        try_count: config.fuel,
        sum_speed_up: sum,
        ave_speed_up: (speed_up_count > 0).then(|| sum / speed_up_count),
        speed_up_count,
        error_count,
        zero_count,
        speed_ups,
        verdict,
    })
}
