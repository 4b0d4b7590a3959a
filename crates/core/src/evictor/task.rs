//! Resumable evictor state.
//!
//! An [`EvictorTask`] owns the pool, budget and running results of one evictor
//! invocation. Each [`step`](EvictorTask::step) is one complete trial: every
//! splice-out is matched by its splice-in (or permanent removal) before the
//! step returns, so a task can be paused between any two steps.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, trace};

use super::{EvictionSetEntry, EvictorOutcome, ProbeContext, Trial};
use crate::common::{EvictionError, InvariantViolation};
use crate::memory::{AccessHook, CandidatePool};
use crate::stats::SpeedUpStats;
use crate::timing::{TimingOracle, Victim, time_touch};

/// Below this many candidates no distinct start address can be drawn.
const MIN_POOL: usize = 2;

/// One evictor invocation, advanced a trial at a time.
#[derive(Clone, Debug)]
pub struct EvictorTask {
    pool: CandidatePool,
    fuel: u32,
    threshold: Duration,
    tries: u32,
    eviction_set: Vec<EvictionSetEntry>,
    stats: SpeedUpStats,
}

impl EvictorTask {
    /// Creates a task over `pool`.
    ///
    /// # Arguments
    ///
    /// * `pool` - Candidates, identical to the buffer's active cycle.
    /// * `fuel` - Maximum number of trials.
    /// * `threshold` - Minimum accepted speed-up.
    pub fn new(pool: CandidatePool, fuel: u32, threshold: Duration) -> Self {
        Self {
            pool,
            fuel,
            threshold,
            tries: 0,
            eviction_set: Vec::new(),
            stats: SpeedUpStats::default(),
        }
    }

    /// Returns `true` once fuel is spent or the pool is down to two candidates.
    pub fn is_finished(&self) -> bool {
        self.tries >= self.fuel || self.pool.len() <= MIN_POOL
    }

    /// Trials executed so far.
    pub const fn tries(&self) -> u32 {
        self.tries
    }

    /// Trial budget.
    pub const fn fuel(&self) -> u32 {
        self.fuel
    }

    /// Current pool.
    pub const fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    /// Acceptances so far.
    pub fn eviction_set(&self) -> &[EvictionSetEntry] {
        &self.eviction_set
    }

    /// Statistics so far.
    pub const fn stats(&self) -> &SpeedUpStats {
        &self.stats
    }

    /// Executes one trial.
    ///
    /// # Returns
    ///
    /// The trial record, or `None` if the task was already finished.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvariantViolation`] when the buffer's cycle is not a
    /// single cycle over exactly the pool's members. The task must be
    /// discarded afterwards.
    pub fn step<H, T, V, R>(
        &mut self,
        ctx: &mut ProbeContext<'_, H, T, V, R>,
    ) -> Result<Option<Trial>, EvictionError>
    where
        H: AccessHook,
        T: TimingOracle,
        V: Victim,
        R: Rng,
    {
        if self.is_finished() {
            return Ok(None);
        }
        let Some(target) = self.pool.pop() else {
            return Ok(None);
        };
        let successor = ctx.buffer.next(target);
        let Some(start) = self.pool.choose(ctx.rng) else {
            self.pool.push_front(target);
            return Ok(None);
        };

        // Prime with the full cycle; also proves it is still one cycle.
        let (predecessor, cycle_len) = ctx.buffer.find_predecessor(start, target)?;
        let expected = self.pool.len() + 1;
        if cycle_len != expected {
            return Err(InvariantViolation::CycleLengthMismatch {
                start,
                expected,
                observed: cycle_len,
            }
            .into());
        }
        let baseline = time_touch(ctx.clock, ctx.victim);

        ctx.buffer.splice_out(predecessor, target);
        let reduced_len = ctx.buffer.walk_cycle(start)?;
        if reduced_len != self.pool.len() {
            return Err(InvariantViolation::CycleLengthMismatch {
                start,
                expected: self.pool.len(),
                observed: reduced_len,
            }
            .into());
        }
        let reduced = time_touch(ctx.clock, ctx.victim);

        self.tries += 1;
        let mut trial = Trial {
            address: target,
            successor,
            predecessor,
            start,
            baseline,
            reduced,
            accepted: false,
        };
        match trial.speed_up().filter(|s| *s > self.threshold) {
            Some(speed_up) => {
                ctx.buffer.splice_in(predecessor, target);
                self.pool.push_front(target);
                self.eviction_set.push(EvictionSetEntry {
                    address: target,
                    speed_up,
                });
                self.stats.record_accept(speed_up);
                trial.accepted = true;
                trace!(addr = %target, ?speed_up, "candidate kept");
            }
            None => {
                self.stats.record_reject();
                trace!(addr = %target, ?baseline, ?reduced, "candidate dropped");
            }
        }
        Ok(Some(trial))
    }

    /// Executes up to `max_trials` trials.
    ///
    /// # Returns
    ///
    /// The number of trials actually executed.
    pub fn run_slice<H, T, V, R>(
        &mut self,
        ctx: &mut ProbeContext<'_, H, T, V, R>,
        max_trials: u32,
    ) -> Result<u32, EvictionError>
    where
        H: AccessHook,
        T: TimingOracle,
        V: Victim,
        R: Rng,
    {
        let mut ran = 0;
        while ran < max_trials {
            if self.step(ctx)?.is_none() {
                break;
            }
            ran += 1;
        }
        Ok(ran)
    }

    /// Executes trials until the task is finished.
    pub fn run_to_end<H, T, V, R>(
        &mut self,
        ctx: &mut ProbeContext<'_, H, T, V, R>,
    ) -> Result<(), EvictionError>
    where
        H: AccessHook,
        T: TimingOracle,
        V: Victim,
        R: Rng,
    {
        while self.step(ctx)?.is_some() {}
        debug!(
            tries = self.tries,
            fuel = self.fuel,
            pool = self.pool.len(),
            stats = %self.stats,
            "evictor finished"
        );
        Ok(())
    }

    /// Consumes the task, returning its results.
    pub fn into_outcome(self) -> EvictorOutcome {
        EvictorOutcome {
            pool: self.pool,
            eviction_set: self.eviction_set,
            stats: self.stats,
            tries: self.tries,
        }
    }
}
