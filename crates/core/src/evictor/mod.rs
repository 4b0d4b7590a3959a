//! Prime+probe evictor.
//!
//! The evictor tests one candidate per trial: it times the victim with the full
//! cycle primed, splices the candidate out, primes the reduced cycle and times
//! the victim again. A speed-up above the threshold means the candidate was
//! needed to evict the victim, so it is kept; anything else drops it for good.
//!
//! The loop body lives in [`EvictorTask::step`] so the same trial logic backs
//! both the blocking [`run_evictor`] and sliced execution.

/// Resumable evictor state.
pub mod task;

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::common::{EvictionError, LineAddr};
use crate::memory::{AccessHook, CandidatePool, EvictionBuffer};
use crate::stats::SpeedUpStats;
use crate::timing::{TimingOracle, Victim};

pub use task::EvictorTask;

/// Everything one trial needs besides the pool: buffer, clock, victim and randomness.
///
/// All four are borrowed exclusively for the duration of a trial, so no other
/// code can observe the buffer between a splice-out and its splice-in.
#[derive(Debug)]
pub struct ProbeContext<'a, H: AccessHook, T, V, R> {
    /// The eviction buffer whose cycle mirrors the pool.
    pub buffer: &'a mut EvictionBuffer<H>,
    /// Timing oracle.
    pub clock: &'a mut T,
    /// Victim access.
    pub victim: &'a mut V,
    /// Source of start addresses and shuffles.
    pub rng: &'a mut R,
}

impl<'a, H, T, V, R> ProbeContext<'a, H, T, V, R>
where
    H: AccessHook,
    T: TimingOracle,
    V: Victim,
    R: Rng,
{
    /// Bundles the capabilities for a run.
    pub const fn new(
        buffer: &'a mut EvictionBuffer<H>,
        clock: &'a mut T,
        victim: &'a mut V,
        rng: &'a mut R,
    ) -> Self {
        Self {
            buffer,
            clock,
            victim,
            rng,
        }
    }
}

/// A confirmed congruent address and the speed-up measured when removing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EvictionSetEntry {
    /// The accepted candidate.
    pub address: LineAddr,
    /// Victim access time saved by removing the candidate from the cycle.
    #[serde(with = "crate::common::nanos")]
    pub speed_up: Duration,
}

/// The record of one executed trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trial {
    /// Candidate under test.
    pub address: LineAddr,
    /// Its successor when it was popped.
    pub successor: LineAddr,
    /// Its predecessor on the cycle.
    pub predecessor: LineAddr,
    /// Start of the priming walks.
    pub start: LineAddr,
    /// Victim time with the candidate primed.
    pub baseline: Duration,
    /// Victim time with the candidate removed.
    pub reduced: Duration,
    /// Whether the candidate was kept.
    pub accepted: bool,
}

impl Trial {
    /// `baseline - reduced`, or `None` if removing the candidate slowed the victim down.
    pub fn speed_up(&self) -> Option<Duration> {
        self.baseline.checked_sub(self.reduced)
    }
}

/// Final state of one evictor invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvictorOutcome {
    /// Candidates still in the pool (and on the buffer's cycle).
    pub pool: CandidatePool,
    /// Every acceptance, in order. An address may appear more than once.
    pub eviction_set: Vec<EvictionSetEntry>,
    /// Accepted/rejected statistics.
    pub stats: SpeedUpStats,
    /// Trials executed.
    pub tries: u32,
}

impl EvictorOutcome {
    /// The entry with the largest speed-up; ties go to the first seen.
    pub fn best(&self) -> Option<EvictionSetEntry> {
        select_best(&self.eviction_set)
    }
}

/// Picks the entry with the largest speed-up, keeping the earliest on ties.
pub fn select_best(entries: &[EvictionSetEntry]) -> Option<EvictionSetEntry> {
    entries.iter().copied().fold(None, |best, entry| match best {
        Some(b) if b.speed_up >= entry.speed_up => Some(b),
        _ => Some(entry),
    })
}

/// Runs the evictor to completion over `pool`.
///
/// The buffer's active cycle must consist of exactly the pool's members.
///
/// # Arguments
///
/// * `ctx` - Buffer, clock, victim and randomness.
/// * `pool` - Candidates to test.
/// * `fuel` - Maximum number of trials.
/// * `threshold` - Minimum speed-up for a candidate to be kept.
///
/// # Returns
///
/// The outcome after fuel ran out or the pool shrank to two candidates.
pub fn run_evictor<H, T, V, R>(
    ctx: &mut ProbeContext<'_, H, T, V, R>,
    pool: CandidatePool,
    fuel: u32,
    threshold: Duration,
) -> Result<EvictorOutcome, EvictionError>
where
    H: AccessHook,
    T: TimingOracle,
    V: Victim,
    R: Rng,
{
    let mut task = EvictorTask::new(pool, fuel, threshold);
    task.run_to_end(ctx)?;
    Ok(task.into_outcome())
}
