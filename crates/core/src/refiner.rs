//! Two-phase refinement.
//!
//! Phase 1 runs a short, coarse evictor over every buffer line to find any one
//! congruent "squatter". The universe is then filtered down to the lines whose
//! set-index bits match the squatter's, the buffer is relinked over that much
//! smaller pool in shuffled order, and phase 2 runs the evictor again with the
//! caller's budget. Phase 2's eviction set is the result.
//!
//! [`SlicedSearch`] holds the whole procedure as a resumable state machine so
//! that hosts which must not block can run it a slice of trials at a time.

use std::collections::HashSet;
use std::mem;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::common::{EvictionError, LineAddr};
use crate::config::GeometryConfig;
use crate::evictor::{EvictionSetEntry, EvictorTask, ProbeContext};
use crate::memory::{AccessHook, CandidatePool, EvictionBuffer};
use crate::stats::SpeedUpStats;
use crate::timing::{TimingOracle, Victim};

/// Builds the phase 2 pool: every line sharing the squatter's set-index bits.
///
/// The squatter itself is included. Order is ascending.
pub fn congruent_universe(geometry: &GeometryConfig, squatter: LineAddr) -> CandidatePool {
    let mask = geometry.set_index_mask;
    geometry
        .lines()
        .filter(|addr| addr.shares_index_with(squatter, mask))
        .collect()
}

/// Outcome of a complete two-phase search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvictionSetResult {
    /// Every phase 2 acceptance, in order.
    pub eviction_set: Vec<EvictionSetEntry>,
    /// Candidates left in the phase 2 pool.
    pub pool: Vec<LineAddr>,
    /// Sum of accepted phase 2 speed-ups.
    #[serde(with = "crate::common::nanos")]
    pub sum_speed_up: Duration,
    /// Mean accepted phase 2 speed-up.
    #[serde(with = "crate::common::nanos::option")]
    pub ave_speed_up: Option<Duration>,
    /// Accepted phase 2 trials.
    pub speed_up_count: u32,
    /// Rejected phase 2 trials.
    pub error_count: u32,
    /// The phase 1 entry used to filter the universe.
    pub squatter: EvictionSetEntry,
    /// Size of the filtered pool phase 2 started from.
    pub reduced_pool_len: usize,
    /// Phase 1 statistics.
    pub coarse: SpeedUpStats,
}

impl EvictionSetResult {
    /// Distinct accepted addresses, in order of first acceptance.
    pub fn addresses(&self) -> Vec<LineAddr> {
        let mut seen = HashSet::new();
        self.eviction_set
            .iter()
            .map(|entry| entry.address)
            .filter(|addr| seen.insert(*addr))
            .collect()
    }
}

/// The phase a [`SlicedSearch`] is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    /// Full-universe search for a squatter.
    Coarse,
    /// Filtered-pool search for the eviction set.
    Precise,
}

/// Progress report returned after each slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchProgress {
    /// More slices are needed.
    Pending {
        /// Phase currently running.
        phase: SearchPhase,
        /// Trials executed in this phase.
        tries: u32,
        /// Trial budget of this phase.
        fuel: u32,
        /// Current pool size.
        pool_len: usize,
    },
    /// The search has finished.
    Complete(Box<EvictionSetResult>),
}

#[derive(Debug)]
enum State {
    Coarse(EvictorTask),
    Precise {
        task: EvictorTask,
        squatter: EvictionSetEntry,
        reduced_pool_len: usize,
        coarse: SpeedUpStats,
    },
    Done,
}

/// A two-phase search that can be advanced a slice of trials at a time.
///
/// Between calls to [`advance`](Self::advance) the buffer holds a single
/// well-formed cycle; no trial is ever left half done.
#[derive(Debug)]
pub struct SlicedSearch {
    state: State,
    geometry: GeometryConfig,
    fuel: u32,
    threshold: Duration,
}

impl SlicedSearch {
    /// Validates the parameters, initializes the buffer and queues phase 1.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Buffer to reinitialize over the full universe.
    /// * `geometry` - Geometry the buffer was built from.
    /// * `coarse_fuel` - Phase 1 budget.
    /// * `fuel` - Phase 2 budget.
    /// * `threshold` - Minimum accepted speed-up for both phases.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidParameter`] for a zero budget. The buffer is not
    /// touched in that case.
    pub fn start<H: AccessHook>(
        buffer: &mut EvictionBuffer<H>,
        geometry: &GeometryConfig,
        coarse_fuel: u32,
        fuel: u32,
        threshold: Duration,
    ) -> Result<Self, EvictionError> {
        if fuel == 0 {
            return Err(EvictionError::invalid_parameter("fuel", "must be positive"));
        }
        if coarse_fuel == 0 {
            return Err(EvictionError::invalid_parameter(
                "coarse_fuel",
                "must be positive",
            ));
        }
        info!(fuel, coarse_fuel, ?threshold, "starting eviction set search");
        buffer.initialize();
        let pool = CandidatePool::universe(geometry);
        Ok(Self {
            state: State::Coarse(EvictorTask::new(pool, coarse_fuel, threshold)),
            geometry: geometry.clone(),
            fuel,
            threshold,
        })
    }

    /// The running phase, or `None` once finished.
    pub const fn phase(&self) -> Option<SearchPhase> {
        match self.state {
            State::Coarse(_) => Some(SearchPhase::Coarse),
            State::Precise { .. } => Some(SearchPhase::Precise),
            State::Done => None,
        }
    }

    /// Candidates of the running phase, front to back.
    ///
    /// In phase 2 this is the shuffled order the buffer cycle was linked in.
    pub const fn pool(&self) -> Option<&CandidatePool> {
        match &self.state {
            State::Coarse(task) | State::Precise { task, .. } => Some(task.pool()),
            State::Done => None,
        }
    }

    /// Returns `true` once a result or an error has been returned.
    pub const fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Runs up to `max_trials` trials, crossing into phase 2 when phase 1 ends.
    ///
    /// # Errors
    ///
    /// [`EvictionError::NoCongruentAddressFound`] when phase 1 accepted nothing,
    /// [`EvictionError::InvariantViolation`] on buffer corruption, and
    /// [`EvictionError::InvalidParameter`] when called after completion.
    pub fn advance<H, T, V, R>(
        &mut self,
        ctx: &mut ProbeContext<'_, H, T, V, R>,
        max_trials: u32,
    ) -> Result<SearchProgress, EvictionError>
    where
        H: AccessHook,
        T: TimingOracle,
        V: Victim,
        R: Rng,
    {
        let mut budget = max_trials;
        loop {
            match mem::replace(&mut self.state, State::Done) {
                State::Coarse(mut task) => {
                    budget -= task.run_slice(ctx, budget)?;
                    if !task.is_finished() {
                        let progress = pending(SearchPhase::Coarse, &task);
                        self.state = State::Coarse(task);
                        return Ok(progress);
                    }
                    self.state = self.refine(ctx, task)?;
                    if budget == 0 {
                        if let State::Precise { task, .. } = &self.state {
                            return Ok(pending(SearchPhase::Precise, task));
                        }
                    }
                }
                State::Precise {
                    mut task,
                    squatter,
                    reduced_pool_len,
                    coarse,
                } => {
                    budget -= task.run_slice(ctx, budget)?;
                    if !task.is_finished() {
                        let progress = pending(SearchPhase::Precise, &task);
                        self.state = State::Precise {
                            task,
                            squatter,
                            reduced_pool_len,
                            coarse,
                        };
                        return Ok(progress);
                    }
                    let outcome = task.into_outcome();
                    let result = EvictionSetResult {
                        pool: outcome.pool.to_vec(),
                        sum_speed_up: outcome.stats.sum,
                        ave_speed_up: outcome.stats.mean(),
                        speed_up_count: outcome.stats.accepted,
                        error_count: outcome.stats.rejected,
                        eviction_set: outcome.eviction_set,
                        squatter,
                        reduced_pool_len,
                        coarse,
                    };
                    info!(
                        found = result.addresses().len(),
                        accepted = result.speed_up_count,
                        rejected = result.error_count,
                        "eviction set search complete"
                    );
                    return Ok(SearchProgress::Complete(Box::new(result)));
                }
                State::Done => {
                    return Err(EvictionError::invalid_parameter(
                        "search",
                        "advanced after completion",
                    ));
                }
            }
        }
    }

    /// Ends phase 1: picks the squatter, filters and relinks the buffer.
    fn refine<H, T, V, R>(
        &self,
        ctx: &mut ProbeContext<'_, H, T, V, R>,
        coarse_task: EvictorTask,
    ) -> Result<State, EvictionError>
    where
        H: AccessHook,
        T: TimingOracle,
        V: Victim,
        R: Rng,
    {
        let outcome = coarse_task.into_outcome();
        let Some(squatter) = outcome.best() else {
            return Err(EvictionError::NoCongruentAddressFound {
                tries: outcome.tries,
            });
        };
        info!(
            squatter = %squatter.address,
            speed_up = ?squatter.speed_up,
            "found squatter address"
        );

        let mut pool = congruent_universe(&self.geometry, squatter.address);
        pool.shuffle(ctx.rng);
        ctx.buffer.link_cycle(&pool.to_vec())?;
        let reduced_pool_len = pool.len();
        info!(reduced_pool_len, "reduced candidate pool");

        Ok(State::Precise {
            task: EvictorTask::new(pool, self.fuel, self.threshold),
            squatter,
            reduced_pool_len,
            coarse: outcome.stats,
        })
    }
}

fn pending(phase: SearchPhase, task: &EvictorTask) -> SearchProgress {
    SearchProgress::Pending {
        phase,
        tries: task.tries(),
        fuel: task.fuel(),
        pool_len: task.pool().len(),
    }
}
