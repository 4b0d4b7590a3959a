//! Cache profiler.
//!
//! [`CacheProfiler`] owns one eviction buffer together with the capabilities a
//! run needs (clock, victim, randomness) and exposes the three entry points
//! hosts call:
//! 1. **Blocking search:** [`find_eviction_set`](CacheProfiler::find_eviction_set).
//! 2. **Sliced search:** [`begin_search`](CacheProfiler::begin_search) followed by
//!    repeated [`advance`](CacheProfiler::advance) calls.
//! 3. **Calibration:** [`measure_cache_miss_penalty`](CacheProfiler::measure_cache_miss_penalty).
//!
//! Every run starts by reinitializing the buffer, so runs never depend on the
//! state a previous run left behind.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::calibration::{self, CalibrationResult};
use crate::common::EvictionError;
use crate::config::{CalibrationConfig, Config, GeometryConfig, SearchConfig};
use crate::evictor::ProbeContext;
use crate::memory::{AccessHook, EvictionBuffer, Untraced};
use crate::refiner::{EvictionSetResult, SearchProgress, SlicedSearch};
use crate::timing::{TimingOracle, Victim};

/// Creates the generator used for start addresses and shuffles.
///
/// A fixed seed makes runs against deterministic capabilities reproducible;
/// without one the generator is seeded from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> SmallRng {
    seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64)
}

/// Eviction-set finder bound to one buffer and one set of capabilities.
#[derive(Debug)]
pub struct CacheProfiler<T, V, R, H: AccessHook = Untraced> {
    geometry: GeometryConfig,
    search_config: SearchConfig,
    calibration: CalibrationConfig,
    buffer: EvictionBuffer<H>,
    clock: T,
    victim: V,
    rng: R,
    search: Option<SlicedSearch>,
}

impl<T, V, R> CacheProfiler<T, V, R, Untraced>
where
    T: TimingOracle,
    V: Victim,
    R: Rng,
{
    /// Allocates a profiler for real hardware.
    ///
    /// # Arguments
    ///
    /// * `config` - Geometry, search and calibration settings.
    /// * `clock` - Timing oracle.
    /// * `victim` - The access whose cache set is searched for.
    /// * `rng` - Source of start addresses and shuffles.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidGeometry`] before allocating anything.
    pub fn new(config: &Config, clock: T, victim: V, rng: R) -> Result<Self, EvictionError> {
        Self::with_hook(config, Untraced, clock, victim, rng)
    }
}

impl<T, V, R, H> CacheProfiler<T, V, R, H>
where
    T: TimingOracle,
    V: Victim,
    R: Rng,
    H: AccessHook,
{
    /// Allocates a profiler whose buffer reports traversal reads to `hook`.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidGeometry`] before allocating anything.
    pub fn with_hook(
        config: &Config,
        hook: H,
        clock: T,
        victim: V,
        rng: R,
    ) -> Result<Self, EvictionError> {
        let buffer = EvictionBuffer::with_hook(&config.geometry, hook)?;
        debug!(
            lines = buffer.line_count(),
            line_size = buffer.line_size(),
            "allocated eviction buffer"
        );
        Ok(Self {
            geometry: config.geometry.clone(),
            search_config: config.search.clone(),
            calibration: config.calibration.clone(),
            buffer,
            clock,
            victim,
            rng,
            search: None,
        })
    }

    /// Buffer geometry.
    pub const fn geometry(&self) -> &GeometryConfig {
        &self.geometry
    }

    /// Search settings used by hosts that do not pass their own.
    pub const fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    /// The eviction buffer.
    pub const fn buffer(&self) -> &EvictionBuffer<H> {
        &self.buffer
    }

    /// Returns `true` while a sliced search is in progress.
    pub const fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    /// Runs the complete two-phase search, blocking until it finishes.
    ///
    /// # Arguments
    ///
    /// * `fuel` - Phase 2 trial budget.
    /// * `threshold` - Minimum accepted speed-up.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidParameter`] for zero fuel (the buffer is left
    /// untouched), [`EvictionError::NoCongruentAddressFound`] when phase 1
    /// accepted nothing, and [`EvictionError::InvariantViolation`] on buffer
    /// corruption.
    pub fn find_eviction_set(
        &mut self,
        fuel: u32,
        threshold: Duration,
    ) -> Result<EvictionSetResult, EvictionError> {
        let mut search = SlicedSearch::start(
            &mut self.buffer,
            &self.geometry,
            self.search_config.coarse_fuel,
            fuel,
            threshold,
        )?;
        // The buffer was just reinitialized under any sliced search.
        self.search = None;
        let mut ctx = ProbeContext::new(
            &mut self.buffer,
            &mut self.clock,
            &mut self.victim,
            &mut self.rng,
        );
        loop {
            if let SearchProgress::Complete(result) = search.advance(&mut ctx, u32::MAX)? {
                return Ok(*result);
            }
        }
    }

    /// Starts a sliced search, replacing any search in progress.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidParameter`] for zero fuel. A search already in
    /// progress is kept in that case.
    pub fn begin_search(&mut self, fuel: u32, threshold: Duration) -> Result<(), EvictionError> {
        self.search = Some(SlicedSearch::start(
            &mut self.buffer,
            &self.geometry,
            self.search_config.coarse_fuel,
            fuel,
            threshold,
        )?);
        Ok(())
    }

    /// Runs up to `max_trials` trials of the search in progress.
    ///
    /// The search is dropped once it completes or fails.
    ///
    /// # Errors
    ///
    /// Everything [`find_eviction_set`](Self::find_eviction_set) reports, and
    /// [`EvictionError::InvalidParameter`] when no search is in progress.
    pub fn advance(&mut self, max_trials: u32) -> Result<SearchProgress, EvictionError> {
        let Some(search) = self.search.as_mut() else {
            return Err(EvictionError::invalid_parameter(
                "search",
                "no search in progress",
            ));
        };
        let mut ctx = ProbeContext::new(
            &mut self.buffer,
            &mut self.clock,
            &mut self.victim,
            &mut self.rng,
        );
        let progress = search.advance(&mut ctx, max_trials);
        if !matches!(progress, Ok(SearchProgress::Pending { .. })) {
            self.search = None;
        }
        progress
    }

    /// Measures the victim's miss-versus-hit gap over `fuel` trials.
    ///
    /// Aborts any sliced search in progress, since it reinitializes the buffer.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidParameter`] for zero fuel.
    pub fn measure_cache_miss_penalty(
        &mut self,
        fuel: u32,
    ) -> Result<CalibrationResult, EvictionError> {
        let config = CalibrationConfig {
            fuel,
            ..self.calibration.clone()
        };
        if fuel > 0 {
            self.search = None;
        }
        let mut ctx = ProbeContext::new(
            &mut self.buffer,
            &mut self.clock,
            &mut self.victim,
            &mut self.rng,
        );
        calibration::measure_cache_miss_penalty(&mut ctx, &config)
    }
}
