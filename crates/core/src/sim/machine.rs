//! Simulated machine.
//!
//! A single cache level plus a cycle counter, shared by three handles:
//! 1. **[`SimBus`]:** the buffer's access hook; each traversal read accesses
//!    `buffer_base + offset`.
//! 2. **[`SimVictim`]:** touches `victim_addr`.
//! 3. **[`SimClock`]:** reads the cycle counter, one cycle per nanosecond.
//!
//! Every access advances the counter by the hit or miss latency, so a timed
//! victim touch measures exactly whether the victim was still cached.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::SmallRng;

use super::cache::CacheSim;
use crate::common::{EvictionError, LineAddr};
use crate::config::{Config, SimConfig};
use crate::memory::AccessHook;
use crate::profiler::{CacheProfiler, rng_from_seed};
use crate::timing::{TimingOracle, Victim};

/// Profiler wired to a [`SimMachine`].
pub type SimProfiler = CacheProfiler<SimClock, SimVictim, SmallRng, SimBus>;

#[derive(Debug)]
struct MachineState {
    cache: CacheSim,
    cycles: u64,
    hit_latency: u64,
    miss_latency: u64,
}

/// Shared handle to the simulated cache and cycle counter.
#[derive(Debug, Clone)]
pub struct SimMachine {
    state: Rc<RefCell<MachineState>>,
    buffer_base: u64,
    victim_addr: u64,
}

impl SimMachine {
    /// Builds a machine with a cold cache.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidGeometry`] if the cache or buffer geometry is
    /// unusable, or the buffer would wrap past the end of the address space.
    pub fn new(config: &SimConfig) -> Result<Self, EvictionError> {
        config.validate()?;
        Ok(Self {
            state: Rc::new(RefCell::new(MachineState {
                cache: CacheSim::new(&config.cache),
                cycles: 0,
                hit_latency: config.hit_latency,
                miss_latency: config.miss_latency,
            })),
            buffer_base: config.buffer_base,
            victim_addr: config.victim_addr,
        })
    }

    /// Accesses a simulated address and charges its latency.
    ///
    /// # Returns
    ///
    /// `true` on a cache hit.
    pub fn access(&self, addr: u64) -> bool {
        let mut state = self.state.borrow_mut();
        let hit = state.cache.access(addr);
        let cost = if hit {
            state.hit_latency
        } else {
            state.miss_latency
        };
        state.cycles = state.cycles.saturating_add(cost);
        hit
    }

    /// Cycles elapsed so far.
    pub fn cycles(&self) -> u64 {
        self.state.borrow().cycles
    }

    /// Cache hits and misses so far.
    pub fn counters(&self) -> (u64, u64) {
        self.state.borrow().cache.counters()
    }

    /// Returns `true` if the victim is currently cached.
    pub fn victim_cached(&self) -> bool {
        self.state.borrow().cache.contains(self.victim_addr)
    }

    /// Simulated address of a buffer line.
    pub fn line_address(&self, line: LineAddr) -> u64 {
        self.buffer_base.wrapping_add(u64::from(line))
    }

    /// Returns `true` if `line` maps to the victim's cache set.
    pub fn is_congruent(&self, line: LineAddr) -> bool {
        let state = self.state.borrow();
        state.cache.set_of(self.line_address(line)) == state.cache.set_of(self.victim_addr)
    }

    /// Invalidates the whole cache.
    pub fn flush(&self) {
        self.state.borrow_mut().cache.flush();
    }

    /// Clock handle.
    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    /// Victim handle.
    pub fn victim(&self) -> SimVictim {
        SimVictim(self.clone())
    }

    /// Access hook handle for the eviction buffer.
    pub fn bus(&self) -> SimBus {
        SimBus(self.clone())
    }

    /// Builds a profiler over this machine.
    ///
    /// The buffer geometry is taken from `config.sim.geometry`; search and
    /// calibration settings from `config`.
    ///
    /// # Errors
    ///
    /// [`EvictionError::InvalidGeometry`] if the simulated buffer geometry is
    /// unusable or does not fit above this machine's buffer base.
    pub fn profiler(&self, config: &Config) -> Result<SimProfiler, EvictionError> {
        SimConfig {
            buffer_base: self.buffer_base,
            ..config.sim.clone()
        }
        .validate()?;
        let sim_config = Config {
            geometry: config.sim.geometry.clone(),
            ..config.clone()
        };
        CacheProfiler::with_hook(
            &sim_config,
            self.bus(),
            self.clock(),
            self.victim(),
            rng_from_seed(config.search.seed),
        )
    }
}

/// [`TimingOracle`] reading the simulated cycle counter.
#[derive(Debug, Clone)]
pub struct SimClock(SimMachine);

impl TimingOracle for SimClock {
    fn now(&mut self) -> Duration {
        Duration::from_nanos(self.0.cycles())
    }
}

/// [`Victim`] touching the simulated victim address.
#[derive(Debug, Clone)]
pub struct SimVictim(SimMachine);

impl Victim for SimVictim {
    fn touch(&mut self) {
        let _ = self.0.access(self.0.victim_addr);
    }
}

/// [`AccessHook`] forwarding buffer reads to the simulated cache.
#[derive(Debug, Clone)]
pub struct SimBus(SimMachine);

impl AccessHook for SimBus {
    fn on_access(&self, addr: LineAddr) {
        let _ = self.0.access(self.0.line_address(addr));
    }
}
