//! Configuration system for the eviction-set search.
//!
//! This module defines all configuration structures used to parameterize a run.
//! It provides:
//! 1. **Defaults:** Baseline hardware geometry and search budgets.
//! 2. **Structures:** Hierarchical config for geometry, search, calibration and the simulated machine.
//! 3. **Validation:** Geometry checks performed before any buffer is allocated.
//!
//! Configuration is supplied as JSON (see [`Config::from_json`]) or built with
//! `Config::default()`. Hosts may override individual fields afterwards.

use std::time::Duration;

use serde::Deserialize;

use crate::common::constants;
use crate::common::{EvictionError, LineAddr};

/// Default configuration constants.
///
/// These values describe the targeted hardware and the search budgets used
/// when a field is not explicitly set.
mod defaults {
    use crate::common::constants;

    /// Eviction buffer size; matches the last-level cache size.
    pub const LLC_SIZE: usize = constants::LLC_SIZE;

    /// Stride between eviction buffer entries in bytes.
    pub const LINE_SIZE: usize = constants::BUFFER_LINE_SIZE;

    /// Associativity of the targeted cache.
    pub const ASSOCIATIVITY: usize = constants::LLC_ASSOCIATIVITY;

    /// Set-index bits shared by congruent addresses.
    pub const SET_INDEX_MASK: u32 = constants::SET_INDEX_MASK;

    /// Fuel of the coarse (phase 1) evictor run.
    pub const COARSE_FUEL: u32 = 500;

    /// Fuel of the precise (phase 2) evictor run.
    pub const FUEL: u32 = 10_000;

    /// Minimum accepted speed-up in nanoseconds.
    pub const THRESHOLD_NS: u64 = 40;

    /// Trials executed per slice by non-blocking hosts.
    pub const SLICE_LEN: u32 = 250;

    /// Trials of the calibration pre-flight check.
    pub const CALIBRATION_FUEL: u32 = 1000;

    /// Fraction of zero-length deltas above which the timer is considered too coarse.
    pub const COARSE_ZERO_FRACTION: f64 = 0.9;

    /// Simulated cache size in bytes (32 KiB).
    pub const SIM_CACHE_SIZE: usize = 32 * 1024;

    /// Simulated cache line size in bytes.
    pub const SIM_CACHE_LINE: usize = 64;

    /// Simulated cache associativity.
    pub const SIM_CACHE_WAYS: usize = 8;

    /// Simulated eviction buffer size; matches the simulated cache.
    pub const SIM_BUFFER_SIZE: usize = SIM_CACHE_SIZE;

    /// Simulated cycles charged for a cache hit.
    pub const SIM_HIT_LATENCY: u64 = 4;

    /// Simulated cycles charged for a cache miss.
    pub const SIM_MISS_LATENCY: u64 = 200;

    /// Simulated base address of the eviction buffer.
    pub const SIM_BUFFER_BASE: u64 = 0x1000_0000;

    /// Simulated address of the victim (cache set 39).
    pub const SIM_VICTIM_ADDR: u64 = 0x4000_09c0;
}

/// Cache replacement policy of the simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used replacement policy.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Bit-based pseudo-LRU replacement policy.
    #[serde(alias = "Plru")]
    Plru,
    /// First In First Out replacement policy.
    #[serde(alias = "Fifo")]
    Fifo,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use evset_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.geometry.llc_size, 1 << 22);
/// assert_eq!(config.search.coarse_fuel, 500);
/// ```
///
/// Deserializing from JSON, missing fields fall back to their defaults:
///
/// ```
/// use evset_core::config::{Config, ReplacementPolicy};
///
/// let json = r#"{
///     "geometry": { "llc_size": 65536, "line_size": 64, "set_index_mask": 4032 },
///     "search": { "fuel": 2000, "threshold_ns": 25, "seed": 7 },
///     "sim": { "cache": { "ways": 4, "policy": "Fifo" } }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.geometry.line_count(), 1024);
/// assert_eq!(config.search.seed, Some(7));
/// assert_eq!(config.search.coarse_fuel, 500);
/// assert_eq!(config.sim.cache.policy, ReplacementPolicy::Fifo);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Memory geometry of the targeted cache
    #[serde(default)]
    pub geometry: GeometryConfig,
    /// Evictor budgets and acceptance threshold
    #[serde(default)]
    pub search: SearchConfig,
    /// Calibration pre-flight check
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Simulated machine used by tests and the `simulate` command
    #[serde(default)]
    pub sim: SimConfig,
}

impl Config {
    /// Parses a configuration from a JSON document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or the `serde_json` error describing the first problem.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validates every geometry in the configuration.
    pub fn validate(&self) -> Result<(), EvictionError> {
        self.geometry.validate()?;
        self.sim.validate()
    }
}

/// Memory geometry of the targeted cache.
///
/// These constants describe the hardware; results are only meaningful when
/// they match it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeometryConfig {
    /// Eviction buffer size in bytes
    #[serde(default = "GeometryConfig::default_llc_size")]
    pub llc_size: usize,

    /// Stride between eviction buffer lines in bytes
    #[serde(default = "GeometryConfig::default_line_size")]
    pub line_size: usize,

    /// Number of ways per cache set (the expected eviction set size)
    #[serde(default = "GeometryConfig::default_associativity")]
    pub associativity: usize,

    /// Bits of an address that select its cache set
    #[serde(default = "GeometryConfig::default_set_index_mask")]
    pub set_index_mask: u32,
}

impl GeometryConfig {
    /// Returns the default buffer size in bytes.
    fn default_llc_size() -> usize {
        defaults::LLC_SIZE
    }

    /// Returns the default line stride in bytes.
    fn default_line_size() -> usize {
        defaults::LINE_SIZE
    }

    /// Returns the default associativity.
    fn default_associativity() -> usize {
        defaults::ASSOCIATIVITY
    }

    /// Returns the default set-index mask.
    fn default_set_index_mask() -> u32 {
        defaults::SET_INDEX_MASK
    }

    /// Number of lines in the eviction buffer.
    pub const fn line_count(&self) -> usize {
        if self.line_size == 0 {
            0
        } else {
            self.llc_size / self.line_size
        }
    }

    /// Iterates over every line address of the buffer in ascending order.
    pub fn lines(&self) -> impl Iterator<Item = LineAddr> + use<> {
        let stride = self.line_size as u32;
        (0..self.line_count() as u32).map(move |i| LineAddr::new(i * stride))
    }

    /// Checks that the geometry describes a non-empty, addressable buffer.
    ///
    /// # Errors
    ///
    /// Returns [`EvictionError::InvalidGeometry`] when the line size is not a
    /// power of two of at least 4 bytes (one `next` word), when the buffer
    /// size is not a positive multiple of it, or when offsets would not fit
    /// into 32 bits.
    pub fn validate(&self) -> Result<(), EvictionError> {
        if self.line_size < 4 || !self.line_size.is_power_of_two() {
            return Err(EvictionError::InvalidGeometry(format!(
                "line size {} must be a power of two of at least 4 bytes",
                self.line_size
            )));
        }
        if self.llc_size == 0 || self.llc_size % self.line_size != 0 {
            return Err(EvictionError::InvalidGeometry(format!(
                "buffer size {} must be a positive multiple of the line size {}",
                self.llc_size, self.line_size
            )));
        }
        if u32::try_from(self.llc_size).is_err() {
            return Err(EvictionError::InvalidGeometry(format!(
                "buffer size {} exceeds the 32-bit address space",
                self.llc_size
            )));
        }
        if self.associativity == 0 {
            return Err(EvictionError::InvalidGeometry(
                "associativity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            llc_size: defaults::LLC_SIZE,
            line_size: defaults::LINE_SIZE,
            associativity: defaults::ASSOCIATIVITY,
            set_index_mask: defaults::SET_INDEX_MASK,
        }
    }
}

/// Evictor budgets and acceptance threshold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchConfig {
    /// Fuel of the coarse phase that locates the squatter
    #[serde(default = "SearchConfig::default_coarse_fuel")]
    pub coarse_fuel: u32,

    /// Fuel of the precise phase
    #[serde(default = "SearchConfig::default_fuel")]
    pub fuel: u32,

    /// Minimum accepted speed-up in nanoseconds
    #[serde(default = "SearchConfig::default_threshold_ns")]
    pub threshold_ns: u64,

    /// Seed for start-address selection and shuffling; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Trials per slice for hosts that must not block
    #[serde(default = "SearchConfig::default_slice_len")]
    pub slice_len: u32,
}

impl SearchConfig {
    /// Returns the default coarse fuel.
    fn default_coarse_fuel() -> u32 {
        defaults::COARSE_FUEL
    }

    /// Returns the default precise fuel.
    fn default_fuel() -> u32 {
        defaults::FUEL
    }

    /// Returns the default threshold in nanoseconds.
    fn default_threshold_ns() -> u64 {
        defaults::THRESHOLD_NS
    }

    /// Returns the default slice length.
    fn default_slice_len() -> u32 {
        defaults::SLICE_LEN
    }

    /// The acceptance threshold as a [`Duration`].
    pub const fn threshold(&self) -> Duration {
        Duration::from_nanos(self.threshold_ns)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            coarse_fuel: defaults::COARSE_FUEL,
            fuel: defaults::FUEL,
            threshold_ns: defaults::THRESHOLD_NS,
            seed: None,
            slice_len: defaults::SLICE_LEN,
        }
    }
}

/// Calibration pre-flight check settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationConfig {
    /// Number of hit-versus-miss trials
    #[serde(default = "CalibrationConfig::default_fuel")]
    pub fuel: u32,

    /// Fraction of zero deltas above which the timer is reported as too coarse
    #[serde(default = "CalibrationConfig::default_coarse_zero_fraction")]
    pub coarse_zero_fraction: f64,
}

impl CalibrationConfig {
    /// Returns the default calibration fuel.
    fn default_fuel() -> u32 {
        defaults::CALIBRATION_FUEL
    }

    /// Returns the default zero-delta bound.
    fn default_coarse_zero_fraction() -> f64 {
        defaults::COARSE_ZERO_FRACTION
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            fuel: defaults::CALIBRATION_FUEL,
            coarse_zero_fraction: defaults::COARSE_ZERO_FRACTION,
        }
    }
}

/// Simulated machine configuration.
///
/// The simulated machine has its own buffer geometry so it stays small enough
/// to walk quickly in tests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimConfig {
    /// Geometry of the simulated eviction buffer
    #[serde(default = "SimConfig::default_geometry")]
    pub geometry: GeometryConfig,

    /// Simulated set-associative cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Cycles charged for a hit
    #[serde(default = "SimConfig::default_hit_latency")]
    pub hit_latency: u64,

    /// Cycles charged for a miss
    #[serde(default = "SimConfig::default_miss_latency")]
    pub miss_latency: u64,

    /// Simulated address of buffer offset 0
    #[serde(default = "SimConfig::default_buffer_base")]
    pub buffer_base: u64,

    /// Simulated address of the victim
    #[serde(default = "SimConfig::default_victim_addr")]
    pub victim_addr: u64,
}

impl SimConfig {
    /// Checks the buffer geometry, the cache, and that the buffer's simulated
    /// address range does not wrap past `u64::MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`EvictionError::InvalidGeometry`] on the first problem found.
    pub fn validate(&self) -> Result<(), EvictionError> {
        self.geometry.validate()?;
        self.cache.validate()?;
        if self.buffer_base.checked_add(self.geometry.llc_size as u64).is_none() {
            return Err(EvictionError::InvalidGeometry(format!(
                "simulated buffer at {:#x} of {} bytes exceeds the address space",
                self.buffer_base, self.geometry.llc_size
            )));
        }
        Ok(())
    }

    /// Returns the default simulated buffer geometry.
    ///
    /// One buffer line per cache line, eight ways, index bits 6 to 11.
    fn default_geometry() -> GeometryConfig {
        GeometryConfig {
            llc_size: defaults::SIM_BUFFER_SIZE,
            line_size: defaults::SIM_CACHE_LINE,
            associativity: defaults::SIM_CACHE_WAYS,
            set_index_mask: constants::SET_INDEX_MASK,
        }
    }

    /// Returns the default hit latency.
    fn default_hit_latency() -> u64 {
        defaults::SIM_HIT_LATENCY
    }

    /// Returns the default miss latency.
    fn default_miss_latency() -> u64 {
        defaults::SIM_MISS_LATENCY
    }

    /// Returns the default buffer base address.
    fn default_buffer_base() -> u64 {
        defaults::SIM_BUFFER_BASE
    }

    /// Returns the default victim address.
    fn default_victim_addr() -> u64 {
        defaults::SIM_VICTIM_ADDR
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            geometry: Self::default_geometry(),
            cache: CacheConfig::default(),
            hit_latency: defaults::SIM_HIT_LATENCY,
            miss_latency: defaults::SIM_MISS_LATENCY,
            buffer_base: defaults::SIM_BUFFER_BASE,
            victim_addr: defaults::SIM_VICTIM_ADDR,
        }
    }
}

/// Simulated cache level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Total cache size in bytes
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,

    /// Cache line size in bytes
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity (number of ways)
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,

    /// Replacement policy
    #[serde(default)]
    pub policy: ReplacementPolicy,
}

impl CacheConfig {
    /// Returns the default cache size in bytes.
    fn default_size() -> usize {
        defaults::SIM_CACHE_SIZE
    }

    /// Returns the default cache line size in bytes.
    fn default_line() -> usize {
        defaults::SIM_CACHE_LINE
    }

    /// Returns the default cache associativity (number of ways).
    fn default_ways() -> usize {
        defaults::SIM_CACHE_WAYS
    }

    /// Number of sets implied by size, line size and ways.
    pub const fn num_sets(&self) -> usize {
        if self.line_bytes == 0 || self.ways == 0 {
            0
        } else {
            self.size_bytes / self.line_bytes / self.ways
        }
    }

    /// Checks that the cache has at least one set of at least one way.
    pub fn validate(&self) -> Result<(), EvictionError> {
        if self.ways == 0 || self.ways > 64 {
            return Err(EvictionError::InvalidGeometry(format!(
                "simulated cache ways {} must be between 1 and 64",
                self.ways
            )));
        }
        if !self.line_bytes.is_power_of_two() || self.num_sets() == 0 {
            return Err(EvictionError::InvalidGeometry(format!(
                "simulated cache of {} bytes with {}-byte lines and {} ways has no sets",
                self.size_bytes, self.line_bytes, self.ways
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::SIM_CACHE_SIZE,
            line_bytes: defaults::SIM_CACHE_LINE,
            ways: defaults::SIM_CACHE_WAYS,
            policy: ReplacementPolicy::default(),
        }
    }
}
