//! Cache eviction set discovery library.
//!
//! This crate finds, by timing alone, a set of addresses that together evict a
//! victim address from the last-level cache. It implements the following:
//! 1. **Memory:** An owned eviction buffer whose lines form a single linked cycle,
//!    and the candidate pool mirroring it.
//! 2. **Evictor:** The prime+probe trial loop that keeps a candidate only when
//!    removing it speeds the victim up.
//! 3. **Refiner:** The two-phase search (coarse squatter, index-bit filter,
//!    precise run) with a resumable, sliced variant.
//! 4. **Calibration:** A miss-versus-hit pre-flight check of the host timer.
//! 5. **Simulation:** A deterministic cache model supplying noise-free capabilities.
//!
//! Timing, the victim access and randomness are always injected; see
//! [`timing::TimingOracle`], [`timing::Victim`] and [`profiler::rng_from_seed`].

/// Miss-versus-hit calibration.
pub mod calibration;
/// Common types and constants (line addresses, errors, serde helpers).
pub mod common;
/// Configuration (defaults, geometry, budgets, simulated machine).
pub mod config;
/// Prime+probe evictor and its resumable task.
pub mod evictor;
/// Eviction buffer and candidate pool.
pub mod memory;
/// Host-facing profiler owning buffer and capabilities.
pub mod profiler;
/// Two-phase refinement and sliced search.
pub mod refiner;
/// Simulated cache machine.
pub mod sim;
/// Speed-up statistics.
pub mod stats;
/// Timing oracle and victim capabilities.
pub mod timing;

/// Root configuration type; use `Config::default()` or [`Config::from_json`].
pub use crate::config::Config;
/// Error type returned by every fallible operation.
pub use crate::common::EvictionError;
/// Main entry point; construct with `CacheProfiler::new`.
pub use crate::profiler::CacheProfiler;
/// Result of a completed search.
pub use crate::refiner::EvictionSetResult;
