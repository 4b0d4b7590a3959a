//! Deterministic simulated machine.
//!
//! Supplies noise-free implementations of the three capabilities a search
//! needs, backed by a set-associative cache model. Used by the test suite and
//! by the CLI's `simulate` command to check results against ground truth.

/// Set-associative cache model and replacement policies.
pub mod cache;

/// Shared machine state and its capability handles.
pub mod machine;

pub use cache::CacheSim;
pub use machine::{SimBus, SimClock, SimMachine, SimProfiler, SimVictim};
