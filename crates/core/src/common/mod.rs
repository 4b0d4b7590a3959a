//! Common utilities and types used throughout the eviction-set search.
//!
//! This module provides the building blocks shared by every other module. It includes:
//! 1. **Address Types:** A strong type for eviction buffer line offsets.
//! 2. **Constants:** Default hardware geometry for the targeted last-level cache.
//! 3. **Error Handling:** Run failures, invariant violations and precondition errors.
//! 4. **Serialization:** Durations reported as integral nanoseconds.

/// Line address type definition.
pub mod addr;

/// Hardware geometry constants.
pub mod constants;

/// Error types.
pub mod error;

/// Serde helpers for nanosecond durations.
pub mod nanos;

pub use addr::LineAddr;
pub use error::{EvictionError, InvariantViolation};
