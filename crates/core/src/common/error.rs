//! Error definitions.
//!
//! This module defines every failure the search can report. It provides:
//! 1. **Run Failures:** Terminal outcomes of a run that the caller may retry differently.
//! 2. **Invariant Violations:** Structural corruption of the eviction buffer, always fatal.
//! 3. **Precondition Failures:** Rejected parameters and geometries, raised before any mutation.

use thiserror::Error;

use super::addr::LineAddr;

/// Errors raised by the eviction-set search and its calibration routine.
///
/// Statistical misclassification (accepting a non-congruent candidate or
/// rejecting a congruent one) is not represented here: it is an expected
/// outcome of noisy timing and is tuned through `threshold` and `fuel`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvictionError {
    /// The coarse phase accepted no candidate at all.
    ///
    /// Terminal to the run. Retry with a different threshold or more fuel, or
    /// conclude the victim cannot be distinguished at the current noise level.
    #[error("no congruent address found after {tries} coarse trials")]
    NoCongruentAddressFound {
        /// Trials executed by the coarse phase.
        tries: u32,
    },

    /// The traversal structure stopped being a single well-formed cycle.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// A run parameter was rejected before touching the buffer.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The configured memory geometry cannot describe a usable buffer.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl EvictionError {
    /// Shorthand for an [`EvictionError::InvalidParameter`].
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that indicate a bug rather than a bad run.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Structural faults detected while walking the eviction buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A full walk returned to its start without meeting the target's predecessor.
    #[error("no predecessor of {target} on the cycle through {start}")]
    PredecessorNotFound {
        /// Line whose predecessor was searched for.
        target: LineAddr,
        /// Start of the walk.
        start: LineAddr,
    },

    /// A walk did not return to its start within the buffer's line count.
    #[error("walk from {start} did not close within {bound} steps")]
    UnterminatedWalk {
        /// Start of the walk.
        start: LineAddr,
        /// Maximum number of steps allowed.
        bound: usize,
    },

    /// The cycle through `start` does not contain exactly the active lines.
    #[error("cycle through {start} has {observed} lines, expected {expected}")]
    CycleLengthMismatch {
        /// Start of the walk.
        start: LineAddr,
        /// Number of active lines.
        expected: usize,
        /// Number of lines actually visited.
        observed: usize,
    },
}
