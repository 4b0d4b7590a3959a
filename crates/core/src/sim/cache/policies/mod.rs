//! Cache Replacement Policies.
//!
//! Selects which way of a full set is evicted when the simulated cache misses.
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out.
//! - `Lru`: Least Recently Used.
//! - `Plru`: Bit-based pseudo-LRU.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Bit-based pseudo-LRU replacement policy.
pub mod plru;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use plru::PlruPolicy;

use crate::config::ReplacementPolicy as PolicyKind;

/// Trait for cache replacement policies.
///
/// Hits and fills are reported separately so that insertion-order policies
/// can ignore hits.
pub trait ReplacementPolicy: std::fmt::Debug {
    /// Records a hit on `way` of `set`.
    fn touch(&mut self, set: usize, way: usize);

    /// Records that `way` of `set` was just filled with a new line.
    fn fill(&mut self, set: usize, way: usize) {
        self.touch(set, way);
    }

    /// Selects the way of a full `set` to evict.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn victim(&mut self, set: usize) -> usize;
}

/// Builds the policy selected by `kind`.
///
/// # Arguments
///
/// * `kind` - Configured replacement policy.
/// * `sets` - Number of sets in the cache.
/// * `ways` - Associativity; at most 64.
pub fn build(kind: PolicyKind, sets: usize, ways: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyKind::Lru => Box::new(LruPolicy::new(sets, ways)),
        PolicyKind::Fifo => Box::new(FifoPolicy::new(sets, ways)),
        PolicyKind::Plru => Box::new(PlruPolicy::new(sets, ways)),
    }
}
