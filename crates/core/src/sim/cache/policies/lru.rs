//! Least Recently Used (LRU) Replacement Policy.
//!
//! Evicts the line that has gone longest without an access. Each set keeps a
//! recency stack: an access moves the way to the top (MRU), and the bottom of
//! the stack is the victim.
//!
//! Under LRU a line is evicted exactly when `ways` distinct other lines of its
//! set are accessed after it, which makes eviction sets sharply defined.

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Debug, Clone)]
pub struct LruPolicy {
    /// Recency stack per set. Index 0 is MRU, last index is LRU.
    stacks: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Creates a new LRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            stacks: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    /// Moves `way` to the MRU position.
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.stacks[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Returns the way at the bottom of the recency stack.
    fn victim(&mut self, set: usize) -> usize {
        self.stacks[set].last().copied().unwrap_or(0)
    }
}
