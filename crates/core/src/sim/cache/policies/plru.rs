//! Bit-based Pseudo-LRU (PLRU) Replacement Policy.
//!
//! Each set keeps one MRU bit per way. An access sets the way's bit; when every
//! bit would be set, all bits except the accessed one are cleared. The victim is
//! the lowest way whose bit is clear.

use super::ReplacementPolicy;

/// PLRU Policy state.
#[derive(Debug, Clone)]
pub struct PlruPolicy {
    /// MRU bits per set.
    usage: Vec<u64>,
    /// Mask with one bit per way.
    all_ways: u64,
}

impl PlruPolicy {
    /// Creates a new PLRU policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity, between 1 and 64.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: vec![0; sets],
            all_ways: u64::MAX >> (64 - ways.clamp(1, 64)),
        }
    }
}

impl ReplacementPolicy for PlruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        let bit = 1u64 << way;
        self.usage[set] |= bit;
        if self.usage[set] & self.all_ways == self.all_ways {
            self.usage[set] = bit;
        }
    }

    fn victim(&mut self, set: usize) -> usize {
        let free = !self.usage[set] & self.all_ways;
        if free == 0 {
            0
        } else {
            free.trailing_zeros() as usize
        }
    }
}
