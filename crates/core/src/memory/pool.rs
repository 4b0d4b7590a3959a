//! Candidate pool.
//!
//! An ordered collection of line addresses still considered possibly congruent
//! with the victim. Candidates are popped from the back and survivors are
//! pushed to the front, so the pool rotates through every candidate before
//! retesting a confirmed one.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::common::LineAddr;
use crate::config::GeometryConfig;

/// Ordered, mutable set of candidate line addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CandidatePool {
    addrs: VecDeque<LineAddr>,
}

impl CandidatePool {
    /// Creates a pool holding every line of the buffer, ascending.
    pub fn universe(geometry: &GeometryConfig) -> Self {
        geometry.lines().collect()
    }

    /// Number of candidates left.
    #[inline]
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Returns `true` if no candidate is left.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Removes and returns the candidate at the back.
    #[inline]
    pub fn pop(&mut self) -> Option<LineAddr> {
        self.addrs.pop_back()
    }

    /// Reinserts a candidate at the front.
    #[inline]
    pub fn push_front(&mut self, addr: LineAddr) {
        self.addrs.push_front(addr);
    }

    /// Returns the candidate at `index`, counted from the front.
    #[inline]
    pub fn get(&self, index: usize) -> Option<LineAddr> {
        self.addrs.get(index).copied()
    }

    /// Draws a candidate uniformly at random without removing it.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<LineAddr> {
        if self.addrs.is_empty() {
            return None;
        }
        self.get(rng.gen_range(0..self.addrs.len()))
    }

    /// Keeps only the candidates for which `keep` returns `true`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&LineAddr) -> bool) {
        self.addrs.retain(keep);
    }

    /// Permutes the pool uniformly at random.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.addrs.make_contiguous().shuffle(rng);
    }

    /// Iterates front to back.
    pub fn iter(&self) -> impl Iterator<Item = LineAddr> + '_ {
        self.addrs.iter().copied()
    }

    /// Returns the pool front to back as a contiguous vector.
    pub fn to_vec(&self) -> Vec<LineAddr> {
        self.iter().collect()
    }
}

impl FromIterator<LineAddr> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = LineAddr>>(iter: I) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<LineAddr>> for CandidatePool {
    fn from(addrs: Vec<LineAddr>) -> Self {
        Self {
            addrs: addrs.into(),
        }
    }
}
