//! Set-Associative Cache Model.
//!
//! A tag-only model of one cache level: it tracks which lines are resident and
//! reports hits and misses, nothing else. Invalid ways are filled before the
//! replacement policy is consulted.

/// Cache replacement policy implementations (FIFO, LRU, PLRU).
pub mod policies;

use self::policies::ReplacementPolicy;
use crate::config::CacheConfig;

/// Cache line entry: the tag of the resident line, if any.
#[derive(Clone, Copy, Debug, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
}

/// Set-associative cache with a configurable replacement policy.
#[derive(Debug)]
pub struct CacheSim {
    lines: Vec<CacheLine>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    policy: Box<dyn ReplacementPolicy>,
    hits: u64,
    misses: u64,
}

impl CacheSim {
    /// Creates an empty cache.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache geometry and policy, already validated.
    pub fn new(config: &CacheConfig) -> Self {
        let ways = config.ways.max(1);
        let num_sets = config.num_sets().max(1);
        Self {
            lines: vec![CacheLine::default(); num_sets * ways],
            num_sets,
            ways,
            line_bytes: config.line_bytes.max(1),
            policy: policies::build(config.policy, num_sets, ways),
            hits: 0,
            misses: 0,
        }
    }

    /// Set index of `addr`.
    pub const fn set_of(&self, addr: u64) -> usize {
        ((addr as usize) / self.line_bytes) % self.num_sets
    }

    /// Tag of `addr`.
    const fn tag_of(&self, addr: u64) -> u64 {
        addr / (self.line_bytes * self.num_sets) as u64
    }

    /// Number of sets.
    pub const fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// Hits and misses served so far.
    pub const fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Checks if the cache holds `addr` without touching replacement state.
    pub fn contains(&self, addr: u64) -> bool {
        let base = self.set_of(addr) * self.ways;
        let tag = self.tag_of(addr);
        self.lines[base..base + self.ways]
            .iter()
            .any(|line| line.valid && line.tag == tag)
    }

    /// Accesses `addr`, installing it on a miss.
    ///
    /// # Returns
    ///
    /// `true` on a hit.
    pub fn access(&mut self, addr: u64) -> bool {
        let set = self.set_of(addr);
        let tag = self.tag_of(addr);
        let base = set * self.ways;
        let ways = &mut self.lines[base..base + self.ways];

        if let Some(way) = ways.iter().position(|l| l.valid && l.tag == tag) {
            self.policy.touch(set, way);
            self.hits += 1;
            return true;
        }

        let way = match ways.iter().position(|l| !l.valid) {
            Some(free) => free,
            None => self.policy.victim(set),
        };
        ways[way] = CacheLine { tag, valid: true };
        self.policy.fill(set, way);
        self.misses += 1;
        false
    }

    /// Invalidates every line. Replacement state is kept.
    pub fn flush(&mut self) {
        self.lines.fill(CacheLine::default());
    }
}
