//! Eviction buffer and candidate pool.
//!
//! The eviction buffer emulates the cache working set as a linked traversal
//! structure stored in place: the first word of every line holds the address
//! of the next line. This module provides:
//! 1. **Buffer:** Owned storage, full initialization and relinking over a subset.
//! 2. **Splicing:** Constant-time removal and reinsertion of a single line.
//! 3. **Walks:** Bounded full-cycle traversals that touch every active line.
//! 4. **Access Hooks:** A seam reporting each traversal read to an observer.
//!
//! Invariant: the active lines always form exactly one cycle. Walks are bounded
//! by the buffer's line count so a corrupt structure surfaces as an
//! [`InvariantViolation`] instead of an endless loop.

/// Ordered candidate pool.
pub mod pool;

use std::hint::black_box;

use crate::common::{EvictionError, InvariantViolation, LineAddr};
use crate::config::GeometryConfig;

pub use pool::CandidatePool;

/// Observer notified of every traversal read through [`EvictionBuffer::next`].
///
/// Real hardware needs no observer: the memory access itself is the side
/// effect. The simulated machine implements this to drive its cache model.
/// Link rewrites during splicing and relinking are not reported.
pub trait AccessHook {
    /// Called once per traversal read, before the read completes.
    fn on_access(&self, addr: LineAddr);
}

/// The no-op hook used on real hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untraced;

impl AccessHook for Untraced {
    #[inline(always)]
    fn on_access(&self, _addr: LineAddr) {}
}

/// Owned storage partitioned into fixed-size lines forming one traversal cycle.
#[derive(Debug)]
pub struct EvictionBuffer<H: AccessHook = Untraced> {
    /// Backing storage, one 32-bit word per 4 bytes of buffer.
    words: Box<[u32]>,
    line_size: u32,
    line_count: usize,
    hook: H,
}

impl EvictionBuffer<Untraced> {
    /// Allocates a buffer for real hardware.
    ///
    /// # Arguments
    ///
    /// * `geometry` - Buffer size and line stride.
    ///
    /// # Returns
    ///
    /// The zeroed buffer; call [`initialize`](Self::initialize) before walking it.
    pub fn new(geometry: &GeometryConfig) -> Result<Self, EvictionError> {
        Self::with_hook(geometry, Untraced)
    }
}

impl<H: AccessHook> EvictionBuffer<H> {
    /// Allocates a buffer whose accesses are reported to `hook`.
    ///
    /// # Errors
    ///
    /// Fails with [`EvictionError::InvalidGeometry`] before allocating when the
    /// geometry is unusable.
    pub fn with_hook(geometry: &GeometryConfig, hook: H) -> Result<Self, EvictionError> {
        geometry.validate()?;
        Ok(Self {
            words: vec![0; geometry.llc_size / 4].into_boxed_slice(),
            line_size: geometry.line_size as u32,
            line_count: geometry.line_count(),
            hook,
        })
    }

    /// Number of lines in the buffer.
    #[inline]
    pub const fn line_count(&self) -> usize {
        self.line_count
    }

    /// Stride between lines in bytes.
    #[inline]
    pub const fn line_size(&self) -> u32 {
        self.line_size
    }

    /// Returns the access hook.
    pub const fn hook(&self) -> &H {
        &self.hook
    }

    /// Returns `true` if `addr` is a line start inside the buffer.
    pub const fn contains(&self, addr: LineAddr) -> bool {
        addr.is_aligned(self.line_size) && addr.word_index() < self.words.len()
    }

    /// Links every line to its successor, closing the cycle at the last line.
    ///
    /// Establishes the single ascending cycle over all lines. Idempotent.
    pub fn initialize(&mut self) {
        let stride = self.line_size;
        let n = self.line_count as u32;
        for i in 0..n {
            let addr = LineAddr::new(i * stride);
            let next = LineAddr::new(((i + 1) % n) * stride);
            self.words[addr.word_index()] = next.val();
        }
    }

    /// Rebuilds the cycle over exactly the given lines, in the given order.
    ///
    /// Lines outside `order` keep stale links and must not be walked.
    ///
    /// # Errors
    ///
    /// Returns [`EvictionError::InvalidParameter`] for an empty order or a
    /// misaligned or out-of-range address. Nothing is written in that case.
    pub fn link_cycle(&mut self, order: &[LineAddr]) -> Result<(), EvictionError> {
        if order.is_empty() {
            return Err(EvictionError::invalid_parameter(
                "order",
                "cannot link a cycle over zero lines",
            ));
        }
        if let Some(bad) = order.iter().find(|addr| !self.contains(**addr)) {
            return Err(EvictionError::invalid_parameter(
                "order",
                format!("{bad} is not a line of this buffer"),
            ));
        }
        for (i, addr) in order.iter().enumerate() {
            let next = order[(i + 1) % order.len()];
            self.words[addr.word_index()] = next.val();
        }
        Ok(())
    }

    /// Reads the successor stored at `addr`.
    ///
    /// `addr` must be part of the active cycle; the caller guarantees this by
    /// construction.
    #[inline(always)]
    pub fn next(&self, addr: LineAddr) -> LineAddr {
        debug_assert!(self.contains(addr), "{addr} is not a buffer line");
        self.hook.on_access(addr);
        LineAddr::new(black_box(self.words[black_box(addr.word_index())]))
    }

    /// Reads the successor stored at `addr` without reporting the access.
    #[inline(always)]
    fn link_of(&self, addr: LineAddr) -> LineAddr {
        LineAddr::new(self.words[addr.word_index()])
    }

    /// Overwrites the successor stored at `addr`.
    #[inline(always)]
    fn set_next(&mut self, addr: LineAddr, next: LineAddr) {
        self.words[addr.word_index()] = next.val();
    }

    /// Removes `target` from the cycle by linking `predecessor` past it.
    ///
    /// The caller must have established `next(predecessor) == target`.
    /// `target`'s own link is left untouched so it can be reinserted.
    pub fn splice_out(&mut self, predecessor: LineAddr, target: LineAddr) {
        let after = self.link_of(target);
        self.set_next(predecessor, after);
    }

    /// Reinserts `target` after `predecessor`.
    ///
    /// Exactly undoes [`splice_out`](Self::splice_out) with the same arguments,
    /// provided `target`'s link was not modified in between.
    pub fn splice_in(&mut self, predecessor: LineAddr, target: LineAddr) {
        self.set_next(predecessor, target);
    }

    /// Walks the cycle through `start` once, touching every line on it.
    ///
    /// # Returns
    ///
    /// The number of lines on the cycle.
    ///
    /// # Errors
    ///
    /// [`InvariantViolation::UnterminatedWalk`] if the walk does not return to
    /// `start` within the buffer's line count.
    pub fn walk_cycle(&self, start: LineAddr) -> Result<usize, InvariantViolation> {
        let bound = self.line_count;
        let mut current = start;
        let mut steps = 0;
        loop {
            current = self.next(current);
            steps += 1;
            if current == start {
                return Ok(steps);
            }
            if steps >= bound {
                return Err(InvariantViolation::UnterminatedWalk { start, bound });
            }
        }
    }

    /// Walks the full cycle through `start`, locating the line that links to `target`.
    ///
    /// The walk continues past the predecessor until it is back at `start`,
    /// which confirms the structure is still a single closed cycle.
    ///
    /// # Returns
    ///
    /// The predecessor of `target` and the length of the cycle.
    pub fn find_predecessor(
        &self,
        start: LineAddr,
        target: LineAddr,
    ) -> Result<(LineAddr, usize), InvariantViolation> {
        let bound = self.line_count;
        let mut predecessor = None;
        let mut current = start;
        let mut steps = 0;
        loop {
            let next = self.next(current);
            if next == target {
                predecessor = Some(current);
            }
            current = next;
            steps += 1;
            if current == start {
                break;
            }
            if steps >= bound {
                return Err(InvariantViolation::UnterminatedWalk { start, bound });
            }
        }
        predecessor
            .map(|p| (p, steps))
            .ok_or(InvariantViolation::PredecessorNotFound { target, start })
    }

    /// Collects the cycle through `start` in traversal order.
    ///
    /// Intended for diagnostics and tests; walks like [`walk_cycle`](Self::walk_cycle).
    pub fn cycle_from(&self, start: LineAddr) -> Result<Vec<LineAddr>, InvariantViolation> {
        let bound = self.line_count;
        let mut order = vec![start];
        let mut current = self.next(start);
        while current != start {
            if order.len() >= bound {
                return Err(InvariantViolation::UnterminatedWalk { start, bound });
            }
            order.push(current);
            current = self.next(current);
        }
        Ok(order)
    }
}
