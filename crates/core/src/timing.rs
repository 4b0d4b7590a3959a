//! Timing oracle and victim capabilities.
//!
//! The search never reads a clock or touches the victim directly; both are
//! injected so hosts can supply `performance.now()`, `Instant`, or a simulated
//! cycle counter, and tests can supply scripted stubs.
//!
//! Coarse clocks are tolerated. When the resolution exceeds the hit/miss
//! latency gap most deltas collapse to zero and congruent candidates get
//! rejected; that lowers recall but never breaks an invariant.

use std::hint::black_box;
use std::time::{Duration, Instant};

/// A monotonic clock.
pub trait TimingOracle {
    /// Current time since an arbitrary, fixed origin.
    ///
    /// Successive calls within one run must be non-decreasing.
    fn now(&mut self) -> Duration;
}

/// Time between two readings; zero when the readings are out of order.
#[inline]
pub const fn elapsed(before: Duration, after: Duration) -> Duration {
    after.saturating_sub(before)
}

/// The memory access whose latency is being measured.
pub trait Victim {
    /// Performs exactly one access to the victim location.
    fn touch(&mut self);
}

/// Measures one victim touch.
#[inline]
pub fn time_touch<T, V>(clock: &mut T, victim: &mut V) -> Duration
where
    T: TimingOracle + ?Sized,
    V: Victim + ?Sized,
{
    let before = clock.now();
    victim.touch();
    let after = clock.now();
    elapsed(before, after)
}

/// [`TimingOracle`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Starts a clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingOracle for MonotonicClock {
    #[inline]
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// A victim living in its own heap allocation, separate from the eviction buffer.
#[derive(Debug)]
pub struct HeapVictim {
    slot: Box<u32>,
}

impl HeapVictim {
    /// Allocates the victim word.
    pub fn new() -> Self {
        Self { slot: Box::new(0) }
    }

    /// Address of the victim word, for reporting.
    pub fn addr(&self) -> usize {
        std::ptr::from_ref::<u32>(&*self.slot) as usize
    }
}

impl Default for HeapVictim {
    fn default() -> Self {
        Self::new()
    }
}

impl Victim for HeapVictim {
    #[inline]
    fn touch(&mut self) {
        let ptr = black_box(std::ptr::from_ref::<u32>(&*self.slot));
        // SAFETY: `ptr` points into the box owned by `self`, which is live and
        // aligned for the whole call.
        let value = unsafe { std::ptr::read_volatile(ptr) };
        let _ = black_box(value);
    }
}

/// Adapts a closure into a [`Victim`].
#[derive(Debug, Clone)]
pub struct VictimFn<F>(pub F);

impl<F: FnMut()> Victim for VictimFn<F> {
    #[inline]
    fn touch(&mut self) {
        (self.0)();
    }
}

impl<T: TimingOracle + ?Sized> TimingOracle for &mut T {
    #[inline]
    fn now(&mut self) -> Duration {
        (**self).now()
    }
}

impl<V: Victim + ?Sized> Victim for &mut V {
    #[inline]
    fn touch(&mut self) {
        (**self).touch();
    }
}
