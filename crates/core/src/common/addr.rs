//! Eviction buffer address type.
//!
//! This module defines the strong type used for every location the search
//! algorithm reasons about. It provides the following:
//! 1. **Type Safety:** Keeps buffer offsets apart from raw words stored in the buffer.
//! 2. **Address Manipulation:** Helpers for line alignment and cache-set index bits.
//! 3. **Buffer Integration:** Acts as the key into the eviction buffer's `next` links.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A byte offset into the eviction buffer marking the start of one line.
///
/// Line addresses are always a multiple of the configured line size. The
/// buffer stores, at each line address, the `LineAddr` of the next line in the
/// active traversal order, so the raw value is kept at 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineAddr(pub u32);

impl LineAddr {
    /// Creates a new line address from a raw byte offset.
    ///
    /// # Arguments
    ///
    /// * `offset` - The byte offset into the eviction buffer.
    ///
    /// # Returns
    ///
    /// A new `LineAddr` wrapping the provided offset.
    #[inline(always)]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Returns the raw byte offset.
    #[inline(always)]
    pub const fn val(self) -> u32 {
        self.0
    }

    /// Returns the index of the 32-bit word holding this line's `next` link.
    #[inline(always)]
    pub const fn word_index(self) -> usize {
        (self.0 / 4) as usize
    }

    /// Extracts the bits selected by `mask`.
    ///
    /// With a cache-set-index mask this yields the part of the address that
    /// decides which hardware cache set the line maps to (line-offset bits
    /// excluded).
    ///
    /// # Arguments
    ///
    /// * `mask` - Bit mask covering the set-index field.
    #[inline(always)]
    pub const fn index_bits(self, mask: u32) -> u32 {
        self.0 & mask
    }

    /// Returns `true` if both addresses agree on the bits selected by `mask`.
    #[inline]
    pub const fn shares_index_with(self, other: Self, mask: u32) -> bool {
        self.index_bits(mask) == other.index_bits(mask)
    }

    /// Returns `true` if the address is aligned to `line_size` bytes.
    #[inline]
    pub const fn is_aligned(self, line_size: u32) -> bool {
        line_size != 0 && self.0 % line_size == 0
    }
}

impl fmt::Display for LineAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<LineAddr> for u64 {
    fn from(addr: LineAddr) -> Self {
        Self::from(addr.0)
    }
}
