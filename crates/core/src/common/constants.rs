//! Hardware geometry constants.
//!
//! Baseline figures for an Intel i7-6600U (Skylake) last-level cache, see
//! <https://en.wikichip.org/wiki/intel/core_i7/i7-6600u>. These seed the
//! configuration defaults; they are never autodetected.
//! 1. **Cache Shape:** LLC size, associativity and set count.
//! 2. **Buffer Shape:** Stride between eviction buffer entries.
//! 3. **Index Field:** Set-index bits reachable from inside one page.

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: u32 = 4096;

/// Size of the last-level cache in bytes (4 MiB).
pub const LLC_SIZE: usize = 1 << 22;

/// Associativity of the last-level cache. Known as `l` in the literature.
pub const LLC_ASSOCIATIVITY: usize = 16;

/// Number of last-level cache sets.
pub const NUM_CACHE_SETS: usize = 4096;

/// Size of a hardware cache line in bytes.
pub const CACHE_LINE_SIZE: u32 = 64;

/// Stride between eviction buffer entries in bytes.
///
/// One 64-bit slot per entry; several entries share one hardware cache line.
pub const BUFFER_LINE_SIZE: usize = 8;

/// Set-index bits that lie inside the page offset (bits 6 to 11).
///
/// Virtual and physical addresses agree on these bits, so congruent addresses
/// must share them even without knowledge of the physical mapping.
pub const SET_INDEX_MASK: u32 = (PAGE_SIZE - 1) & !(CACHE_LINE_SIZE - 1);
