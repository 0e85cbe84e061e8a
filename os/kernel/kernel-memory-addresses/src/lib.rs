//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses used in paging and
//! memory management code.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | Physical memory, e.g. a frame handed out by the frame allocator. |
//! | [`VirtualAddress`] | Memory as seen through the page tables. |
//! | [`TableLevel`] | One of the four levels of the x86-64 page-table radix tree. |
//!
//! ## Virtual address layout
//!
//! ```text
//! 63        48 47     39 38     30 29     21 20     12 11          0
//! +-----------+---------+---------+---------+---------+-------------+
//! | sign ext. |   L4    |   L3    |   L2    |   L1    |   offset    |
//! +-----------+---------+---------+---------+---------+-------------+
//! ```
//!
//! Each index is 9 bits wide and selects one of 512 entries. Physical frame
//! numbers are stored in entries shifted right by 12 bits.
//!
//! ## Page Sizes
//!
//! - [`Size4K`]: 4 KiB pages (base granularity)
//! - [`Size2M`]: 2 MiB large pages
//! - [`Size1G`]: 1 GiB large pages
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x5000_4123);
//! assert_eq!(va.page_base::<Size4K>().as_u64(), 0x5000_4000);
//! assert!(!va.is_aligned::<Size4K>());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod virtual_address;

pub use page_size::{PageSize, Size1G, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// A level of the four-level page-table tree, root first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    /// Page map level 4 (root).
    L4,
    /// Page directory pointer table.
    L3,
    /// Page directory.
    L2,
    /// Page table (leaf level for 4 KiB pages).
    L1,
}

impl TableLevel {
    /// All levels in walk order.
    pub const WALK: [Self; 4] = [Self::L4, Self::L3, Self::L2, Self::L1];

    /// Bit position of this level's index within a virtual address.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::L4 => 39,
            Self::L3 => 30,
            Self::L2 => 21,
            Self::L1 => 12,
        }
    }

    /// The next level towards the leaves, if any.
    #[inline]
    #[must_use]
    pub const fn next_lower(self) -> Option<Self> {
        match self {
            Self::L4 => Some(Self::L3),
            Self::L3 => Some(Self::L2),
            Self::L2 => Some(Self::L1),
            Self::L1 => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L4 => "PML4",
            Self::L3 => "PDPT",
            Self::L2 => "PD",
            Self::L1 => "PT",
        }
    }
}

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0x1234, 0x1000), 0x1000);
/// assert_eq!(align_down(0x2000, 0x1000), 0x2000);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a power of two.
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0x1234, 0x1000), 0x2000);
/// assert_eq!(align_up(0x2000, 0x1000), 0x2000);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_order_descends_to_leaf() {
        let mut level = Some(TableLevel::L4);
        let mut seen = Vec::new();
        while let Some(l) = level {
            seen.push(l);
            level = l.next_lower();
        }
        assert_eq!(seen, TableLevel::WALK);
    }

    #[test]
    fn shifts_are_nine_bits_apart() {
        for pair in TableLevel::WALK.windows(2) {
            assert_eq!(pair[0].shift() - pair[1].shift(), 9);
        }
        assert_eq!(TableLevel::L1.shift(), Size4K::SHIFT);
    }
}
