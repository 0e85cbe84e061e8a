use crate::{PageSize, TableLevel, align_down};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// Does not validate canonicality at runtime. Bits `[47:12]` split into four
/// 9-bit table indices, see [`VirtualAddress::index`].
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x0000_0000_0040_1234);
/// assert_eq!(va.index(TableLevel::L4), 0);
/// assert_eq!(va.index(TableLevel::L2), 2);
/// assert_eq!(va.index(TableLevel::L1), 1);
/// assert_eq!(va.page_offset::<Size4K>(), 0x234);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as u64)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The 9-bit index into the table at `level`.
    #[inline]
    #[must_use]
    pub const fn index(self, level: TableLevel) -> usize {
        ((self.0 >> level.shift()) & 0x1FF) as usize
    }

    #[inline]
    #[must_use]
    pub const fn page_base<S: PageSize>(self) -> Self {
        Self(align_down(self.0, S::SIZE))
    }

    #[inline]
    #[must_use]
    pub const fn page_offset<S: PageSize>(self) -> u64 {
        self.0 & S::OFFSET_MASK
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.page_offset::<S>() == 0
    }

    /// Rebuilds a canonical address from four table indices.
    ///
    /// Bit 47 is sign-extended into `[63:48]`.
    #[must_use]
    pub const fn from_indices(l4: usize, l3: usize, l2: usize, l1: usize) -> Self {
        let raw = ((l4 as u64 & 0x1FF) << 39)
            | ((l3 as u64 & 0x1FF) << 30)
            | ((l2 as u64 & 0x1FF) << 21)
            | ((l1 as u64 & 0x1FF) << 12);
        let canonical = if raw & (1 << 47) != 0 {
            raw | 0xFFFF_0000_0000_0000
        } else {
            raw
        };
        Self(canonical)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 = self.0.wrapping_add(rhs);
    }
}
