use crate::{PageSize, Size4K, align_down};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// Carries the *kind* of address at the type level so physical and virtual
/// values cannot be mixed. No alignment is implied.
///
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0010_2042);
/// assert_eq!(pa.page_base::<Size4K>().as_u64(), 0x0010_2000);
/// assert_eq!(pa.page_offset::<Size4K>(), 0x42);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
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

    /// Builds the base address of the frame with the given number.
    #[inline]
    #[must_use]
    pub const fn from_frame_number(pfn: u64) -> Self {
        Self(pfn << Size4K::SHIFT)
    }

    /// The 4 KiB frame number, i.e. the address shifted right by 12.
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> u64 {
        self.0 >> Size4K::SHIFT
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
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_number_shifts_by_twelve() {
        let pa = PhysicalAddress::new(0x0000_0012_3456_7000);
        assert_eq!(pa.frame_number(), 0x0123_4567);
        assert_eq!(PhysicalAddress::from_frame_number(0x0123_4567), pa);
    }

    #[test]
    fn formats_like_a_tagged_hex_value() {
        let pa = PhysicalAddress::new(0x1000);
        assert_eq!(format!("{pa:?}"), "PA(0x0000000000001000)");
        assert_eq!(format!("{pa}"), "0x0000000000001000");
    }
}
