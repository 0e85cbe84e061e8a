//! # Direct-map based `PhysMapper`
//!
//! The bootloader maps all physical memory at a fixed virtual offset. The
//! offset is handed over at boot and threaded explicitly to every user
//! instead of living in a global.

use kernel_vmem::{PhysMapper, PhysicalAddress};

/// [`PhysMapper`] that adds a fixed offset to every physical address.
///
/// ```rust
/// use kernel_alloc::DirectMap;
/// use kernel_vmem::{PhysMapper, PhysicalAddress};
///
/// let map = DirectMap::new(0xFFFF_8000_0000_0000);
/// let ptr = map.phys_to_ptr(PhysicalAddress::new(0x1234_0000));
/// assert_eq!(ptr as u64, 0xFFFF_8000_1234_0000);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DirectMap {
    offset: u64,
}

impl DirectMap {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

impl PhysMapper for DirectMap {
    #[inline]
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        self.offset.wrapping_add(pa.as_u64()) as *mut u8
    }
}
