use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// CR3 with PCID disabled.
///
/// Holds the physical base of the root (level 4) page table. Writing CR3
/// flushes all non-global TLB entries.
#[bitfield(u64)]
pub struct Cr3 {
    #[bits(3)]
    reserved0: u8,

    /// Bit 3: PWT: Page-level Write-Through for root table accesses.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for root table accesses.
    pub pcd: bool,

    #[bits(7)]
    reserved1: u8,

    /// Bits 12–51: root table physical base >> 12.
    #[bits(40)]
    pml4_base_4k: u64,

    #[bits(12)]
    reserved2: u16,
}

impl Cr3 {
    /// `pml4_phys` must be 4 KiB-aligned.
    #[must_use]
    pub fn from_pml4_phys(pml4_phys: PhysicalAddress) -> Self {
        debug_assert_eq!(
            pml4_phys.as_u64() & 0xFFF,
            0,
            "PML4 base must be 4K-aligned"
        );
        Self::new().with_pml4_base_4k(pml4_phys.frame_number())
    }

    /// Physical address of the root table, flags stripped.
    #[must_use]
    pub const fn pml4_phys(&self) -> PhysicalAddress {
        PhysicalAddress::from_frame_number(self.pml4_base_4k())
    }
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}
