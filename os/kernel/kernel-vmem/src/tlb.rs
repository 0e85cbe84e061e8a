use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Invalidation of cached translations.
pub trait Tlb {
    /// Drops the cached translation for the page containing `va`.
    fn invalidate_page(&self, va: VirtualAddress);

    /// Reloads the root register with `root`, flushing all non-global
    /// translations.
    fn reload_root(&self, root: PhysicalAddress);
}

/// The executing CPU's TLB.
#[derive(Copy, Clone, Debug, Default)]
pub struct CpuTlb;

impl Tlb for CpuTlb {
    #[inline]
    fn invalidate_page(&self, va: VirtualAddress) {
        unsafe {
            core::arch::asm!("invlpg [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
        }
    }

    #[inline]
    fn reload_root(&self, root: PhysicalAddress) {
        use kernel_registers::{StoreRegisterUnsafe, cr3::Cr3};
        unsafe { Cr3::from_pml4_phys(root).store_unsafe() }
    }
}
