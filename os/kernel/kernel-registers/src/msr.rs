//! # Model-Specific Registers

/// Identifies a model-specific register by its architectural index.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Msr(pub u32);

impl Msr {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Writes a 64-bit value with `wrmsr`.
    ///
    /// # Safety
    /// Ring 0 only. The MSR must exist and accept `val`, otherwise the CPU
    /// raises `#GP(0)`.
    #[cfg(feature = "asm")]
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn store_raw(self, val: u64) {
        let lo = (val & 0xFFFF_FFFF) as u32;
        let hi = (val >> 32) as u32;
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") self.raw(),
                in("eax") lo,
                in("edx") hi,
                options(nostack, preserves_flags)
            );
        }
    }

    /// Reads a 64-bit value with `rdmsr`.
    ///
    /// # Safety
    /// Ring 0 only. The MSR must exist.
    #[cfg(feature = "asm")]
    #[inline]
    pub unsafe fn load_raw(self) -> u64 {
        let lo: u32;
        let hi: u32;
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") self.raw(),
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        (u64::from(hi) << 32) | u64::from(lo)
    }
}
