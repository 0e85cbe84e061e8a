use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use crate::msr::Msr;
use bitfield_struct::bitfield;

/// `IA32_EFER` (MSR `0xC000_0080`).
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0: SCE: `SYSCALL`/`SYSRET` enable.
    pub sce: bool,

    #[bits(7)]
    reserved0: u8,

    /// Bit 8: LME: Long Mode Enable.
    pub lme: bool,

    #[bits(access = RO)]
    reserved1: bool,

    /// Bit 10: LMA: Long Mode Active (read-only).
    pub lma: bool,

    /// Bit 11: NXE: No-Execute Enable.
    ///
    /// Without it, bit 63 of a page-table entry is reserved and setting it
    /// raises a reserved-bit page fault.
    pub nxe: bool,

    /// Bit 12: SVME: Secure Virtual Machine Enable.
    pub svme: bool,

    /// Bit 13: LMSLE: Long Mode Segment Limit Enable.
    pub lmsle: bool,

    /// Bit 14: FFXSR: Fast `FXSAVE`/`FXRSTOR`.
    pub ffxsr: bool,

    /// Bit 15: TCE: Translation Cache Extension.
    pub tce: bool,

    #[bits(48, access = RO)]
    reserved2: u64,
}

impl Efer {
    pub const MSR_EFER: Msr = Msr(0xC000_0080);
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        Self::from_bits(unsafe { Self::MSR_EFER.load_raw() })
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Efer {
    unsafe fn store_unsafe(self) {
        unsafe { Self::MSR_EFER.store_raw(self.into_bits()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nxe_is_bit_11() {
        assert_eq!(Efer::new().with_nxe(true).into_bits(), 1 << 11);
    }

    #[test]
    fn long_mode_bits_decode() {
        // LMA | LME | SCE
        let efer = Efer::from_bits(0x501);
        assert!(efer.sce());
        assert!(efer.lme());
        assert!(efer.lma());
        assert!(!efer.nxe());
    }
}
