//! One 16-byte gate descriptor and its attribute word.

use bitfield_struct::bitfield;

/// Two bytes of an IDT entry that pack:
///
/// - **low byte**: `IST` (3 bits) + 5 reserved zero bits
/// - **high byte**: `| P | DPL(2) | S(0) | Type(4) |`
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct IdtGateAttr {
    /// **IST**: Interrupt Stack Table index (0 disables IST switching).
    #[bits(3)]
    pub ist: u8,

    /// Must be zero (hardware-reserved).
    #[bits(5)]
    __zero0: u8,

    /// **Type**: 0xE = *Interrupt gate*, 0xF = *Trap gate*.
    #[bits(4)]
    pub typ: u8,

    /// **S**: System bit (must be `0` for interrupt/trap gates).
    #[bits(1)]
    pub s: bool,

    /// **DPL**: Descriptor Privilege Level (0..=3).
    ///
    /// To allow invocation from user mode via `int n`, set DPL to `3`.
    #[bits(2)]
    pub dpl: u8,

    /// **P**: Present bit. Must be `1` for a valid entry.
    #[bits(1)]
    pub present: bool,
}

impl IdtGateAttr {
    pub const INTERRUPT_GATE: u8 = 0xE;
    pub const TRAP_GATE: u8 = 0xF;

    /// **Interrupt Gate** (type 0xE, S=0).
    #[inline]
    #[must_use]
    pub const fn interrupt_gate() -> Self {
        Self::new().with_typ(Self::INTERRUPT_GATE).with_s(false)
    }

    /// **Trap Gate** (type 0xF, S=0).
    #[inline]
    #[must_use]
    pub const fn trap_gate() -> Self {
        Self::new().with_typ(Self::TRAP_GATE).with_s(false)
    }

    /// The gate kind, if the type field holds one.
    #[must_use]
    pub const fn gate_type(&self) -> Option<GateType> {
        match self.typ() {
            Self::INTERRUPT_GATE => Some(GateType::InterruptGate),
            Self::TRAP_GATE => Some(GateType::TrapGate),
            _ => None,
        }
    }
}

/// Gate kinds supported by this IDT.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GateType {
    /// Masks further maskable interrupts upon entry (clears `IF`).
    InterruptGate,
    /// Leaves `IF` unchanged.
    TrapGate,
}

/// One **16-byte** x86-64 IDT gate descriptor.
///
/// ```text
///  15           0 31          16 47          32 63          48
/// +--------------+--------------+--------------+--------------+
/// | offset[15:0] |   selector   |  attributes  | offset[31:16]|
/// +--------------+--------------+--------------+--------------+
/// 95                          64 127                        96
/// +-----------------------------+-----------------------------+
/// |        offset[63:32]        |            zero             |
/// +-----------------------------+-----------------------------+
/// ```
#[repr(C)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct IdtEntry {
    offset_lo: u16,
    selector: u16,
    /// Manipulated through [`IdtGateAttr`].
    ist_type: u16,
    offset_mid: u16,
    offset_hi: u32,
    zero: u32,
}

const _: () = assert!(size_of::<IdtEntry>() == 16);

impl IdtEntry {
    /// A zeroed, non-present entry.
    pub const MISSING: Self = Self {
        offset_lo: 0,
        selector: 0,
        ist_type: IdtGateAttr::new().into_bits(),
        offset_mid: 0,
        offset_hi: 0,
        zero: 0,
    };

    /// Store the handler address and code selector and return a builder.
    ///
    /// The entry defaults to a non-present interrupt gate with DPL 0 and no
    /// IST; call [`IdtEntryBuilder::present`] when it is ready.
    pub const fn set_handler(&mut self, handler: u64, selector: u16) -> IdtEntryBuilder<'_> {
        self.offset_lo = (handler & 0xFFFF) as u16;
        self.offset_mid = ((handler >> 16) & 0xFFFF) as u16;
        self.offset_hi = (handler >> 32) as u32;
        self.selector = selector;
        self.zero = 0;
        self.ist_type = IdtGateAttr::interrupt_gate()
            .with_present(false)
            .with_dpl(0)
            .with_ist(0)
            .into_bits();

        IdtEntryBuilder { entry: self }
    }

    /// The reassembled 64-bit handler address.
    #[must_use]
    pub const fn handler(&self) -> u64 {
        (self.offset_lo as u64) | ((self.offset_mid as u64) << 16) | ((self.offset_hi as u64) << 32)
    }

    #[must_use]
    pub const fn selector(&self) -> u16 {
        self.selector
    }

    #[must_use]
    pub const fn attributes(&self) -> IdtGateAttr {
        IdtGateAttr::from_bits(self.ist_type)
    }

    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.attributes().present()
    }

    /// The descriptor exactly as the CPU reads it.
    #[must_use]
    pub const fn into_bits(self) -> u128 {
        let low = (self.offset_lo as u64)
            | ((self.selector as u64) << 16)
            | ((self.ist_type as u64) << 32)
            | ((self.offset_mid as u64) << 48);
        let high = (self.offset_hi as u64) | ((self.zero as u64) << 32);
        ((high as u128) << 64) | low as u128
    }
}

impl core::fmt::Debug for IdtEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let attr = self.attributes();
        f.debug_struct("IdtEntry")
            .field("handler", &format_args!("{:#018x}", self.handler()))
            .field("selector", &format_args!("{:#06x}", self.selector))
            .field("type", &attr.gate_type())
            .field("dpl", &attr.dpl())
            .field("present", &attr.present())
            .finish()
    }
}

/// Fluent builder for an [`IdtEntry`].
///
/// ```rust
/// use kernel_interrupts::{GateType, IdtEntry};
///
/// let mut entry = IdtEntry::MISSING;
/// entry
///     .set_handler(0xFFFF_8000_0010_2030, 0x08)
///     .dpl(3)
///     .present(true)
///     .gate_type(GateType::TrapGate);
/// assert_eq!(entry.handler(), 0xFFFF_8000_0010_2030);
/// ```
pub struct IdtEntryBuilder<'a> {
    entry: &'a mut IdtEntry,
}

impl IdtEntryBuilder<'_> {
    /// Set the **Present** bit. Must be `true` for a usable gate.
    #[inline]
    pub const fn present(self, p: bool) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_present(p);
        self.entry.ist_type = bf.into_bits();
        self
    }

    /// Set **DPL**, 0..=3. `dpl(3)` lets user mode reach the gate via `int n`.
    #[inline]
    pub fn dpl(self, dpl: u8) -> Self {
        debug_assert!(dpl <= 3);
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_dpl(dpl);
        self.entry.ist_type = bf.into_bits();
        self
    }

    /// Make this an **Interrupt Gate** (type 0xE, `S=0`).
    #[inline]
    pub const fn gate_interrupt(self) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type)
            .with_typ(IdtGateAttr::INTERRUPT_GATE)
            .with_s(false);
        self.entry.ist_type = bf.into_bits();
        self
    }

    /// Make this a **Trap Gate** (type 0xF, `S=0`).
    #[inline]
    pub const fn gate_trap(self) -> Self {
        let bf = IdtGateAttr::from_bits(self.entry.ist_type)
            .with_typ(IdtGateAttr::TRAP_GATE)
            .with_s(false);
        self.entry.ist_type = bf.into_bits();
        self
    }

    #[inline]
    pub const fn gate_type(self, gate_type: GateType) -> Self {
        match gate_type {
            GateType::InterruptGate => self.gate_interrupt(),
            GateType::TrapGate => self.gate_trap(),
        }
    }

    /// Set the **IST** index (0 disables IST switching).
    #[inline]
    pub fn ist(self, idx: u8) -> Self {
        debug_assert!(idx <= 7);
        let bf = IdtGateAttr::from_bits(self.entry.ist_type).with_ist(idx);
        self.entry.ist_type = bf.into_bits();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDLER: u64 = 0xFFFF_8000_0010_2030;

    #[test]
    fn missing_entry_is_all_zero() {
        assert_eq!(IdtEntry::MISSING.into_bits(), 0);
        assert!(!IdtEntry::MISSING.is_present());
    }

    #[test]
    fn kernel_interrupt_gate_encoding() {
        let mut entry = IdtEntry::MISSING;
        entry
            .set_handler(HANDLER, 0x08)
            .present(true)
            .gate_interrupt();

        assert_eq!(entry.attributes().into_bits(), 0x8E00);
        assert_eq!(
            entry.into_bits(),
            0x0000_0000_FFFF_8000_0010_8E00_0008_2030
        );
    }

    #[test]
    fn user_trap_gate_encoding() {
        let mut entry = IdtEntry::MISSING;
        entry
            .set_handler(HANDLER, 0x08)
            .dpl(3)
            .present(true)
            .gate_type(GateType::TrapGate);

        assert_eq!(entry.attributes().into_bits(), 0xEF00);
        assert_eq!(entry.attributes().gate_type(), Some(GateType::TrapGate));
        assert_eq!(
            entry.into_bits(),
            0x0000_0000_FFFF_8000_0010_EF00_0008_2030
        );
    }

    #[test]
    fn handler_address_survives_the_split() {
        let mut entry = IdtEntry::MISSING;
        entry.set_handler(0x0123_4567_89AB_CDEF, 0x28);
        assert_eq!(entry.handler(), 0x0123_4567_89AB_CDEF);
        assert_eq!(entry.selector(), 0x28);
        assert!(!entry.is_present());
    }

    #[test]
    fn ist_lands_in_the_low_byte() {
        let mut entry = IdtEntry::MISSING;
        entry.set_handler(0, 0x08).ist(5).present(true);
        assert_eq!(entry.attributes().into_bits(), 0x8E05);
    }
}
