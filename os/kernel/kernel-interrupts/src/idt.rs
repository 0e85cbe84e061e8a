use crate::gate::{GateType, IdtEntry, IdtEntryBuilder};
use core::ops::{Index, IndexMut};

const _: () = assert!(align_of::<Idt>() == 16);
const _: () = assert!(size_of::<Idt>() == 256 * 16);

/// A 256-entry **Interrupt Descriptor Table**.
///
/// Use [`Idt::new`] to create a cleared table (all entries non-present),
/// fill entries and finally load it with [`Idt::load`].
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Default for Idt {
    fn default() -> Self {
        Self::new()
    }
}

impl Idt {
    pub const ENTRIES: usize = 256;

    /// A table with all gates marked **not present**.
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::MISSING; Self::ENTRIES],
        }
    }

    /// Mark every gate absent again.
    pub const fn clear(&mut self) {
        self.entries = [IdtEntry::MISSING; Self::ENTRIES];
    }

    /// Write address, selector and gate type of one slot.
    ///
    /// The gate stays non-present at DPL 0; finish it through the returned
    /// builder. Hardware IRQs additionally need unmasking at the interrupt
    /// controller, which this does not touch.
    pub const fn set_handler(
        &mut self,
        vector: u8,
        handler: u64,
        selector: u16,
        gate_type: GateType,
    ) -> IdtEntryBuilder<'_> {
        self.entries[vector as usize]
            .set_handler(handler, selector)
            .gate_type(gate_type)
    }

    /// Vectors whose gate is present.
    pub fn present_vectors(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|&v| self.entries[v as usize].is_present())
    }

    /// Load this IDT into the CPU's **IDTR** using `lidt`.
    ///
    /// # Safety
    /// - Must be called at **CPL0**.
    /// - All **present** entries must reference valid handler code in an
    ///   executable segment.
    /// - If any entry is callable from user mode (DPL=3), the **TSS** `rsp0`
    ///   must point at a valid kernel stack.
    #[cfg(feature = "asm")]
    #[inline]
    pub unsafe fn load(&'static self) {
        let idtr = Idtr {
            limit: (size_of::<Self>() - 1) as u16,
            base: core::ptr::from_ref(self) as u64,
        };
        unsafe {
            core::arch::asm!("lidt [{}]", in(reg) &raw const idtr, options(nostack, preserves_flags, readonly));
        }
    }
}

impl Index<usize> for Idt {
    type Output = IdtEntry;
    fn index(&self, i: usize) -> &Self::Output {
        &self.entries[i]
    }
}

impl IndexMut<usize> for Idt {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.entries[i]
    }
}

/// Operand format used by `lidt` (limit + base).
#[cfg(feature = "asm")]
#[repr(C, packed)]
struct Idtr {
    limit: u16,
    base: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_handler_writes_one_slot() {
        let mut idt = Box::new(Idt::new());
        idt.set_handler(0x21, 0x1000, 0x08, GateType::InterruptGate)
            .present(true);

        assert_eq!(idt.present_vectors().collect::<Vec<_>>(), [0x21]);
        assert_eq!(idt[0x21].handler(), 0x1000);
        assert_eq!(idt[0x21].attributes().gate_type(), Some(GateType::InterruptGate));
    }

    #[test]
    fn clear_drops_every_gate() {
        let mut idt = Box::new(Idt::new());
        for v in [0u8, 14, 0x80] {
            idt.set_handler(v, 0x2000, 0x08, GateType::TrapGate)
                .present(true);
        }
        assert_eq!(idt.present_vectors().count(), 3);
        idt.clear();
        assert_eq!(idt.present_vectors().count(), 0);
    }
}
