//! Ordered IDT bring-up.
//!
//! ```text
//! Uninitialized ─zero─► Zeroed ─exceptions─► Exceptions ─syscall─► Syscall
//!                                                                     │
//!              Installed ◄─install/finish── Irq ◄─hardware_irq────────┘
//! ```
//!
//! Every transition checks the current stage, so skipping or repeating a
//! step is an [`IdtSetupError`] instead of a half-filled table.

use crate::gate::GateType;
use crate::idt::Idt;
use crate::vectors;
use log::debug;

/// How a vector is entered and who may raise it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandlerKind {
    /// CPU exception that pushes an error code.
    FaultWithErrorCode,
    /// CPU exception without an error code.
    Fault,
    /// Interrupt controller line.
    HardwareIrq,
    /// `int n` issued by user code.
    SoftwareTrap,
}

impl HandlerKind {
    /// Kind of a CPU exception vector.
    #[must_use]
    pub const fn for_exception(vector: u8) -> Self {
        if vectors::has_error_code(vector) {
            Self::FaultWithErrorCode
        } else {
            Self::Fault
        }
    }

    /// Software traps keep `IF` as it was, everything else masks it.
    #[must_use]
    pub const fn gate_type(self) -> GateType {
        match self {
            Self::SoftwareTrap => GateType::TrapGate,
            Self::FaultWithErrorCode | Self::Fault | Self::HardwareIrq => GateType::InterruptGate,
        }
    }

    /// Only software traps are reachable from ring 3.
    #[must_use]
    pub const fn dpl(self) -> u8 {
        match self {
            Self::SoftwareTrap => 3,
            Self::FaultWithErrorCode | Self::Fault | Self::HardwareIrq => 0,
        }
    }
}

/// Progress of an [`IdtSetup`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum SetupStage {
    Uninitialized,
    Zeroed,
    Exceptions,
    Syscall,
    Irq,
    Installed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum IdtSetupError {
    #[error("IDT setup step needs stage {expected:?}, table is at {found:?}")]
    OutOfOrder {
        expected: SetupStage,
        found: SetupStage,
    },
    #[error("vector {0} is reserved for CPU exceptions")]
    ReservedVector(u8),
}

/// Drives one [`Idt`] through the bring-up stages.
pub struct IdtSetup<'a> {
    idt: &'a mut Idt,
    selector: u16,
    stage: SetupStage,
}

impl<'a> IdtSetup<'a> {
    /// Starts setup of `idt`; every gate will use the code segment `selector`.
    pub const fn new(idt: &'a mut Idt, selector: u16) -> Self {
        Self {
            idt,
            selector,
            stage: SetupStage::Uninitialized,
        }
    }

    pub const fn stage(&self) -> SetupStage {
        self.stage
    }

    pub const fn idt(&self) -> &Idt {
        self.idt
    }

    /// Writes one present gate for a handler of the given kind.
    pub fn register(&mut self, vector: u8, kind: HandlerKind, handler: u64) {
        self.idt
            .set_handler(vector, handler, self.selector, kind.gate_type())
            .dpl(kind.dpl())
            .present(true);
    }

    fn advance(&mut self, expected: SetupStage, next: SetupStage) -> Result<(), IdtSetupError> {
        if self.stage != expected {
            return Err(IdtSetupError::OutOfOrder {
                expected,
                found: self.stage,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Clears all 256 gates.
    pub fn zero(&mut self) -> Result<(), IdtSetupError> {
        self.advance(SetupStage::Uninitialized, SetupStage::Zeroed)?;
        self.idt.clear();
        Ok(())
    }

    /// Installs the fatal handlers for vectors `0..22`, indexed by vector.
    pub fn exceptions(
        &mut self,
        handlers: &[u64; vectors::EXCEPTION_COUNT],
    ) -> Result<(), IdtSetupError> {
        self.advance(SetupStage::Zeroed, SetupStage::Exceptions)?;
        for (vector, &handler) in (0u8..).zip(handlers) {
            self.register(vector, HandlerKind::for_exception(vector), handler);
        }
        debug!("IDT: {} exception gates installed", handlers.len());
        Ok(())
    }

    /// Installs the user-callable system call gate at `0x80`.
    pub fn syscall(&mut self, handler: u64) -> Result<(), IdtSetupError> {
        self.advance(SetupStage::Exceptions, SetupStage::Syscall)?;
        self.register(vectors::SYSCALL, HandlerKind::SoftwareTrap, handler);
        Ok(())
    }

    /// Installs a hardware IRQ gate and then runs `unmask` to enable the line
    /// at the interrupt controller.
    pub fn hardware_irq(
        &mut self,
        vector: u8,
        handler: u64,
        unmask: impl FnOnce(),
    ) -> Result<(), IdtSetupError> {
        if (vector as usize) < vectors::EXCEPTION_COUNT {
            return Err(IdtSetupError::ReservedVector(vector));
        }
        self.advance(SetupStage::Syscall, SetupStage::Irq)?;
        self.register(vector, HandlerKind::HardwareIrq, handler);
        unmask();
        Ok(())
    }

    /// Completes setup without touching the CPU and hands back the table.
    pub fn finish(mut self) -> Result<&'a Idt, IdtSetupError> {
        self.advance(SetupStage::Irq, SetupStage::Installed)?;
        Ok(self.idt)
    }
}

impl IdtSetup<'static> {
    /// Completes setup and loads the table with `lidt`.
    ///
    /// # Safety
    /// See [`Idt::load`]: every registered handler address must be a valid
    /// entry point and the selector a valid kernel code segment.
    #[cfg(feature = "asm")]
    pub unsafe fn install(self) -> Result<&'static Idt, IdtSetupError> {
        let idt = self.finish()?;
        unsafe { idt.load() };
        log::info!("IDT loaded ({} gates present)", idt.present_vectors().count());
        Ok(idt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::{KEYBOARD, PAGE_FAULT, SYSCALL};
    use core::cell::Cell;

    const SELECTOR: u16 = 0x08;

    fn exception_handlers() -> [u64; vectors::EXCEPTION_COUNT] {
        core::array::from_fn(|v| 0xFFFF_8000_0000_1000 + 0x10 * v as u64)
    }

    #[test]
    fn full_sequence_populates_exactly_the_expected_vectors() {
        let mut idt = Box::new(Idt::new());
        let unmasked = Cell::new(false);
        let mut setup = IdtSetup::new(&mut idt, SELECTOR);

        setup.zero().unwrap();
        setup.exceptions(&exception_handlers()).unwrap();
        setup.syscall(0xFFFF_8000_0000_2000).unwrap();
        setup
            .hardware_irq(KEYBOARD, 0xFFFF_8000_0000_3000, || unmasked.set(true))
            .unwrap();
        let idt = setup.finish().unwrap();

        assert!(unmasked.get());
        let present: Vec<u8> = idt.present_vectors().collect();
        let mut expected: Vec<u8> = (0..22).collect();
        expected.extend([KEYBOARD, SYSCALL]);
        assert_eq!(present, expected);

        let pf = idt[PAGE_FAULT as usize];
        assert_eq!(pf.handler(), 0xFFFF_8000_0000_10E0);
        assert_eq!(pf.attributes().into_bits(), 0x8E00);

        let sys = idt[SYSCALL as usize];
        assert_eq!(sys.attributes().into_bits(), 0xEF00);
        assert_eq!(sys.selector(), SELECTOR);

        assert_eq!(idt[KEYBOARD as usize].attributes().into_bits(), 0x8E00);
    }

    #[test]
    fn zeroing_wipes_stale_gates() {
        let mut idt = Box::new(Idt::new());
        idt[200].set_handler(0xDEAD, SELECTOR).present(true);
        let mut setup = IdtSetup::new(&mut idt, SELECTOR);
        setup.zero().unwrap();
        assert_eq!(setup.idt().present_vectors().count(), 0);
    }

    #[test]
    fn steps_out_of_order_are_rejected() {
        let mut idt = Box::new(Idt::new());
        let mut setup = IdtSetup::new(&mut idt, SELECTOR);

        assert_eq!(
            setup.syscall(0x1000),
            Err(IdtSetupError::OutOfOrder {
                expected: SetupStage::Exceptions,
                found: SetupStage::Uninitialized,
            })
        );
        setup.zero().unwrap();
        assert_eq!(
            setup.zero(),
            Err(IdtSetupError::OutOfOrder {
                expected: SetupStage::Uninitialized,
                found: SetupStage::Zeroed,
            })
        );
        assert_eq!(setup.stage(), SetupStage::Zeroed);
        assert!(setup.finish().is_err());
    }

    #[test]
    fn irq_cannot_take_an_exception_vector() {
        let mut idt = Box::new(Idt::new());
        let mut setup = IdtSetup::new(&mut idt, SELECTOR);
        setup.zero().unwrap();
        setup.exceptions(&exception_handlers()).unwrap();
        setup.syscall(0x1000).unwrap();

        let mut called = false;
        assert_eq!(
            setup.hardware_irq(PAGE_FAULT, 0x2000, || called = true),
            Err(IdtSetupError::ReservedVector(PAGE_FAULT))
        );
        assert!(!called);
        assert_eq!(setup.stage(), SetupStage::Syscall);
    }

    #[test]
    fn handler_kinds() {
        assert_eq!(HandlerKind::for_exception(14), HandlerKind::FaultWithErrorCode);
        assert_eq!(HandlerKind::for_exception(0), HandlerKind::Fault);
        assert_eq!(HandlerKind::SoftwareTrap.gate_type(), GateType::TrapGate);
        assert_eq!(HandlerKind::HardwareIrq.gate_type(), GateType::InterruptGate);
        assert_eq!(HandlerKind::SoftwareTrap.dpl(), 3);
        assert_eq!(HandlerKind::FaultWithErrorCode.dpl(), 0);
    }
}
