//! # x86-64 Interrupt Descriptor Table
//!
//! Gate encoding, the 256-entry table and the ordered bring-up that fills it.
//!
//! ```text
//!   0..=21   CPU exceptions       interrupt gate, DPL 0, fatal
//!  32..=47   PIC IRQ 0..15        interrupt gate, DPL 0
//!    0x80    system call          trap gate,      DPL 3
//! ```
//!
//! The crate only describes *what* goes into each slot. The entry points
//! themselves are naked trampolines owned by the kernel binary, which hand
//! a [`TrapFrame`] to ordinary Rust code.
//!
//! ## Acronyms
//! - **IDT**: Interrupt Descriptor Table
//! - **DPL**: Descriptor Privilege Level (0 = kernel … 3 = user)
//! - **IST**: Interrupt Stack Table index into the TSS
//! - **EOI**: End Of Interrupt, acknowledged at the interrupt controller

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod gate;
mod idt;
mod page_fault;
mod setup;
mod trap;
pub mod vectors;

pub use crate::gate::{GateType, IdtEntry, IdtEntryBuilder, IdtGateAttr};
pub use crate::idt::Idt;
pub use crate::page_fault::PageFaultError;
pub use crate::setup::{HandlerKind, IdtSetup, IdtSetupError, SetupStage};
pub use crate::trap::{FatalTrap, TrapFrame};
