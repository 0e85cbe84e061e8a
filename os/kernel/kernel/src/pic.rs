//! 8259 programmable interrupt controllers.
//!
//! Both controllers are remapped so IRQ 0..15 arrive on vectors
//! [`PIC1_OFFSET`]`..`[`PIC2_OFFSET`]` + 8`, clear of the CPU exceptions.
//! All lines start masked; drivers unmask what they handle.

use crate::ports::{inb, io_wait, outb};
use kernel_interrupts::vectors::{PIC1_OFFSET, PIC2_OFFSET};

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x10;
const ICW1_ICW4: u8 = 0x01;
const ICW4_8086: u8 = 0x01;
/// Secondary controller hangs off IRQ 2.
const CASCADE_IRQ: u8 = 2;

const EOI: u8 = 0x20;

/// The PS/2 keyboard line.
pub const KEYBOARD_IRQ: u8 = 1;

/// Reinitializes both controllers with the kernel's vector offsets and masks
/// every line except the cascade.
///
/// # Safety
/// Ring 0, interrupts disabled.
pub unsafe fn remap() {
    unsafe {
        outb(PIC1_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();
        outb(PIC2_COMMAND, ICW1_INIT | ICW1_ICW4);
        io_wait();

        outb(PIC1_DATA, PIC1_OFFSET);
        io_wait();
        outb(PIC2_DATA, PIC2_OFFSET);
        io_wait();

        outb(PIC1_DATA, 1 << CASCADE_IRQ);
        io_wait();
        outb(PIC2_DATA, CASCADE_IRQ);
        io_wait();

        outb(PIC1_DATA, ICW4_8086);
        io_wait();
        outb(PIC2_DATA, ICW4_8086);
        io_wait();

        outb(PIC1_DATA, !(1 << CASCADE_IRQ));
        outb(PIC2_DATA, 0xFF);
    }
    log::debug!("PIC remapped to {PIC1_OFFSET:#x}/{PIC2_OFFSET:#x}, all lines masked");
}

const fn line(irq: u8) -> (u16, u8) {
    if irq < 8 {
        (PIC1_DATA, irq)
    } else {
        (PIC2_DATA, irq - 8)
    }
}

/// Lets `irq` through.
pub fn unmask(irq: u8) {
    let (port, bit) = line(irq);
    // SAFETY: read-modify-write of the interrupt mask register only.
    unsafe {
        let mask = inb(port) & !(1 << bit);
        outb(port, mask);
    }
}

/// Acknowledges `irq` so the controller delivers the next one.
pub fn end_of_interrupt(irq: u8) {
    // SAFETY: writing EOI has no effect beyond acknowledging the interrupt.
    unsafe {
        if irq >= 8 {
            outb(PIC2_COMMAND, EOI);
        }
        outb(PIC1_COMMAND, EOI);
    }
}
