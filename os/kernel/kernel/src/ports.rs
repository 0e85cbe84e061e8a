//! # x86 I/O port access
//!
//! Thin wrappers around `in`/`out` for the legacy devices the kernel drives
//! directly: the 8259 PICs (`0x20`, `0xA0`) and the PS/2 keyboard controller
//! (`0x60`).
//!
//! All functions are `unsafe`: they must run at CPL0, and the caller must
//! own the device behind `port`.

/// Write one byte to an I/O port.
///
/// # Safety
/// Ring 0 only; `port` must belong to a device the caller controls.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port.
///
/// # Safety
/// Ring 0 only; `port` must belong to a device the caller controls.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Gives slow devices time to settle between commands.
///
/// # Safety
/// Ring 0 only.
#[inline]
pub unsafe fn io_wait() {
    // port 0x80 is the POST diagnostic port; writes are harmless
    unsafe { outb(0x80, 0) }
}
