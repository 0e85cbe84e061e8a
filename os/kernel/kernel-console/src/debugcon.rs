//! QEMU debug console (`-debugcon`), I/O port `0x402`.

use crate::port::Port;

const QEMU_DEBUG_PORT: Port = Port(0x402);

/// Output sink writing every byte to the debug port.
pub fn write(bytes: &[u8]) {
    for &b in bytes {
        // SAFETY: the debug port has no side effects beyond emitting the byte.
        unsafe { QEMU_DEBUG_PORT.write(b) }
    }
}
