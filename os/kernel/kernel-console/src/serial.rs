//! 16550 UART on COM1, polled. 115200 baud, 8N1.

use crate::port::Port;

const COM1: Port = Port(0x3F8);

const DATA: Port = COM1.at(0);
/// Also the divisor high byte while DLAB is set.
const INTERRUPT_ENABLE: Port = COM1.at(1);
const FIFO_CONTROL: Port = COM1.at(2);
const LINE_CONTROL: Port = COM1.at(3);
const MODEM_CONTROL: Port = COM1.at(4);
const LINE_STATUS: Port = COM1.at(5);

/// Divisor latch access bit in the line control register.
const DLAB: u8 = 0x80;
const EIGHT_N_ONE: u8 = 0x03;
/// Enable and clear both FIFOs, 14-byte threshold.
const FIFO_ENABLE_CLEAR: u8 = 0xC7;
/// DTR, RTS, OUT2
const MODEM_READY: u8 = 0x0B;
const TX_EMPTY: u8 = 1 << 5;

/// Programs COM1. Must run before the first [`write`].
///
/// # Safety
/// Ring 0 only. Nothing else may drive COM1.
pub unsafe fn init() {
    unsafe {
        INTERRUPT_ENABLE.write(0);
        LINE_CONTROL.write(DLAB);
        // divisor 1: 115200 baud
        DATA.write(1);
        INTERRUPT_ENABLE.write(0);
        LINE_CONTROL.write(EIGHT_N_ONE);
        FIFO_CONTROL.write(FIFO_ENABLE_CLEAR);
        MODEM_CONTROL.write(MODEM_READY);
    }
}

fn put(byte: u8) {
    // SAFETY: COM1 registers only; `init` has configured the port.
    unsafe {
        while LINE_STATUS.read() & TX_EMPTY == 0 {
            core::hint::spin_loop();
        }
        DATA.write(byte);
    }
}

/// Output sink for COM1. Line feeds are sent as CR LF.
pub fn write(bytes: &[u8]) {
    for &b in bytes {
        if b == b'\n' {
            put(b'\r');
        }
        put(b);
    }
}
