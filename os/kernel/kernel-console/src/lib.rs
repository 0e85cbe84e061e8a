//! # Kernel console
//!
//! All kernel text output funnels through one *output sink*: a function
//! taking a byte slice, installed once during boot.
//!
//! ```text
//! kprint!/kprintln! ─┐
//!                    ├──► Console ──► sink(&[u8]) ──► terminal
//! log::info!, ... ───┘    (ConsoleLogger)
//! ```
//!
//! Output produced before a sink is installed is dropped.
//!
//! ## Built-in sinks
//! [`serial::write`] drives COM1. With the `qemu` feature, [`debugcon::write`]
//! is a ready-made sink for QEMU's debug console on port `0x402`
//! (`-debugcon stdio`).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod console;
mod logger;
mod port;

#[cfg(feature = "qemu")]
pub mod debugcon;
pub mod serial;

pub use crate::console::{CONSOLE, Console, ConsoleWriter, OutputSink, SinkAlreadyInstalled};
pub use crate::logger::ConsoleLogger;

/// Installs the kernel-wide output sink.
///
/// # Errors
/// [`SinkAlreadyInstalled`] on every call after the first.
pub fn install_sink(sink: OutputSink) -> Result<(), SinkAlreadyInstalled> {
    CONSOLE.install(sink)
}

#[doc(hidden)]
pub fn _print(args: core::fmt::Arguments) {
    CONSOLE.write_fmt(args);
}

/// Formatted output to the kernel console.
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::_print(core::format_args!($($arg)*));
    }};
}

/// Formatted output to the kernel console, followed by a newline.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::kprint!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::_print(core::format_args!("{}\n", core::format_args!($($arg)*)));
    }};
}
