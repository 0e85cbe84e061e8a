//! # Kernel Entry Point
//!
//! Boots from Limine into [`init::kmain`], prepares the CPU and memory, and
//! runs the `init` boot module in ring 3. From then on the kernel only
//! runs on behalf of interrupts and system calls.
//!
//! Hosted builds compile to an empty program so the workspace tests can
//! build every member.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]
#![allow(unsafe_code)]

mod boot;
mod gdt;
mod init;
mod interrupts;
mod pic;
mod ports;
mod state;
mod userland;

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    // straight to the sink; the logger may not be up yet
    kernel_console::kprintln!("Kernel panic: {info}");
    interrupts::halt_forever()
}

#[cfg(not(target_os = "none"))]
fn main() {}
