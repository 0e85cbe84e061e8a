//! # User-space support library
//!
//! The `syscall-abi` feature carries the numbers and conventions shared
//! with the kernel. `syscall` adds the `int 0x80` wrappers and `stdlib`
//! the console helpers and `print!` macros for user programs.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(feature = "syscall"), forbid(unsafe_code))]
#![cfg_attr(feature = "syscall", allow(unsafe_code))]

#[cfg(feature = "stdlib")]
#[macro_use]
pub mod stdlib;

#[cfg(feature = "syscall")]
pub mod syscall;

#[cfg(feature = "syscall-abi")]
pub mod syscall_abi;

#[cfg(feature = "stdlib")]
pub use stdlib::*;

#[cfg(all(feature = "stdlib", target_os = "none"))]
mod panic {
    #[panic_handler]
    fn panic(info: &core::panic::PanicInfo) -> ! {
        crate::println!("panic: {}", info.message());
        crate::syscall::exit(u64::MAX)
    }
}
