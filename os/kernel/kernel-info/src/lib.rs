//! # Kernel Configuration and Boot Interface
//!
//! Data handed from the boot collaborator to the kernel core, plus the
//! compile-time memory layout shared by the kernel and its build script.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! * **Memory map**: `{base, length, kind}` regions; only [`Usable`](boot::MemoryRegionKind::Usable)
//!   regions seed the frame allocator.
//! * **Direct map offset**: the virtual offset at which all physical memory is
//!   accessible to the kernel.
//! * **Modules**: named, read-only executable blobs loaded by the bootloader.
//!   Lookup is by exact name.
//!
//! ### Memory Layout ([`memory`])
//!
//! ```text
//! 0x0000_0000_0000_0000 ┌─────────────────────────────────┐
//!                       │  User images and mmap regions   │
//! USER_STACK_TOP        ├─────────────────────────────────┤ 0x0000_7fff_ffff_f000
//!                       │     (non-canonical hole)        │
//! 0xffff_8000_0000_0000 ├─────────────────────────────────┤
//!                       │   Direct map (bootloader HHDM)  │
//! 0xffff_ffff_8000_0000 ├─────────────────────────────────┤
//!                       │       Kernel Text & Data        │
//! 0xFFFF_FFFF_FFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! The lower half (L4 entries `0..256`) belongs to user code. The kernel
//! drops the bootloader's lower-half scaffolding at startup.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
