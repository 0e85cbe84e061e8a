//! # Typed `X86_64` Control Registers
//!
//! The handful of registers the kernel core touches:
//!
//! | Register | Used for |
//! |----------|----------|
//! | [`Cr0`](cr0::Cr0) | `WP`: make supervisor writes honor read-only pages |
//! | [`Cr3`](cr3::Cr3) | physical base of the active root page table |
//! | [`Efer`](efer::Efer) | `NXE`: make the page-table no-execute bit valid |
//!
//! Hardware access is behind the `asm` feature so the bit layouts can be
//! tested on the host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "efer")]
pub mod efer;

#[cfg(feature = "msr")]
pub mod msr;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
