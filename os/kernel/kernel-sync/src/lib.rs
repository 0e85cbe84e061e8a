//! # Kernel synchronization primitives
//!
//! The kernel runs on a single core. Exclusion against interrupt handlers is
//! what matters, so every lock used by both thread context and an interrupt
//! handler is taken through [`SpinLock::lock_irq`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod spin_lock;
mod sync_once_cell;

pub use irq::{IrqGuard, IrqSpinLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
