//! # System calls
//!
//! The `int 0x80` trampoline saves the general purpose registers into a
//! [`SyscallFrame`] and calls [`dispatch`], which decodes the number and
//! arguments, runs the call against a [`SyscallContext`] and writes the
//! result back to `rax`.
//!
//! | # | call | result |
//! |---|------|--------|
//! | 0 | `read(fd, buf, count)` | `count`, after blocking for input |
//! | 1 | `write(fd, buf, count)` | `count` |
//! | 2 | `mmap(addr, len, ..)` | page-aligned start |
//! | 3 | `exec(name, len)` | does not return on success |
//! | 4 | `exit(status)` | does not return on success |
//!
//! Failures of any kind, including unknown numbers, return
//! [`SYSCALL_FAILED`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod context;
mod dispatch;
mod frame;

pub use crate::context::SyscallContext;
pub use crate::dispatch::{Syscall, dispatch};
pub use crate::frame::SyscallFrame;
pub use stdlib::syscall_abi::{SYSCALL_FAILED, SYSCALL_VECTOR, Sysno};

use kernel_elf::LoadError;
use kernel_vmem::VmemError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SyscallError {
    #[error("unknown system call {0}")]
    UnknownSyscall(u64),
    #[error("no boot module with that name")]
    ImageNotFound,
    #[error("invalid module name")]
    BadName,
    #[error(transparent)]
    Mapping(#[from] VmemError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[cfg(test)]
mod mock;
