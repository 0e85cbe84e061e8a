//! Raw system call wrappers.
//!
//! Every call traps through `int 0x80`. The kernel saves and restores all
//! general purpose registers except `rax`, which carries the result.

use crate::syscall_abi::{SYSCALL_FAILED, Sysno};

/// Failed system call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SyscallFailed;

#[inline(always)]
#[allow(clippy::inline_always)]
const fn check(ret: u64) -> Result<u64, SyscallFailed> {
    if ret == SYSCALL_FAILED {
        Err(SyscallFailed)
    } else {
        Ok(ret)
    }
}

#[inline(always)]
#[allow(clippy::inline_always)]
unsafe fn syscall3(nr: Sysno, a0: u64, a1: u64, a2: u64) -> u64 {
    let ret: u64;
    unsafe {
        core::arch::asm!(
            "int 0x80",
            inlateout("rax") nr as u64 => ret,
            in("rdi") a0,
            in("rsi") a1,
            in("rdx") a2,
            options(nostack)
        );
    }
    ret
}

#[inline(always)]
#[allow(clippy::inline_always, clippy::too_many_arguments)]
unsafe fn syscall6(nr: Sysno, a0: u64, a1: u64, a2: u64, a3: u64, a4: u64, a5: u64) -> u64 {
    let ret: u64;
    unsafe {
        core::arch::asm!(
            "int 0x80",
            inlateout("rax") nr as u64 => ret,
            in("rdi") a0,
            in("rsi") a1,
            in("rdx") a2,
            in("r10") a3,
            in("r8") a4,
            in("r9") a5,
            options(nostack)
        );
    }
    ret
}

/// Fills `buf` from the keyboard, blocking until it is full.
///
/// # Errors
/// The kernel could not write into `buf`.
pub fn read(fd: u64, buf: &mut [u8]) -> Result<usize, SyscallFailed> {
    let ret = unsafe { syscall3(Sysno::Read, fd, buf.as_mut_ptr() as u64, buf.len() as u64) };
    check(ret).map(|n| n as usize)
}

/// Writes `buf` to the console.
///
/// # Errors
/// The kernel could not read `buf`.
pub fn write(fd: u64, buf: &[u8]) -> Result<usize, SyscallFailed> {
    let ret = unsafe { syscall3(Sysno::Write, fd, buf.as_ptr() as u64, buf.len() as u64) };
    check(ret).map(|n| n as usize)
}

/// Maps fresh, writable pages covering `[addr, addr + length)` and returns
/// the page-aligned start.
///
/// # Errors
/// The kernel ran out of frames.
pub fn mmap(addr: u64, length: u64) -> Result<*mut u8, SyscallFailed> {
    let ret = unsafe { syscall6(Sysno::Mmap, addr, length, 0, 0, 0, 0) };
    check(ret).map(|va| va as *mut u8)
}

/// Replaces the running program with the boot module `name`.
///
/// Only returns if the module does not exist or could not be loaded.
pub fn exec(name: &str) -> SyscallFailed {
    unsafe { syscall3(Sysno::Exec, name.as_ptr() as u64, name.len() as u64, 0) };
    SyscallFailed
}

/// Ends the program. The kernel starts `init` again.
pub fn exit(status: u64) -> ! {
    unsafe { syscall3(Sysno::Exit, status, 0, 0) };
    // exit only returns if init itself is missing
    loop {
        core::hint::spin_loop();
    }
}
