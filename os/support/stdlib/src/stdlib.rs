//! Console helpers for user programs.

pub mod fmt;

use crate::syscall::{self, SyscallFailed};

/// Standard input, the keyboard.
pub const STDIN: u64 = 0;

/// Standard output, the console.
pub const STDOUT: u64 = 1;

/// Blocks for one byte of keyboard input.
///
/// # Errors
/// The kernel rejected the read.
pub fn getchar() -> Result<u8, SyscallFailed> {
    let mut byte = [0u8; 1];
    syscall::read(STDIN, &mut byte)?;
    Ok(byte[0])
}

/// Writes raw bytes to standard output.
pub fn put_bytes(bytes: &[u8]) {
    // nothing useful to do when the console rejects output
    syscall::write(STDOUT, bytes).ok();
}
