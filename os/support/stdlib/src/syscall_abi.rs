//! Numbers and conventions shared by the kernel and user programs.
//!
//! | register | meaning |
//! |----------|---------|
//! | `rax`    | system call number in, result out |
//! | `rdi`, `rsi`, `rdx`, `r10`, `r8`, `r9` | arguments 0 to 5 |
//!
//! Calls are made with `int 0x80`. Every call returns [`SYSCALL_FAILED`]
//! (`-1` as a signed value) on failure.

/// Trap vector of the system call gate.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Uniform failure result.
pub const SYSCALL_FAILED: u64 = u64::MAX;

/// Longest module name `exec` accepts.
pub const MAX_EXEC_NAME: usize = 64;

#[repr(u64)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Sysno {
    /// `read(fd, buf, count)`: blocks until `count` bytes of keyboard input
    /// were taken. Backspace removes the previous byte instead of being stored.
    Read = 0,
    /// `write(fd, buf, count)`: copies `count` bytes to the console.
    Write = 1,
    /// `mmap(addr, length, prot, flags, fd, offset)`: maps anonymous user
    /// pages covering `[addr, addr + length)` and returns the page-aligned start.
    Mmap = 2,
    /// `exec(name, name_len)`: replaces the caller with the named boot module.
    Exec = 3,
    /// `exit(status)`: hands control back to `init`.
    Exit = 4,
}

impl TryFrom<u64> for Sysno {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::Mmap),
            3 => Ok(Self::Exec),
            4 => Ok(Self::Exit),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_decode() {
        assert_eq!(Sysno::try_from(0), Ok(Sysno::Read));
        assert_eq!(Sysno::try_from(4), Ok(Sysno::Exit));
        assert_eq!(Sysno::try_from(Sysno::Mmap as u64), Ok(Sysno::Mmap));
    }

    #[test]
    fn unknown_number_is_returned() {
        assert_eq!(Sysno::try_from(5), Err(5));
        assert_eq!(Sysno::try_from(SYSCALL_FAILED), Err(SYSCALL_FAILED));
    }
}
