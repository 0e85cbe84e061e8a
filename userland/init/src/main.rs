//! The interactive shell started by the kernel at boot and after every
//! `exit`. Each line names a boot module to run in place of the shell.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use stdlib::syscall::{self, SyscallFailed};
use stdlib::syscall_abi::MAX_EXEC_NAME;
use stdlib::{getchar, print, println, put_bytes};

/// Longest line the shell buffers; extra input is echoed but dropped.
const LINE_CAPACITY: usize = 512;

struct Line {
    buffer: [u8; LINE_CAPACITY],
    len: usize,
}

impl Line {
    const fn new() -> Self {
        Self {
            buffer: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    const fn push(&mut self, byte: u8) {
        if self.len < LINE_CAPACITY {
            self.buffer[self.len] = byte;
            self.len += 1;
        }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.len]).unwrap_or("")
    }
}

fn read_line() -> Result<Line, SyscallFailed> {
    let mut line = Line::new();
    loop {
        // the kernel consumes backspace itself, so it never shows up here
        let ch = getchar()?;
        put_bytes(&[ch]);
        if ch == b'\n' {
            return Ok(line);
        }
        line.push(ch);
    }
}

/// Entered by `iretq` with `rsp` on a page boundary; the `call` leaves it
/// where a function prologue expects it.
#[cfg(target_os = "none")]
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "C" fn _start() {
    core::arch::naked_asm!(
        "xor rbp, rbp",
        "call {shell}",
        "ud2",
        shell = sym shell,
    );
}

/// Hosted builds only type-check the shell.
#[cfg(not(target_os = "none"))]
fn main() {}

extern "C" fn shell() -> ! {
    loop {
        print!("$ ");
        let Ok(line) = read_line() else {
            println!("read failed");
            continue;
        };

        let name = line.as_str();
        if name.is_empty() {
            continue;
        }
        if name.len() > MAX_EXEC_NAME {
            println!("{name}: name too long");
            continue;
        }

        let _ = syscall::exec(name);
        println!("{name} not found");
    }
}
