use crate::stdlib::put_bytes;
use core::fmt::{self, Write};

const BUFFER_SIZE: usize = 128;

/// Collects formatted output and hands it to `write(1, ..)` in chunks,
/// so one `println!` usually costs one system call.
pub struct SyscallSink {
    buffer: [u8; BUFFER_SIZE],
    len: usize,
}

impl SyscallSink {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            len: 0,
        }
    }

    fn push(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.len == BUFFER_SIZE {
                self.flush();
            }
            let n = bytes.len().min(BUFFER_SIZE - self.len);
            self.buffer[self.len..self.len + n].copy_from_slice(&bytes[..n]);
            self.len += n;
            bytes = &bytes[n..];
        }
    }

    pub fn flush(&mut self) {
        if self.len > 0 {
            put_bytes(&self.buffer[..self.len]);
            self.len = 0;
        }
    }
}

impl Default for SyscallSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SyscallSink {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s.as_bytes());
        Ok(())
    }
}

impl Drop for SyscallSink {
    fn drop(&mut self) {
        self.flush();
    }
}

#[doc(hidden)]
pub fn syscall_write(args: fmt::Arguments, newline: bool) {
    let mut sink = SyscallSink::new();
    // the sink itself never fails
    sink.write_fmt(args).ok();
    if newline {
        sink.push(b"\n");
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        $crate::stdlib::fmt::syscall_write(core::format_args!($($arg)*), false);
    }};
}

#[macro_export]
macro_rules! println {
    () => {{
        $crate::stdlib::put_bytes(b"\n");
    }};
    ($($arg:tt)*) => {{
        $crate::stdlib::fmt::syscall_write(core::format_args!($($arg)*), true);
    }};
}
