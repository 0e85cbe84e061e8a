use core::fmt::{self, Write};
use kernel_sync::SyncOnceCell;

/// Receives console bytes; supplied by the boot environment.
pub type OutputSink = fn(&[u8]);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("console output sink already installed")]
pub struct SinkAlreadyInstalled;

/// The kernel console.
pub static CONSOLE: Console = Console::new();

/// A write-once output sink.
pub struct Console {
    sink: SyncOnceCell<OutputSink>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sink: SyncOnceCell::new(),
        }
    }

    /// # Errors
    /// [`SinkAlreadyInstalled`] if a sink is already in place; it is kept.
    pub fn install(&self, sink: OutputSink) -> Result<(), SinkAlreadyInstalled> {
        self.sink.set(sink).map_err(|_| SinkAlreadyInstalled)
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.sink.get().is_some()
    }

    /// Hands `bytes` to the sink, or drops them if there is none yet.
    pub fn write_bytes(&self, bytes: &[u8]) {
        if let Some(sink) = self.sink.get() {
            sink(bytes);
        }
    }

    pub fn write_fmt(&self, args: fmt::Arguments) {
        // ConsoleWriter never fails
        let _ = ConsoleWriter(self).write_fmt(args);
    }
}

/// [`fmt::Write`] adapter over a [`Console`].
pub struct ConsoleWriter<'a>(pub &'a Console);

impl Write for ConsoleWriter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());

    fn capture(bytes: &[u8]) {
        CAPTURED.lock().unwrap().extend_from_slice(bytes);
    }

    fn take_captured() -> String {
        String::from_utf8(core::mem::take(&mut *CAPTURED.lock().unwrap())).unwrap()
    }

    #[test]
    fn output_before_install_is_dropped() {
        static LOCAL: Console = Console::new();
        LOCAL.write_bytes(b"lost");
        assert!(!LOCAL.is_installed());
    }

    #[test]
    fn sink_is_write_once() {
        fn other(_: &[u8]) {}
        fn first(_: &[u8]) {}
        let console = Console::new();
        console.install(first).unwrap();
        let err = console.install(other).unwrap_err();
        assert_eq!(err, SinkAlreadyInstalled);
        assert_eq!(err.to_string(), "console output sink already installed");
    }

    #[test]
    fn macros_format_into_the_global_sink() {
        // the only test touching the global console
        crate::install_sink(capture).unwrap();

        crate::kprint!("{}+{}", 1, 2);
        crate::kprintln!("={}", 3);
        crate::kprintln!();
        assert_eq!(take_captured(), "1+2=3\n\n");
    }
}
