use crate::console::{CONSOLE, Console, ConsoleWriter};
use core::fmt::Write;
use kernel_sync::SyncOnceCell;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `"[LEVEL] target: message"` lines to a [`Console`].
pub struct ConsoleLogger {
    max_level: LevelFilter,
    console: &'static Console,
}

impl ConsoleLogger {
    /// A logger for the kernel console.
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self::with_console(&CONSOLE, max_level)
    }

    #[must_use]
    pub const fn with_console(console: &'static Console, max_level: LevelFilter) -> Self {
        Self { max_level, console }
    }

    /// Installs this logger as the global `log` backend. Call once during
    /// early init.
    ///
    /// # Errors
    /// If a logger is already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        static LOGGER: SyncOnceCell<ConsoleLogger> = SyncOnceCell::new();

        let max_level = self.max_level;
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let _ = writeln!(
            ConsoleWriter(self.console),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
