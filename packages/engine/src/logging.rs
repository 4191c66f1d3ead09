// Logging
//
// The seam the engine reports through: invalidation decisions at debug,
// cycle summaries at info. Sinks implement a single `log` hook; level
// gating lives in the trait's provided methods.

use std::fmt;

/// Verbosity of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A sink for engine messages.
pub trait Logger {
    /// The lowest level this sink accepts.
    fn level(&self) -> LogLevel;

    /// Writes one already-gated message.
    fn log(&self, level: LogLevel, msg: &str);

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    fn debug(&self, msg: &str) {
        if self.is_enabled(LogLevel::Debug) {
            self.log(LogLevel::Debug, msg);
        }
    }

    fn info(&self, msg: &str) {
        if self.is_enabled(LogLevel::Info) {
            self.log(LogLevel::Info, msg);
        }
    }

    fn warn(&self, msg: &str) {
        if self.is_enabled(LogLevel::Warn) {
            self.log(LogLevel::Warn, msg);
        }
    }

    fn error(&self, msg: &str) {
        if self.is_enabled(LogLevel::Error) {
            self.log(LogLevel::Error, msg);
        }
    }
}

/// Discards every message.
pub struct NullLogger;

impl NullLogger {
    pub fn new() -> NullLogger {
        NullLogger
    }
}

impl Default for NullLogger {
    fn default() -> NullLogger {
        NullLogger::new()
    }
}

impl Logger for NullLogger {
    fn level(&self) -> LogLevel {
        LogLevel::Error
    }

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }

    fn log(&self, _level: LogLevel, _msg: &str) {}
}

/// Writes to the console: info lands on stdout, everything else on
/// stderr.
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> ConsoleLogger {
        ConsoleLogger { min_level }
    }
}

impl Logger for ConsoleLogger {
    fn level(&self) -> LogLevel {
        self.min_level
    }

    fn log(&self, level: LogLevel, msg: &str) {
        if level == LogLevel::Info {
            println!("[inc {level}] {msg}");
        } else {
            eprintln!("[inc {level}] {msg}");
        }
    }
}
