//! Leveled logging for lualoader
//!
//! The original tool funneled all diagnostics through one mutex-guarded
//! console sink governed by file-scope level/silent globals. Here the logger
//! is a value the host constructs once and threads through every call; the
//! sink stays behind a mutex so it can be shared with the rest of the host
//! process.

use chrono::Local;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

// =============================================================================
// Levels
// =============================================================================

/// Log severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
}

impl LogLevel {
    /// Fixed-width-ish name used in the output line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Parse a `logLevel` config value. Unknown strings are rejected so the
    /// caller can keep its current level.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Trace,
            1 => Self::Debug,
            3 => Self::Warning,
            4 => Self::Error,
            _ => Self::Info,
        }
    }
}

// =============================================================================
// Logger
// =============================================================================

/// Leveled sink accepting (message, severity, source-tag) triples.
///
/// Silent mode suppresses everything below [`LogLevel::Error`]; otherwise the
/// minimum level filters. Sink write failures are swallowed: logging must
/// never take the host down.
pub struct Logger {
    min_level: AtomicU8,
    silent: AtomicBool,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Logger {
    /// Logger writing to stderr at the given minimum level.
    pub fn new(min_level: LogLevel) -> Self {
        Self::with_sink(min_level, Box::new(io::stderr()))
    }

    /// Logger writing to an arbitrary sink (a console handle, a file, a
    /// capture buffer in tests).
    pub fn with_sink(min_level: LogLevel, sink: Box<dyn Write + Send>) -> Self {
        Self {
            min_level: AtomicU8::new(min_level as u8),
            silent: AtomicBool::new(false),
            sink: Mutex::new(sink),
        }
    }

    /// Logger that discards everything.
    pub fn disabled() -> Self {
        Self::with_sink(LogLevel::Error, Box::new(io::sink()))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::SeqCst))
    }

    /// Silent mode shows errors only, matching the original `silent = true`
    /// config behavior.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
        if silent {
            self.set_level(LogLevel::Error);
        }
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::SeqCst)
    }

    /// Core logging entry point. Format: `[HH:MM:SS] [LEVEL] [source] message`.
    pub fn log(&self, level: LogLevel, source: &str, message: &str) {
        if self.is_silent() && level != LogLevel::Error {
            return;
        }
        if level < self.level() && level != LogLevel::Error {
            return;
        }

        let timestamp = Local::now().format("%H:%M:%S");
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "[{timestamp}] [{}] [{source}] {message}", level.name());
            let _ = sink.flush();
        }
    }

    pub fn trace(&self, source: &str, message: &str) {
        self.log(LogLevel::Trace, source, message);
    }

    pub fn debug(&self, source: &str, message: &str) {
        self.log(LogLevel::Debug, source, message);
    }

    pub fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, source, message);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warning, source, message);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, source, message);
    }
}

// =============================================================================
// Tests
// =============================================================================
