// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! In-memory logging.
//!
//! The bootloader has no console of its own; log records accumulate in
//! a circular ring that the host may drain over whatever diagnostic
//! channel it has. Records carry the bootloader uptime so events can be
//! correlated with protocol traffic.

use core::fmt::{self, Write};

use heapless::String;

use crate::time::Micros;

/// Maximum length of a formatted log message.
pub const MAX_MESSAGE_LEN: usize = 96;

/// Number of records retained by the ring.
pub const RING_CAPACITY: usize = 16;

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Unrecoverable conditions.
    Error = 0,
    /// Degraded but functional conditions.
    Warn = 1,
    /// Normal state transitions and session events.
    Info = 2,
    /// Development detail.
    Debug = 3,
}

impl LogLevel {
    /// Single-character prefix used when rendering records.
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
        }
    }
}

/// One log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Bootloader uptime when the record was written.
    pub uptime: Micros,
    /// Originating module tag.
    pub module: &'static str,
    /// Formatted message, truncated to [`MAX_MESSAGE_LEN`].
    pub message: String<MAX_MESSAGE_LEN>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:010}] {} [{}] {}",
            self.uptime.as_micros(),
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

/// Circular log ring with level filtering. The oldest record is evicted
/// when the ring is full.
pub struct LogRing {
    records: [Option<LogRecord>; RING_CAPACITY],
    write_index: usize,
    count: usize,
    min_level: LogLevel,
}

impl LogRing {
    /// Create an empty ring recording `Info` and above.
    #[must_use]
    pub const fn new() -> Self {
        const NONE: Option<LogRecord> = None;
        Self {
            records: [NONE; RING_CAPACITY],
            write_index: 0,
            count: 0,
            min_level: LogLevel::Info,
        }
    }

    /// Set the minimum recorded severity.
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Whether a record at `level` would be retained.
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Format and append a record.
    pub fn log(
        &mut self,
        level: LogLevel,
        uptime: Micros,
        module: &'static str,
        args: fmt::Arguments<'_>,
    ) {
        if !self.should_log(level) {
            return;
        }
        let mut message = String::new();
        // Truncation on overflow is acceptable for diagnostics.
        let _ = message.write_fmt(args);
        self.records[self.write_index] = Some(LogRecord {
            level,
            uptime,
            module,
            message,
        });
        self.write_index = (self.write_index + 1) % RING_CAPACITY;
        if self.count < RING_CAPACITY {
            self.count += 1;
        }
    }

    /// Number of retained records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// True if no records are retained.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate over retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        let start = if self.count < RING_CAPACITY {
            0
        } else {
            self.write_index
        };
        (0..self.count).filter_map(move |i| {
            self.records[(start + i) % RING_CAPACITY].as_ref()
        })
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Record an error-level message.
#[macro_export]
macro_rules! log_error {
    ($ring:expr, $uptime:expr, $module:expr, $($arg:tt)*) => {
        $ring.log($crate::log::LogLevel::Error, $uptime, $module, format_args!($($arg)*))
    };
}

/// Record a warning-level message.
#[macro_export]
macro_rules! log_warn {
    ($ring:expr, $uptime:expr, $module:expr, $($arg:tt)*) => {
        $ring.log($crate::log::LogLevel::Warn, $uptime, $module, format_args!($($arg)*))
    };
}

/// Record an info-level message.
#[macro_export]
macro_rules! log_info {
    ($ring:expr, $uptime:expr, $module:expr, $($arg:tt)*) => {
        $ring.log($crate::log::LogLevel::Info, $uptime, $module, format_args!($($arg)*))
    };
}

/// Record a debug-level message.
#[macro_export]
macro_rules! log_debug {
    ($ring:expr, $uptime:expr, $module:expr, $($arg:tt)*) => {
        $ring.log($crate::log::LogLevel::Debug, $uptime, $module, format_args!($($arg)*))
    };
}
