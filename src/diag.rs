//! BootGuard - Diagnostic Sink
//!
//! One formatted-message sink shared by the orchestrator and the fault hooks.
//!
//! The sink is best-effort: it may buffer, block or drop, and at fault time
//! the transport behind it may already be broken. Nothing on the halt path
//! waits on or checks the sink, which is why [`DiagnosticSink::emit`] has no
//! return value.
//!
//! Formatting goes into a fixed `heapless` buffer so emission stays usable
//! after an allocation failure. Lines longer than
//! [`DIAG_MESSAGE_CAPACITY`](crate::types::DIAG_MESSAGE_CAPACITY) are truncated.
//!
//! ```ignore
//! diag_error!(sink, "Error!   : RTOS - stack overflow in {}", name);
//! ```

use crate::hal::Hal;
use crate::types::*;
use core::fmt::{self, Write};

// ============================================================================
// Level
// ============================================================================

/// Diagnostic severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Level {
    /// Fatal or unexpected
    Error,
    /// Degraded but running
    Warn,
    /// Lifecycle milestones
    Info,
    /// Developer detail
    Debug,
    /// Per-idle-decision detail
    Trace,
}

impl Level {
    /// Line prefix
    pub const fn tag(&self) -> &'static str {
        match self {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }
}

// ============================================================================
// Sink Trait
// ============================================================================

/// Best-effort formatted-message sink
pub trait DiagnosticSink {
    /// Emit one message; may silently drop it
    fn emit(&self, level: Level, args: fmt::Arguments<'_>);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &T {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        (**self).emit(level, args)
    }
}

// ============================================================================
// Line Formatting
// ============================================================================

/// One formatted diagnostic line
pub type Line = heapless::String<DIAG_MESSAGE_CAPACITY>;

/// Writer that keeps what fits and discards the rest
struct Truncating<'a> {
    line: &'a mut Line,
}

impl<'a> Write for Truncating<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.line.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Format `args` behind the level tag, truncating at capacity
pub fn format_line(level: Level, args: fmt::Arguments<'_>) -> Line {
    let mut line = Line::new();
    let mut writer = Truncating { line: &mut line };
    let _ = writer.write_str(level.tag());
    let _ = writer.write_char(' ');
    let _ = writer.write_fmt(args);
    line
}

// ============================================================================
// Sinks
// ============================================================================

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Sink that forwards to [`Hal::debug_print`]
pub struct HalSink<'a, H: Hal> {
    hal: &'a H,
    max_level: Level,
}

impl<'a, H: Hal> HalSink<'a, H> {
    /// Forward messages up to and including `max_level`
    pub fn new(hal: &'a H, max_level: Level) -> Self {
        Self { hal, max_level }
    }
}

impl<'a, H: Hal> DiagnosticSink for HalSink<'a, H> {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        if level > self.max_level {
            return;
        }
        let line = format_line(level, args);
        self.hal.debug_print(&line);
    }
}

/// Sink backed by defmt
#[cfg(feature = "defmt-log")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefmtSink;

#[cfg(feature = "defmt-log")]
impl DiagnosticSink for DefmtSink {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let mut line = Line::new();
        let _ = Truncating { line: &mut line }.write_fmt(args);
        match level {
            Level::Error => defmt::error!("{=str}", line.as_str()),
            Level::Warn => defmt::warn!("{=str}", line.as_str()),
            Level::Info => defmt::info!("{=str}", line.as_str()),
            Level::Debug => defmt::debug!("{=str}", line.as_str()),
            Level::Trace => defmt::trace!("{=str}", line.as_str()),
        }
    }
}

/// Sink writing to stdout (errors to stderr)
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[cfg(feature = "std")]
impl DiagnosticSink for StdoutSink {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let line = format_line(level, args);
        match level {
            Level::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Sink that keeps every line for later assertions
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: std::sync::Mutex<std::vec::Vec<(Level, std::string::String)>>,
}

#[cfg(any(test, feature = "std"))]
impl RecordingSink {
    /// Create an empty recorder
    pub const fn new() -> Self {
        Self {
            lines: std::sync::Mutex::new(std::vec::Vec::new()),
        }
    }

    /// Recorded lines, oldest first
    pub fn lines(&self) -> std::vec::Vec<(Level, std::string::String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// True if any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, msg)| msg.contains(needle))
    }

    /// Number of recorded messages at `level`
    pub fn count(&self, level: Level) -> usize {
        self.lines().iter().filter(|(l, _)| *l == level).count()
    }
}

#[cfg(any(test, feature = "std"))]
impl DiagnosticSink for RecordingSink {
    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let line = format_line(level, args);
        // Poisoned recorder: drop, like a broken transport
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, std::string::String::from(line.as_str())));
        }
    }
}

// ============================================================================
// Macros
// ============================================================================

/// Emit an error-level diagnostic
#[macro_export]
macro_rules! diag_error {
    ($sink:expr, $($arg:tt)*) => {
        $crate::diag::DiagnosticSink::emit(&$sink, $crate::diag::Level::Error, format_args!($($arg)*))
    };
}

/// Emit a warning-level diagnostic
#[macro_export]
macro_rules! diag_warn {
    ($sink:expr, $($arg:tt)*) => {
        $crate::diag::DiagnosticSink::emit(&$sink, $crate::diag::Level::Warn, format_args!($($arg)*))
    };
}

/// Emit an info-level diagnostic
#[macro_export]
macro_rules! diag_info {
    ($sink:expr, $($arg:tt)*) => {
        $crate::diag::DiagnosticSink::emit(&$sink, $crate::diag::Level::Info, format_args!($($arg)*))
    };
}

/// Emit a debug-level diagnostic
#[macro_export]
macro_rules! diag_debug {
    ($sink:expr, $($arg:tt)*) => {
        $crate::diag::DiagnosticSink::emit(&$sink, $crate::diag::Level::Debug, format_args!($($arg)*))
    };
}

/// Emit a trace-level diagnostic
#[macro_export]
macro_rules! diag_trace {
    ($sink:expr, $($arg:tt)*) => {
        $crate::diag::DiagnosticSink::emit(&$sink, $crate::diag::Level::Trace, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::NoopHal;

    #[test]
    fn test_format_line() {
        let line = format_line(Level::Info, format_args!("RTOS - {}", "scheduler"));
        assert_eq!(line.as_str(), "[INFO]  RTOS - scheduler");
    }

    #[test]
    fn test_format_line_truncates() {
        let long = "x".repeat(DIAG_MESSAGE_CAPACITY * 2);
        let line = format_line(Level::Error, format_args!("{}", long));
        assert_eq!(line.len(), DIAG_MESSAGE_CAPACITY);
        assert!(line.starts_with("[ERROR] xxx"));
    }

    #[test]
    fn test_recording_sink_macros() {
        let sink = RecordingSink::new();
        diag_error!(sink, "stack overflow in {}", "BLE_Task");
        diag_info!(&sink, "boot");
        assert!(sink.contains("BLE_Task"));
        assert_eq!(sink.count(Level::Error), 1);
        assert_eq!(sink.count(Level::Info), 1);
    }

    struct PrintHal {
        printed: std::sync::Mutex<std::vec::Vec<std::string::String>>,
    }

    impl Hal for PrintHal {
        fn wait_for_interrupt(&self) {}
        fn halt(&self) -> ! {
            NoopHal::new().halt()
        }
        fn memory_barrier(&self) {}
        fn platform_name(&self) -> &'static str {
            "print"
        }
        fn debug_print(&self, msg: &str) {
            self.printed.lock().unwrap().push(msg.into());
        }
    }

    #[test]
    fn test_hal_sink_filters_by_level() {
        let hal = PrintHal {
            printed: std::sync::Mutex::new(std::vec::Vec::new()),
        };
        let sink = HalSink::new(&hal, Level::Warn);
        diag_trace!(sink, "dropped");
        diag_error!(sink, "kept {}", 7);

        let printed = hal.printed.lock().unwrap();
        assert_eq!(printed.len(), 1);
        assert_eq!(printed[0], "[ERROR] kept 7");
    }

    #[test]
    fn test_null_sink() {
        diag_error!(NullSink, "nowhere {}", 1);
    }
}
