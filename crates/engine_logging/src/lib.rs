#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message is
//! tagged with the scroll cycle the harvest loop is currently in, so a log of
//! a long session can be lined up with the scroll attempts that produced it.

use std::cell::Cell;

thread_local! {
    /// Thread-local storage for the current scroll cycle.
    static SCROLL_CYCLE: Cell<u64> = const { Cell::new(0) };
}

/// Sets the scroll cycle for the current thread.
/// The harvest loop calls this once per scroll attempt.
pub fn set_scroll_cycle(cycle: u64) {
    SCROLL_CYCLE.with(|v| v.set(cycle));
}

/// Retrieves the scroll cycle for the current thread.
/// Returns 0 before the first scroll attempt.
pub fn scroll_cycle() -> u64 {
    SCROLL_CYCLE.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current scroll cycle.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("[cycle {}] {}", $crate::scroll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current scroll cycle.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("[cycle {}] {}", $crate::scroll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current scroll cycle.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("[cycle {}] {}", $crate::scroll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current scroll cycle.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("[cycle {}] {}", $crate::scroll_cycle(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current scroll cycle.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("[cycle {}] {}", $crate::scroll_cycle(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
