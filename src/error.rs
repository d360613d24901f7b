//! Error types for logger configuration and delivery
//!
//! Configuration errors abort setup before any rule reaches the dispatcher;
//! I/O errors are returned from the write path and reported to the console
//! fallback without ever panicking the logging caller.

use chrono::{DateTime, Local};
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Configuration error: {0}")] Config(String),

    #[error("Format error: {0}")] Format(String),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),
}

pub type LogResult<T> = Result<T, LogError>;

/// An error enriched with call-site and call-stack context
///
/// Built when a rule has detailed error output enabled. The rendered block is
/// appended to the formatted log line: timestamp, source file/line, the
/// calling function, optional call arguments, and a stack trace with runtime
/// and logger-internal frames filtered out.
pub struct DetailedError {
    message: String,
    time: DateTime<Local>,
    file: &'static str,
    line: u32,
    function: String,
    arguments: String,
    stack: String,
}

impl DetailedError {
    /// Capture a detailed error at the caller's location
    #[track_caller]
    pub fn new(err: &dyn std::error::Error) -> Self {
        Self::capture(err.to_string(), String::new())
    }

    /// Capture a detailed error together with the arguments of the failing call
    #[track_caller]
    pub fn with_arguments(err: &dyn std::error::Error, arguments: impl fmt::Debug) -> Self {
        Self::capture(err.to_string(), format!("{:?}", arguments))
    }

    #[track_caller]
    fn capture(message: String, arguments: String) -> Self {
        let location = Location::caller();
        let (function, stack) = filtered_stack();
        Self {
            message,
            time: Local::now(),
            file: location.file(),
            line: location.line(),
            function,
            arguments,
            stack,
        }
    }

    /// The original error text
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DetailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\nError: {}\nTime: {}\nFile: {}:{}\nFunction: {}\nArguments: {}\n{}",
            self.message,
            self.time.format("%Y-%m-%d %H:%M:%S"),
            self.file,
            self.line,
            self.function,
            self.arguments,
            self.stack,
        )
    }
}

/// Capture the current stack, dropping runtime and logger-internal frames.
///
/// Returns the first surviving symbol (the closest caller outside this crate)
/// and the rendered trace. Frame resolution depends on debug info being
/// present; an unresolvable stack yields an empty frame list, never an error.
fn filtered_stack() -> (String, String) {
    let raw = Backtrace::force_capture().to_string();
    let mut function = String::from("unknown");
    let mut function_found = false;
    let mut stack = String::from("Stack Trace:\n");

    let mut lines = raw.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        // Frame lines look like "4: symbol"; location lines like "at path:line:col"
        let Some((index, symbol)) = trimmed.split_once(": ") else {
            continue;
        };
        if index.parse::<u32>().is_err() {
            continue;
        }

        let mut location = None;
        if let Some(next) = lines.peek() {
            if let Some(rest) = next.trim_start().strip_prefix("at ") {
                location = Some(rest.to_string());
                lines.next();
            }
        }

        if is_internal_frame(symbol) {
            continue;
        }
        if !function_found {
            function = symbol.to_string();
            function_found = true;
        }
        match location {
            Some(loc) => {
                let short = loc.rsplit('/').next().unwrap_or(&loc);
                stack.push_str(&format!("  {} {}\n", short, symbol));
            }
            None => stack.push_str(&format!("  {}\n", symbol)),
        }
    }

    (function, stack)
}

fn is_internal_frame(symbol: &str) -> bool {
    symbol.starts_with("std::")
        || symbol.starts_with("core::")
        || symbol.starts_with("alloc::")
        || symbol.contains("backtrace")
        || symbol.contains("modlog::")
        || symbol.starts_with("__")
        || symbol.starts_with("rust_begin_unwind")
        || symbol.starts_with("_start")
}
