//! Central registry and dispatch
//!
//! `Logger` maps a module name to an ordered collection of rules and is the
//! emission entry point: every registered rule of the module is checked
//! against the event level, each applicable rule renders the message with its
//! own formatter, and the rendered payload is delivered synchronously or
//! handed to the rule's background worker.
//!
//! Filtering rules:
//! 1. A rule applies iff `min_level <= level <= max_level`
//! 2. Trace events additionally require debug mode with the marker at Trace
//! 3. Debug events additionally require debug mode
//! 4. Destination flags (console/file/async) only decide where an applicable
//!    message goes, never whether it goes
//! 5. An event no rule matches is dropped without buffering or error

use chrono::Local;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DetailedError, LogResult};
use crate::format::{print_console, Formatter};
use crate::levels::LogLevel;
use crate::rule::{Rule, RuleBuilder};

// =============================================================================
// Defaults
// =============================================================================

/// Fallback values for everything a rule leaves unset, passed at logger
/// construction. There is no process-wide mutable state behind these.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Directory for log files
    pub directory: PathBuf,
    /// Base log file name
    pub base_name: String,
    /// Log file extension
    pub extension: String,
    /// Period for time-bucketed folders
    pub bucket_period: Duration,
    /// Date format for bucket folder names
    pub bucket_format: String,
    /// Date format embedded in date-stamped filenames
    pub file_date_format: String,
    /// Timestamp format handed to formatters
    pub timestamp_format: String,
    /// Capacity of async delivery queues
    pub queue_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            base_name: "log_file".to_string(),
            extension: ".log".to_string(),
            bucket_period: Duration::from_secs(24 * 3600),
            bucket_format: "%Y-%m-%d".to_string(),
            file_date_format: "%Y-%m-%d".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            queue_capacity: 100,
        }
    }
}

// =============================================================================
// Logger
// =============================================================================

pub struct Logger {
    rules: HashMap<String, Vec<Rule>>,
    defaults: Defaults,
}

impl Logger {
    /// An empty logger with stock defaults; register rules with
    /// [`Logger::rule`] or [`Logger::add_rule`]
    pub fn new() -> Self {
        Self::with_defaults(Defaults::default())
    }

    pub fn with_defaults(defaults: Defaults) -> Self {
        Self {
            rules: HashMap::new(),
            defaults,
        }
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Build a rule against this logger's defaults and register it
    pub fn rule(&mut self, builder: RuleBuilder) -> LogResult<()> {
        let rule = builder.build_with(&self.defaults)?;
        self.add_rule(rule)
    }

    /// Register an already-built rule.
    ///
    /// Rules accumulate: several rules under one module are intended use, and
    /// every applicable one fires independently. Async rules get their
    /// delivery worker started here.
    pub fn add_rule(&mut self, rule: Rule) -> LogResult<()> {
        rule.start_worker()?;
        self.rules
            .entry(rule.module().to_string())
            .or_default()
            .push(rule);
        Ok(())
    }

    /// Number of rules registered for a module
    pub fn rule_count(&self, module: &str) -> usize {
        self.rules.get(module).map(Vec::len).unwrap_or(0)
    }

    /// Eagerly create every rule's log file instead of waiting for the first
    /// write
    pub fn init_files(&self) -> LogResult<()> {
        for rule in self.rules.values().flatten() {
            if let Some(sink) = &rule.sink {
                sink.init()?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Emit one event for `module` at `level`
    pub fn emit(&self, module: &str, level: LogLevel, message: &str) {
        self.dispatch(module, level, message, None);
    }

    /// Emit one event with an attached error; rules with detailed error
    /// output render the full context block
    #[track_caller]
    pub fn emit_with_error(&self, module: &str, level: LogLevel, message: &str, error: &dyn Error) {
        let detail = DetailedError::new(error);
        self.dispatch(module, level, message, Some(&detail));
    }

    fn dispatch(
        &self,
        module: &str,
        level: LogLevel,
        message: &str,
        detail: Option<&DetailedError>,
    ) {
        let Some(rules) = self.rules.get(module) else {
            return;
        };

        for rule in rules {
            if !rule.applicable(level) {
                continue;
            }
            rule.note_level(level);

            let timestamp = Local::now().format(&rule.date_format).to_string();
            let mut payload = rule.formatter.format(
                message,
                rule.level_name(level),
                module,
                &rule.submodules,
                &timestamp,
            );
            if rule.detailed_errors {
                if let Some(detail) = detail {
                    payload.push_str(&detail.to_string());
                }
            }

            // Async rules hand the payload to their worker (blocking when the
            // queue is full); everything else writes inline, console first
            if rule.try_enqueue(&payload) {
                continue;
            }
            if rule.console {
                print_console(&payload);
            }
            if let Some(sink) = &rule.sink {
                if let Err(e) = sink.write(&payload) {
                    sink.report_failure(module, &e);
                }
            }
        }
    }

    /// Rules that would deliver an event for `module` at `level`
    pub fn applicable_rules(&self, module: &str, level: LogLevel) -> Vec<&Rule> {
        self.rules
            .get(module)
            .map(|rules| rules.iter().filter(|r| r.applicable(level)).collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Per-level convenience
    // =========================================================================

    /// Log at TRACE level (requires the rule's debug mode with a Trace marker)
    pub fn trace(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Trace, message);
    }

    /// Log at DEBUG level (requires the rule's debug mode)
    pub fn debug(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Debug, message);
    }

    /// Log at INFO level (standard operations)
    pub fn info(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Info, message);
    }

    /// Log at WARNING level (important issues)
    pub fn warning(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Warning, message);
    }

    /// Log at ERROR level
    pub fn error(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Error, message);
    }

    /// Log at FATAL level
    pub fn fatal(&self, module: &str, message: &str) {
        self.emit(module, LogLevel::Fatal, message);
    }

    #[track_caller]
    pub fn trace_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Trace, message, error);
    }

    #[track_caller]
    pub fn debug_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Debug, message, error);
    }

    #[track_caller]
    pub fn info_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Info, message, error);
    }

    #[track_caller]
    pub fn warning_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Warning, message, error);
    }

    #[track_caller]
    pub fn error_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Error, message, error);
    }

    #[track_caller]
    pub fn fatal_detailed(&self, module: &str, message: &str, error: &dyn Error) {
        self.emit_with_error(module, LogLevel::Fatal, message, error);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush every open file handle
    pub fn flush(&self) {
        for rule in self.rules.values().flatten() {
            if let Some(sink) = &rule.sink {
                sink.flush();
            }
        }
    }

    /// Stop all delivery: per rule, close the async queue, wait for its
    /// worker to drain, then close the file handle. Synchronous rules just
    /// close their files. Safe to call more than once.
    pub fn shutdown(&self) {
        for rule in self.rules.values().flatten() {
            rule.shutdown();
        }
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Console-only logger for a module: Info..Fatal, plain text
    pub fn console_logger(module: &str) -> Self {
        let mut logger = Self::new();
        let builder = Rule::builder(module)
            .levels(LogLevel::Info, LogLevel::Fatal)
            .console(true)
            .formatter(Formatter::PlainText);
        // infallible: the range is valid and no file is involved
        let _ = logger.rule(builder);
        logger
    }

    /// Console plus a date-stamped file under the default directory
    pub fn file_logger(module: &str) -> LogResult<Self> {
        let mut logger = Self::new();
        let defaults = logger.defaults.clone();
        logger.rule(
            Rule::builder(module)
                .levels(LogLevel::Info, LogLevel::Fatal)
                .console(true)
                .formatter(Formatter::PlainText)
                .file_logging(
                    defaults.directory.clone(),
                    defaults.base_name.clone(),
                    defaults.extension.clone(),
                )
                .date_stamped_files(defaults.file_date_format.clone()),
        )?;
        Ok(logger)
    }

    /// Console plus date-stamped files nested in daily bucket folders
    pub fn file_and_folder_logger(module: &str) -> LogResult<Self> {
        let mut logger = Self::new();
        let defaults = logger.defaults.clone();
        logger.rule(
            Rule::builder(module)
                .levels(LogLevel::Info, LogLevel::Fatal)
                .console(true)
                .formatter(Formatter::PlainText)
                .file_logging(
                    defaults.directory.clone(),
                    defaults.base_name.clone(),
                    defaults.extension.clone(),
                )
                .date_stamped_files(defaults.file_date_format.clone())
                .time_bucketing(defaults.bucket_format.clone(), defaults.bucket_period),
        )?;
        Ok(logger)
    }

    /// Two rules for one module: Info..Error to the general file (with
    /// console), Error..Fatal to a separate error file with detailed error
    /// output. An Error-level event lands in both.
    pub fn separate_log_and_error(module: &str) -> LogResult<Self> {
        let mut logger = Self::new();
        let defaults = logger.defaults.clone();
        logger.rule(
            Rule::builder(module)
                .levels(LogLevel::Info, LogLevel::Error)
                .console(true)
                .formatter(Formatter::PlainText)
                .file_logging(
                    defaults.directory.clone(),
                    defaults.base_name.clone(),
                    defaults.extension.clone(),
                )
                .date_stamped_files(defaults.file_date_format.clone())
                .time_bucketing(defaults.bucket_format.clone(), defaults.bucket_period),
        )?;
        logger.rule(
            Rule::builder(module)
                .levels(LogLevel::Error, LogLevel::Fatal)
                .formatter(Formatter::PlainText)
                .detailed_errors(true)
                .file_logging(defaults.directory.clone(), "err", ".err")
                .date_stamped_files(defaults.file_date_format.clone())
                .time_bucketing(defaults.bucket_format.clone(), defaults.bucket_period),
        )?;
        Ok(logger)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
