//! Rules: a level range bound to destinations and a formatter
//!
//! A rule is the unit of dispatch configuration. One module may own many
//! rules; each applicable rule renders and delivers independently. Rules are
//! built with a chaining `RuleBuilder` that validates everything before the
//! rule can reach the dispatcher, so log calls never see a half-configured
//! rule.

use colored::Colorize;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::Defaults;
use crate::error::{LogError, LogResult};
use crate::file::{FileSink, TimeBucket};
use crate::format::{Formatter, UserFormatFn};
use crate::levels::LogLevel;
use crate::worker;

pub struct Rule {
    pub(crate) module: String,
    pub(crate) submodules: Vec<String>,
    pub(crate) min_level: LogLevel,
    pub(crate) max_level: LogLevel,
    // level of the most recent matching event; diagnostic only
    pub(crate) current_level: AtomicU8,
    pub(crate) console: bool,
    pub(crate) debug_mode: bool,
    pub(crate) debug_level: LogLevel,
    pub(crate) date_format: String,
    pub(crate) detailed_errors: bool,
    pub(crate) custom_level_names: HashMap<LogLevel, String>,
    pub(crate) formatter: Formatter,
    pub(crate) sink: Option<Arc<FileSink>>,
    pub(crate) queue: Option<AsyncQueue>,
}

pub(crate) struct AsyncQueue {
    pub(crate) capacity: usize,
    pub(crate) sender: Mutex<Option<Sender<String>>>,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

impl Rule {
    /// Start building a rule for the given module
    pub fn builder(module: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(module)
    }

    /// The module this rule is registered under
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Whether an event at `level` is delivered by this rule.
    ///
    /// The inclusive [min, max] range decides applicability; trace events
    /// additionally require debug mode with the debug marker at Trace, and
    /// debug events require debug mode.
    pub(crate) fn applicable(&self, level: LogLevel) -> bool {
        if level < self.min_level || level > self.max_level {
            return false;
        }
        match level {
            LogLevel::Trace => self.debug_mode && self.debug_level == LogLevel::Trace,
            LogLevel::Debug => self.debug_mode,
            _ => true,
        }
    }

    /// Resolve the display name for a level, preferring the rule's custom map
    pub(crate) fn level_name(&self, level: LogLevel) -> &str {
        self.custom_level_names
            .get(&level)
            .map(String::as_str)
            .unwrap_or_else(|| level.as_str())
    }

    pub(crate) fn note_level(&self, level: LogLevel) {
        self.current_level.store(level as u8, Ordering::Relaxed);
    }

    /// Level of the most recent event this rule delivered
    pub fn current_level(&self) -> Option<LogLevel> {
        LogLevel::from_u8(self.current_level.load(Ordering::Relaxed))
    }

    /// Hand a rendered payload to the delivery worker. Returns false when the
    /// rule has no live queue (not async, or already shut down) so the caller
    /// falls back to the synchronous path. Blocks when the queue is full.
    pub(crate) fn try_enqueue(&self, payload: &str) -> bool {
        let Some(queue) = &self.queue else {
            return false;
        };
        let sender = queue.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx.send(payload.to_string()).is_ok(),
            None => false,
        }
    }

    /// Create the bounded queue and spawn the delivery thread.
    ///
    /// Called at registration time; a no-op for synchronous rules.
    pub(crate) fn start_worker(&self) -> LogResult<()> {
        let Some(queue) = &self.queue else {
            return Ok(());
        };
        let (tx, rx) = bounded(queue.capacity);
        let handle = worker::spawn(self.module.clone(), rx, self.console, self.sink.clone())?;
        *queue.sender.lock() = Some(tx);
        *queue.worker.lock() = Some(handle);
        Ok(())
    }

    /// Drain and stop this rule's delivery: close the queue, wait for the
    /// worker to finish, then close the file handle. Idempotent.
    pub(crate) fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.sender.lock().take();
            if let Some(handle) = queue.worker.lock().take() {
                let _ = handle.join();
            }
        }
        if let Some(sink) = &self.sink {
            sink.close();
        }
    }
}

/// Chaining builder for [`Rule`]. Settings apply in call order; the last
/// write wins. `build()` validates and returns a configuration error for
/// anything the dispatcher must never see.
pub struct RuleBuilder {
    module: String,
    submodules: Vec<String>,
    min_level: LogLevel,
    max_level: LogLevel,
    console: bool,
    debug_mode: bool,
    debug_level: LogLevel,
    date_format: Option<String>,
    detailed_errors: bool,
    custom_level_names: HashMap<LogLevel, String>,
    formatter: Option<Formatter>,
    file: Option<FileOptions>,
    async_enabled: bool,
    queue_capacity: Option<usize>,
}

#[derive(Default)]
struct FileOptions {
    directory: Option<PathBuf>,
    base_name: Option<String>,
    extension: Option<String>,
    date_stamped: bool,
    date_format: Option<String>,
    bucket: Option<(String, Duration)>,
    size_limit: Option<u64>,
}

impl RuleBuilder {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            submodules: Vec::new(),
            min_level: LogLevel::Info,
            max_level: LogLevel::Error,
            console: false,
            debug_mode: false,
            debug_level: LogLevel::Info,
            date_format: None,
            detailed_errors: false,
            custom_level_names: HashMap::new(),
            formatter: None,
            file: None,
            async_enabled: false,
            queue_capacity: None,
        }
    }

    pub fn submodules(mut self, submodules: Vec<String>) -> Self {
        self.submodules = submodules;
        self
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn max_level(mut self, level: LogLevel) -> Self {
        self.max_level = level;
        self
    }

    /// Set both range bounds at once
    pub fn levels(mut self, min: LogLevel, max: LogLevel) -> Self {
        self.min_level = min;
        self.max_level = max;
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Enable debug mode; `marker` gates trace events (they fire only when
    /// the marker is [`LogLevel::Trace`])
    pub fn debug_mode(mut self, enabled: bool, marker: LogLevel) -> Self {
        self.debug_mode = enabled;
        self.debug_level = marker;
        self
    }

    /// chrono strftime format for the timestamp handed to the formatter
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn detailed_errors(mut self, enabled: bool) -> Self {
        self.detailed_errors = enabled;
        self
    }

    /// Override the default level-name table for this rule
    pub fn custom_level_names(mut self, names: HashMap<LogLevel, String>) -> Self {
        self.custom_level_names = names;
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Install a caller-supplied formatting closure
    pub fn user_formatter<F>(mut self, format: F) -> Self
    where
        F: Fn(&str, &str, &str, &[String], &str) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Formatter::UserDefined(Arc::new(format) as Arc<UserFormatFn>));
        self
    }

    /// Enable file delivery to `directory/base_name + extension`
    pub fn file_logging(
        mut self,
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let options = self.file.get_or_insert_with(FileOptions::default);
        options.directory = Some(directory.into());
        options.base_name = Some(base_name.into());
        options.extension = Some(extension.into());
        self
    }

    /// Embed a formatted date in the filename (`date_baseName.ext`)
    pub fn date_stamped_files(mut self, format: impl Into<String>) -> Self {
        let options = self.file.get_or_insert_with(FileOptions::default);
        options.date_stamped = true;
        options.date_format = Some(format.into());
        self
    }

    /// Nest files under a subdirectory keyed by the truncated timestamp
    pub fn time_bucketing(mut self, format: impl Into<String>, period: Duration) -> Self {
        let options = self.file.get_or_insert_with(FileOptions::default);
        options.bucket = Some((format.into(), period));
        self
    }

    /// Cap the file size; over-limit writes trim the oldest bytes first
    pub fn size_limit(mut self, bytes: u64) -> Self {
        let options = self.file.get_or_insert_with(FileOptions::default);
        options.size_limit = Some(bytes);
        self
    }

    /// Deliver through a background worker instead of on the caller's thread
    pub fn async_delivery(mut self, enabled: bool) -> Self {
        self.async_enabled = enabled;
        self
    }

    /// Bound for the async queue (back-pressure blocks the caller when full)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Validate and produce the rule, using the crate defaults for anything
    /// left unset
    pub fn build(self) -> LogResult<Rule> {
        self.build_with(&Defaults::default())
    }

    pub(crate) fn build_with(self, defaults: &Defaults) -> LogResult<Rule> {
        if self.min_level > self.max_level {
            return Err(LogError::Config(format!(
                "invalid level range: min {} exceeds max {}",
                self.min_level, self.max_level
            )));
        }

        let sink = match self.file {
            Some(options) => {
                let base_name = options
                    .base_name
                    .unwrap_or_else(|| defaults.base_name.clone());
                if base_name.trim().is_empty() {
                    return Err(LogError::Config(
                        "log file name is required when file logging is enabled".to_string(),
                    ));
                }
                let bucket = options.bucket.map(|(format, period)| TimeBucket { period, format });
                Some(Arc::new(FileSink::new(
                    options
                        .directory
                        .unwrap_or_else(|| defaults.directory.clone()),
                    base_name,
                    options
                        .extension
                        .unwrap_or_else(|| defaults.extension.clone()),
                    options.date_stamped,
                    options
                        .date_format
                        .unwrap_or_else(|| defaults.file_date_format.clone()),
                    bucket,
                    options.size_limit,
                )))
            }
            None => None,
        };

        let queue = if self.async_enabled {
            let capacity = self.queue_capacity.unwrap_or(defaults.queue_capacity);
            if capacity == 0 {
                return Err(LogError::Config(
                    "async queue capacity must be greater than zero".to_string(),
                ));
            }
            Some(AsyncQueue {
                capacity,
                sender: Mutex::new(None),
                worker: Mutex::new(None),
            })
        } else {
            None
        };

        let formatter = match self.formatter {
            Some(formatter) => formatter,
            None => {
                eprintln!(
                    "{}",
                    "⚠️ [LOGGER] No formatter set, falling back to plain text".yellow()
                );
                Formatter::PlainText
            }
        };

        Ok(Rule {
            module: self.module,
            submodules: self.submodules,
            min_level: self.min_level,
            max_level: self.max_level,
            current_level: AtomicU8::new(self.min_level as u8),
            console: self.console,
            debug_mode: self.debug_mode,
            debug_level: self.debug_level,
            date_format: self
                .date_format
                .unwrap_or_else(|| defaults.timestamp_format.clone()),
            detailed_errors: self.detailed_errors,
            custom_level_names: self.custom_level_names,
            formatter,
            sink,
            queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_inverted_range() {
        let result = Rule::builder("api")
            .levels(LogLevel::Error, LogLevel::Info)
            .formatter(Formatter::PlainText)
            .build();
        assert!(matches!(result, Err(LogError::Config(_))));
    }

    #[test]
    fn test_build_rejects_zero_capacity() {
        let result = Rule::builder("api")
            .formatter(Formatter::PlainText)
            .async_delivery(true)
            .queue_capacity(0)
            .build();
        assert!(matches!(result, Err(LogError::Config(_))));
    }

    #[test]
    fn test_async_capacity_defaults_to_100() {
        let rule = Rule::builder("api")
            .formatter(Formatter::PlainText)
            .async_delivery(true)
            .build()
            .unwrap();
        assert_eq!(rule.queue.as_ref().unwrap().capacity, 100);
    }

    #[test]
    fn test_applicable_respects_range() {
        let rule = Rule::builder("api")
            .levels(LogLevel::Info, LogLevel::Error)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        assert!(!rule.applicable(LogLevel::Debug));
        assert!(rule.applicable(LogLevel::Info));
        assert!(rule.applicable(LogLevel::Warning));
        assert!(rule.applicable(LogLevel::Error));
        assert!(!rule.applicable(LogLevel::Fatal));
    }

    #[test]
    fn test_debug_and_trace_need_debug_mode() {
        let plain = Rule::builder("api")
            .levels(LogLevel::Trace, LogLevel::Fatal)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        assert!(!plain.applicable(LogLevel::Trace));
        assert!(!plain.applicable(LogLevel::Debug));

        let debugging = Rule::builder("api")
            .levels(LogLevel::Trace, LogLevel::Fatal)
            .debug_mode(true, LogLevel::Debug)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        // debug passes with the flag alone; trace also needs the marker
        assert!(debugging.applicable(LogLevel::Debug));
        assert!(!debugging.applicable(LogLevel::Trace));

        let tracing = Rule::builder("api")
            .levels(LogLevel::Trace, LogLevel::Fatal)
            .debug_mode(true, LogLevel::Trace)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        assert!(tracing.applicable(LogLevel::Trace));
    }

    #[test]
    fn test_custom_level_names_win() {
        let mut names = HashMap::new();
        names.insert(LogLevel::Error, "OOPS".to_string());
        let rule = Rule::builder("api")
            .custom_level_names(names)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        assert_eq!(rule.level_name(LogLevel::Error), "OOPS");
        assert_eq!(rule.level_name(LogLevel::Info), "INFO");
    }

    #[test]
    fn test_last_write_wins() {
        let rule = Rule::builder("api")
            .min_level(LogLevel::Trace)
            .min_level(LogLevel::Warning)
            .formatter(Formatter::PlainText)
            .build()
            .unwrap();
        assert_eq!(rule.min_level, LogLevel::Warning);
    }

    #[test]
    fn test_missing_formatter_falls_back_to_plain_text() {
        let rule = Rule::builder("api").build().unwrap();
        assert!(matches!(rule.formatter, Formatter::PlainText));
    }
}
