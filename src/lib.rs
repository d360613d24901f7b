//! Rule-driven logging with per-module dispatch, rotating files and async
//! delivery
//!
//! This crate routes leveled log events through registered rules:
//! - Level-range filtering with any number of rules per module
//! - Per-rule rendering (plain text, JSON, YAML, XML or a user closure)
//! - Console and rotating-file destinations with date-stamped names,
//!   time-bucketed folders and size-capped trimming
//! - Synchronous in-call writes or a bounded queue drained by a background
//!   worker per rule
//!
//! ## Usage
//!
//! ```rust
//! use modlog::{Formatter, Logger, LogLevel, Rule};
//!
//! let mut logger = Logger::new();
//! logger
//!     .rule(
//!         Rule::builder("api")
//!             .levels(LogLevel::Info, LogLevel::Error)
//!             .console(true)
//!             .formatter(Formatter::PlainText),
//!     )
//!     .unwrap();
//!
//! logger.info("api", "service started");
//! logger.debug("api", "filtered out: below the rule's range");
//! ```
//!
//! ## File logging
//!
//! ```rust,no_run
//! use modlog::{Formatter, Logger, LogLevel, Rule};
//! use std::time::Duration;
//!
//! let mut logger = Logger::new();
//! logger
//!     .rule(
//!         Rule::builder("api")
//!             .levels(LogLevel::Info, LogLevel::Fatal)
//!             .formatter(Formatter::Json)
//!             .file_logging("logs", "app", ".log")
//!             .date_stamped_files("%Y-%m-%d")
//!             .time_bucketing("%Y-%m-%d", Duration::from_secs(24 * 3600))
//!             .size_limit(1024 * 1024)
//!             .async_delivery(true),
//!     )
//!     .unwrap();
//!
//! logger.info("api", "goes through the background worker");
//! logger.shutdown(); // drain the queue, join the worker, close the file
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod file;
pub mod format;
pub mod levels;
pub mod rule;
pub mod shutdown;

mod worker;

pub use crate::config::{AsyncConfig, FileConfig, FolderConfig, LoggerConfig, RuleConfig};
pub use crate::core::{Defaults, Logger};
pub use crate::error::{DetailedError, LogError, LogResult};
pub use crate::file::{FileSink, TimeBucket};
pub use crate::format::{Formatter, UserFormatFn};
pub use crate::levels::LogLevel;
pub use crate::rule::{Rule, RuleBuilder};
pub use crate::shutdown::install_shutdown_handler;
