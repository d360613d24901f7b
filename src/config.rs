//! Configuration-file loading
//!
//! Builds fully-validated rules from YAML, JSON or TOML files so that
//! everything invalid is rejected before the logger is handed back — log
//! calls never see a malformed rule.
//!
//! ```yaml
//! rules:
//!   - module: api
//!     min_level: info
//!     max_level: error
//!     console: true
//!     formatter: plaintext
//!     file:
//!       path: logs
//!       name: app
//!       extension: .log
//!       date_file: true
//!       date_file_format: "%Y-%m-%d"
//!       max_size: 1048576
//!       folder:
//!         format: "%Y-%m-%d"
//!         period_secs: 86400
//!     async:
//!       enabled: true
//!       buffer_size: 200
//!   - module: api
//!     min_level: error
//!     max_level: fatal
//!     detailed_errors: true
//!     file:
//!       path: logs
//!       name: err
//!       extension: .err
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Defaults, Logger};
use crate::error::{LogError, LogResult};
use crate::format::Formatter;
use crate::levels::LogLevel;
use crate::rule::{Rule, RuleBuilder};

#[derive(Debug, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RuleConfig {
    pub module: String,
    #[serde(default)]
    pub submodules: Vec<String>,
    pub min_level: Option<LogLevel>,
    pub max_level: Option<LogLevel>,
    #[serde(default)]
    pub console: bool,
    #[serde(default)]
    pub debug_mode: bool,
    pub debug_level: Option<LogLevel>,
    pub date_format: Option<String>,
    #[serde(default)]
    pub detailed_errors: bool,
    /// One of: plaintext, json, yaml, xml, userdefined/custom
    pub formatter: Option<String>,
    /// Template for the userdefined formatter; `{timestamp}`, `{level}`,
    /// `{module}`, `{submodules}` and `{message}` are substituted
    pub user_format: Option<String>,
    #[serde(default)]
    pub custom_level_names: HashMap<String, String>,
    pub file: Option<FileConfig>,
    #[serde(rename = "async")]
    pub async_log: Option<AsyncConfig>,
}

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
    pub extension: Option<String>,
    #[serde(default)]
    pub date_file: bool,
    pub date_file_format: Option<String>,
    pub max_size: Option<u64>,
    pub folder: Option<FolderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct FolderConfig {
    pub format: Option<String>,
    pub period_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AsyncConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub buffer_size: Option<usize>,
}

fn default_enabled() -> bool {
    true
}

/// Read and parse a configuration file; the format is picked by extension
pub fn load_config(path: &Path) -> LogResult<LoggerConfig> {
    let data = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&data)
            .map_err(|e| LogError::Config(format!("failed to parse {}: {}", path.display(), e))),
        "json" => serde_json::from_str(&data)
            .map_err(|e| LogError::Config(format!("failed to parse {}: {}", path.display(), e))),
        "toml" => toml::from_str(&data)
            .map_err(|e| LogError::Config(format!("failed to parse {}: {}", path.display(), e))),
        other => Err(LogError::Config(format!(
            "unsupported config file format: .{}",
            other
        ))),
    }
}

impl Logger {
    /// Construct a logger from a configuration file. Any invalid value —
    /// unknown level, missing file name for date-stamped files, unsupported
    /// formatter — fails here, before a single rule is registered.
    pub fn from_config_file(path: impl AsRef<Path>) -> LogResult<Self> {
        let config = load_config(path.as_ref())?;
        Self::from_config(config)
    }

    pub fn from_config(config: LoggerConfig) -> LogResult<Self> {
        let mut logger = Logger::new();
        for rule in config.rules {
            let builder = build_rule(rule)?;
            logger.rule(builder)?;
        }
        Ok(logger)
    }
}

fn build_rule(config: RuleConfig) -> LogResult<RuleBuilder> {
    let defaults = Defaults::default();
    let mut builder = Rule::builder(config.module)
        .submodules(config.submodules)
        .console(config.console)
        .detailed_errors(config.detailed_errors);

    if let Some(min) = config.min_level {
        builder = builder.min_level(min);
    }
    if let Some(max) = config.max_level {
        builder = builder.max_level(max);
    }
    if config.debug_mode {
        builder = builder.debug_mode(true, config.debug_level.unwrap_or(LogLevel::Info));
    }
    if let Some(format) = config.date_format {
        builder = builder.date_format(format);
    }

    if !config.custom_level_names.is_empty() {
        let mut names = HashMap::new();
        for (level, name) in config.custom_level_names {
            names.insert(level.parse::<LogLevel>()?, name);
        }
        builder = builder.custom_level_names(names);
    }

    if let Some(identifier) = config.formatter {
        builder = builder.formatter(resolve_formatter(&identifier, config.user_format)?);
    }

    if let Some(file) = config.file {
        if file.date_file && file.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(LogError::Config(
                "file name is required when date-stamped files are enabled".to_string(),
            ));
        }
        let directory = file.path.unwrap_or_else(|| defaults.directory.clone());
        let name = file.name.unwrap_or_else(|| defaults.base_name.clone());
        let extension = file.extension.unwrap_or_else(|| defaults.extension.clone());
        builder = builder.file_logging(directory, name, extension);

        if file.date_file {
            builder = builder.date_stamped_files(
                file.date_file_format
                    .unwrap_or_else(|| defaults.file_date_format.clone()),
            );
        }
        if let Some(limit) = file.max_size {
            builder = builder.size_limit(limit);
        }
        if let Some(folder) = file.folder {
            builder = builder.time_bucketing(
                folder.format.unwrap_or_else(|| defaults.bucket_format.clone()),
                folder
                    .period_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.bucket_period),
            );
        }
    }

    if let Some(async_log) = config.async_log {
        if async_log.enabled {
            builder = builder.async_delivery(true);
            if let Some(capacity) = async_log.buffer_size {
                builder = builder.queue_capacity(capacity);
            }
        }
    }

    Ok(builder)
}

fn resolve_formatter(identifier: &str, user_format: Option<String>) -> LogResult<Formatter> {
    match identifier.to_lowercase().as_str() {
        "userdefined" | "custom" => {
            let template = user_format.ok_or_else(|| {
                LogError::Config(
                    "user_format is required for the userdefined log format".to_string(),
                )
            })?;
            Ok(template_formatter(template))
        }
        other => Formatter::parse(other),
    }
}

/// Wrap a `{placeholder}` template into a formatter closure
fn template_formatter(template: String) -> Formatter {
    Formatter::UserDefined(Arc::new(move |message, level, module, submodules, timestamp| {
        let mut line = template
            .replace("{timestamp}", timestamp)
            .replace("{level}", level)
            .replace("{module}", module)
            .replace("{submodules}", &submodules.join(", "))
            .replace("{message}", message);
        if !line.ends_with('\n') {
            line.push('\n');
        }
        line
    }))
}
