use serde::de::{self, Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::LogError;

/// Log level definitions for rule-based dispatch
///
/// Levels are ordered by severity (Trace < Debug < Info < Warning < Error < Fatal)
/// so rules can filter with an inclusive [min, max] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Trace = 0,   // Finest-grained tracing, gated by a rule's debug mode
    Debug = 1,   // Diagnostic detail, gated by a rule's debug mode
    Info = 2,    // Standard operational messages (default)
    Warning = 3, // Important issues that need attention
    Error = 4,   // Failures the caller should look at
    Fatal = 5,   // Unrecoverable failures
}

impl LogLevel {
    /// Get the default string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Recover a level from its numeric value (the `AtomicU8` diagnostic on rules)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LogLevel::Trace),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warning),
            4 => Some(LogLevel::Error),
            5 => Some(LogLevel::Fatal),
            _ => None,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    /// Parse from string (case-insensitive, single-letter shorthand accepted)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" | "t" => Ok(LogLevel::Trace),
            "debug" | "d" => Ok(LogLevel::Debug),
            "info" | "i" => Ok(LogLevel::Info),
            "warning" | "warn" | "w" => Ok(LogLevel::Warning),
            "error" | "e" => Ok(LogLevel::Error),
            "fatal" | "f" => Ok(LogLevel::Fatal),
            _ => Err(LogError::Config(format!("invalid log level: {}", s))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_parse_accepts_names_and_shorthand() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("e".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("T".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("verbose".parse::<LogLevel>().is_err());
        assert!("".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_from_u8_roundtrip() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Fatal,
        ] {
            assert_eq!(LogLevel::from_u8(level as u8), Some(level));
        }
        assert_eq!(LogLevel::from_u8(6), None);
    }
}
