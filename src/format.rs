//! Message rendering for dispatched log events
//!
//! Handles:
//! - The formatter variants a rule can carry (plain text, JSON, YAML, XML,
//!   user-defined closure)
//! - One rendering entry point shared by the sync and async delivery paths
//! - Broken pipe handling for piped console output

use serde::Serialize;
use std::io::{stdout, ErrorKind, Write};
use std::sync::Arc;

use crate::error::LogError;

/// Signature of a user-supplied formatter:
/// (message, level name, module, submodules, timestamp) -> rendered line
pub type UserFormatFn = dyn Fn(&str, &str, &str, &[String], &str) -> String + Send + Sync;

/// How a rule renders an event before delivery.
///
/// Every variant receives the same inputs and returns the final payload,
/// trailing newline included. Rendering happens on the caller's thread before
/// any queueing, so the rendered bytes are identical for console and file.
#[derive(Clone)]
pub enum Formatter {
    PlainText,
    Json,
    Yaml,
    Xml,
    UserDefined(Arc<UserFormatFn>),
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: &'a str,
    level: &'a str,
    module: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    submodules: Option<&'a [String]>,
    message: &'a str,
}

impl Formatter {
    /// Resolve a formatter identifier from a configuration file.
    ///
    /// `userdefined`/`custom` need an accompanying template and are handled
    /// by the config loader; here they are rejected so an identifier without
    /// a template fails fast.
    pub fn parse(name: &str) -> Result<Self, LogError> {
        match name.to_lowercase().as_str() {
            "plaintext" | "plain" => Ok(Formatter::PlainText),
            "json" => Ok(Formatter::Json),
            "yaml" => Ok(Formatter::Yaml),
            "xml" => Ok(Formatter::Xml),
            other => Err(LogError::Config(format!("unsupported log format: {}", other))),
        }
    }

    /// Render one event
    pub fn format(
        &self,
        message: &str,
        level: &str,
        module: &str,
        submodules: &[String],
        timestamp: &str,
    ) -> String {
        match self {
            Formatter::PlainText => {
                if submodules.is_empty() {
                    format!("{} | {} | [{}] : {}\n", timestamp, level, module, message)
                } else {
                    format!(
                        "{} | {} | [{}] - [{}]: {}\n",
                        timestamp,
                        level,
                        module,
                        submodules.join(", "),
                        message
                    )
                }
            }
            Formatter::Json => {
                let record = Record {
                    timestamp,
                    level,
                    module,
                    submodules: if submodules.is_empty() { None } else { Some(submodules) },
                    message,
                };
                let mut line = serde_json::to_string(&record).unwrap_or_default();
                line.push('\n');
                line
            }
            Formatter::Yaml => {
                let record = Record {
                    timestamp,
                    level,
                    module,
                    submodules: if submodules.is_empty() { None } else { Some(submodules) },
                    message,
                };
                // serde_yaml terminates with a newline; the second one keeps
                // consecutive records visually separated in the file
                let mut doc = serde_yaml::to_string(&record).unwrap_or_default();
                doc.push('\n');
                doc
            }
            Formatter::Xml => {
                if submodules.is_empty() {
                    format!(
                        "<LogEntry>\n    <Timestamp>{}</Timestamp>\n    <LogLevel>{}</LogLevel>\n    <ModuleName>{}</ModuleName>\n    <Message>{}</Message>\n</LogEntry>\n",
                        timestamp, level, module, message
                    )
                } else {
                    format!(
                        "<LogEntry>\n    <Timestamp>{}</Timestamp>\n    <LogLevel>{}</LogLevel>\n    <ModuleName>{}</ModuleName>\n    <Submodules>{}</Submodules>\n    <Message>{}</Message>\n</LogEntry>\n",
                        timestamp,
                        level,
                        module,
                        submodules.join(", "),
                        message
                    )
                }
            }
            Formatter::UserDefined(f) => f(message, level, module, submodules, timestamp),
        }
    }
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Formatter::PlainText => "PlainText",
            Formatter::Json => "Json",
            Formatter::Yaml => "Yaml",
            Formatter::Xml => "Xml",
            Formatter::UserDefined(_) => "UserDefined",
        };
        write!(f, "Formatter::{}", name)
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::PlainText
    }
}

/// Print a rendered payload to stdout but ignore broken pipe errors.
///
/// The payload carries its own trailing newline, so no newline is appended.
pub(crate) fn print_console(payload: &str) {
    if let Err(e) = write!(stdout(), "{}", payload) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_text_without_submodules() {
        let line = Formatter::PlainText.format("started", "INFO", "api", &[], "2026-08-07 10:00:00");
        assert_eq!(line, "2026-08-07 10:00:00 | INFO | [api] : started\n");
    }

    #[test]
    fn test_plain_text_with_submodules() {
        let line = Formatter::PlainText.format(
            "started",
            "INFO",
            "api",
            &subs(&["http", "auth"]),
            "2026-08-07 10:00:00",
        );
        assert_eq!(
            line,
            "2026-08-07 10:00:00 | INFO | [api] - [http, auth]: started\n"
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let line = Formatter::Json.format("started", "INFO", "api", &[], "ts");
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["module"], "api");
        assert_eq!(value["message"], "started");
        assert!(value.get("submodules").is_none());
    }

    #[test]
    fn test_yaml_contains_fields() {
        let doc = Formatter::Yaml.format("started", "WARNING", "api", &subs(&["http"]), "ts");
        assert!(doc.contains("level: WARNING"));
        assert!(doc.contains("module: api"));
        assert!(doc.contains("- http"));
        assert!(doc.ends_with("\n\n"));
    }

    #[test]
    fn test_xml_structure() {
        let doc = Formatter::Xml.format("boom", "ERROR", "api", &[], "ts");
        assert!(doc.starts_with("<LogEntry>\n"));
        assert!(doc.contains("    <LogLevel>ERROR</LogLevel>\n"));
        assert!(doc.contains("    <Message>boom</Message>\n"));
        assert!(doc.ends_with("</LogEntry>\n"));
    }

    #[test]
    fn test_user_defined_closure() {
        let formatter = Formatter::UserDefined(Arc::new(|message, level, module, _, ts| {
            format!("{}!{}!{}!{}\n", ts, level, module, message)
        }));
        let line = formatter.format("go", "FATAL", "core", &[], "now");
        assert_eq!(line, "now!FATAL!core!go\n");
    }

    #[test]
    fn test_parse_identifiers() {
        assert!(matches!(Formatter::parse("PlainText").unwrap(), Formatter::PlainText));
        assert!(matches!(Formatter::parse("json").unwrap(), Formatter::Json));
        assert!(matches!(Formatter::parse("YAML").unwrap(), Formatter::Yaml));
        assert!(matches!(Formatter::parse("xml").unwrap(), Formatter::Xml));
        assert!(Formatter::parse("csv").is_err());
    }
}
