//! Log events emitted by the typechecker, serializers and entity retrievers

use super::codes::{self, Code};
use crate::config::compile_time::logging::MAX_LOG_MESSAGE_LENGTH;
use crate::utils::SourceRange;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity levels, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error = 0,
    #[serde(rename = "WARN")]
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Placeholder code for events logged without one
    fn default_code(self) -> Code {
        match self {
            LogLevel::Error => codes::system::INTERNAL_ERROR,
            LogLevel::Warning => Code::new("W000"),
            LogLevel::Info => Code::new("I000"),
            LogLevel::Debug => Code::new("D000"),
        }
    }
}

/// A single logged occurrence.
///
/// `range` points at the AST node the event concerns, when the node was
/// parsed from source. `context` holds free-form key/value pairs such as the
/// function or parameter name.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: SystemTime,
    pub level: LogLevel,
    pub code: Code,
    pub message: String,
    pub range: Option<SourceRange>,
    pub context: BTreeMap<String, String>,
}

/// Shape of an event in structured output
#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: u64,
    level: LogLevel,
    code: &'static str,
    category: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<&'a SourceRange>,
    #[serde(skip_serializing_if = "is_empty")]
    context: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonErrorMetadata>,
}

#[derive(Serialize)]
struct JsonErrorMetadata {
    severity: &'static str,
    recoverable: bool,
    requires_halt: bool,
    description: &'static str,
    recommended_action: &'static str,
}

fn is_empty(context: &&BTreeMap<String, String>) -> bool {
    context.is_empty()
}

fn clip(message: &str) -> String {
    if message.len() <= MAX_LOG_MESSAGE_LENGTH {
        return message.to_string();
    }
    let mut cut = MAX_LOG_MESSAGE_LENGTH;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &message[..cut])
}

impl LogEvent {
    pub fn new(level: LogLevel, code: Option<Code>, message: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            level,
            code: code.unwrap_or_else(|| level.default_code()),
            message: clip(message),
            range: None,
            context: BTreeMap::new(),
        }
    }

    pub fn error(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Error, Some(code), message)
    }

    pub fn warning(message: &str) -> Self {
        Self::new(LogLevel::Warning, None, message)
    }

    pub fn info(message: &str) -> Self {
        Self::new(LogLevel::Info, None, message)
    }

    /// Info event tagged with one of the `codes::success` codes
    pub fn success(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Info, Some(code), message)
    }

    pub fn debug(message: &str) -> Self {
        Self::new(LogLevel::Debug, None, message)
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }

    pub fn is_info(&self) -> bool {
        self.level == LogLevel::Info
    }

    /// Area of the pipeline the code belongs to (`Typecheck`, `Entities`, ...)
    pub fn category(&self) -> &'static str {
        codes::get_category(self.code.as_str())
    }

    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        let code = self.code.as_str();
        let error = self.is_error().then(|| JsonErrorMetadata {
            severity: codes::get_severity(code).as_str(),
            recoverable: codes::is_recoverable(code),
            requires_halt: codes::requires_halt(code),
            description: codes::get_description(code),
            recommended_action: codes::get_action(code),
        });

        serde_json::to_string(&JsonEvent {
            timestamp: self
                .timestamp
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0),
            level: self.level,
            code,
            category: self.category(),
            message: &self.message,
            range: self.range.as_ref(),
            context: &self.context,
            error,
        })
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.level.as_str(), self.code.as_str(), self.message)?;
        if let Some(range) = &self.range {
            write!(f, " at {}", range.start)?;
        }
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SourceLocation;

    #[test]
    fn test_error_event_creation() {
        let event = LogEvent::error(codes::typecheck::FUNCTION_NOT_FOUND, "no such function");

        assert!(event.is_error());
        assert_eq!(event.code.as_str(), "E100");
        assert_eq!(event.category(), "Typecheck");
        assert_eq!(LogEvent::debug("x").code.as_str(), "D000");
    }

    #[test]
    fn test_display_with_context_and_range() {
        let range = SourceRange::new(SourceLocation::text(0, 1, 1), SourceLocation::text(5, 1, 6));
        let event = LogEvent::error(codes::typecheck::TYPE_MISMATCH, "bad type")
            .with_range(range)
            .with_context("param", "temperature")
            .with_context("function", "@org.weather.current");

        assert_eq!(
            event.to_string(),
            "[ERROR E104] bad type at 1:1 (function=@org.weather.current, param=temperature)"
        );
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "é".repeat(MAX_LOG_MESSAGE_LENGTH);
        let event = LogEvent::info(&long);
        assert!(event.message.len() <= MAX_LOG_MESSAGE_LENGTH + 3);
        assert!(event.message.ends_with("..."));
    }

    #[test]
    fn test_json_formatting() {
        let event = LogEvent::error(codes::entities::ENTITY_NOT_FOUND, "missing")
            .with_context("type", "NUMBER");
        let json: serde_json::Value = serde_json::from_str(&event.format_json().unwrap()).unwrap();
        assert_eq!(json["level"], "ERROR");
        assert_eq!(json["code"], "E300");
        assert_eq!(json["context"]["type"], "NUMBER");
        assert_eq!(json["error"]["recoverable"], true);
        assert!(json.get("range").is_none());

        let info: serde_json::Value =
            serde_json::from_str(&LogEvent::info("hello").format_json().unwrap()).unwrap();
        assert!(info.get("error").is_none());
        assert!(info.get("context").is_none());
    }
}
