// RUNTIME PREFERENCES (User Experience)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a runtime configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid runtime configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypecheckPreferences {
    /// Accept String where an Entity is expected (and the reverse)
    pub lenient_assignability: bool,

    /// Emit a debug event for every schema lookup
    pub log_schema_lookups: bool,
}

impl Default for TypecheckPreferences {
    fn default() -> Self {
        Self {
            lenient_assignability: env::var(env_vars::TYPECHECK_LENIENT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_schema_lookups: env::var(env_vars::TYPECHECK_LOG_SCHEMA_LOOKUPS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationPreferences {
    /// Compatibility version used when the caller does not give one
    pub default_compatibility: Option<String>,

    /// Treat every quoted string in the sentence as a copy candidate
    pub explicit_strings: bool,

    /// Append the entity value to generic entity placeholders
    pub include_entity_value: bool,
}

impl Default for SerializationPreferences {
    fn default() -> Self {
        Self {
            default_compatibility: env::var(env_vars::SERIALIZATION_COMPATIBILITY).ok(),
            explicit_strings: env::var(env_vars::SERIALIZATION_EXPLICIT_STRINGS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            include_entity_value: env::var(env_vars::SERIALIZATION_INCLUDE_ENTITY_VALUE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging (user preference)
    pub use_structured_logging: bool,

    /// Whether to enable console output (user preference)
    pub enable_console_logging: bool,

    /// User preferred minimum log level
    pub min_log_level: LogLevel,

    /// Whether to include timing events in logs
    pub log_performance_events: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var(env_vars::LOGGING_USE_STRUCTURED)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            enable_console_logging: env::var(env_vars::LOGGING_ENABLE_CONSOLE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
            log_performance_events: env::var(env_vars::LOGGING_LOG_PERFORMANCE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
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

    /// Convert to events::LogLevel
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub typecheck: TypecheckPreferences,
    pub serialization: SerializationPreferences,
    pub logging: LoggingPreferences,
}

impl RuntimeConfig {
    /// Parse a configuration document; missing sections fall back to the environment defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    // Typecheck
    pub const TYPECHECK_LENIENT: &str = "THINGTALK_TYPECHECK_LENIENT";
    pub const TYPECHECK_LOG_SCHEMA_LOOKUPS: &str = "THINGTALK_TYPECHECK_LOG_SCHEMA_LOOKUPS";

    // Serialization
    pub const SERIALIZATION_COMPATIBILITY: &str = "THINGTALK_SERIALIZATION_COMPATIBILITY";
    pub const SERIALIZATION_EXPLICIT_STRINGS: &str = "THINGTALK_SERIALIZATION_EXPLICIT_STRINGS";
    pub const SERIALIZATION_INCLUDE_ENTITY_VALUE: &str =
        "THINGTALK_SERIALIZATION_INCLUDE_ENTITY_VALUE";

    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "THINGTALK_LOGGING_USE_STRUCTURED";
    pub const LOGGING_ENABLE_CONSOLE: &str = "THINGTALK_LOGGING_ENABLE_CONSOLE";
    pub const LOGGING_MIN_LEVEL: &str = "THINGTALK_LOGGING_MIN_LEVEL";
    pub const LOGGING_LOG_PERFORMANCE: &str = "THINGTALK_LOGGING_LOG_PERFORMANCE";
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("ERROR"), Some(LogLevel::Error));
        assert_eq!(parse_log_level("warn"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("1"), Some(LogLevel::Warning));
        assert_eq!(parse_log_level("info"), Some(LogLevel::Info));
        assert_eq!(parse_log_level("debug"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("3"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("invalid"), None);
    }

    #[test]
    fn test_partial_toml_document() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [typecheck]
            lenient_assignability = true

            [serialization]
            default_compatibility = "1.9.0"
            "#,
        )
        .unwrap();

        assert!(config.typecheck.lenient_assignability);
        assert_eq!(
            config.serialization.default_compatibility.as_deref(),
            Some("1.9.0")
        );
    }

    #[test]
    fn test_invalid_toml_document() {
        let result = RuntimeConfig::from_toml_str("[typecheck]\nlenient_assignability = 3");
        assert_matches!(result, Err(ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nmin_log_level = \"Debug\"").unwrap();

        let config = RuntimeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.logging.min_log_level, LogLevel::Debug);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RuntimeConfig::load_from_file(dir.path().join("missing.toml"));
        assert_matches!(result, Err(ConfigError::Io { .. }));
    }
}
