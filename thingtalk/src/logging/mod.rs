//! Global logging module
//!
//! Provides a process-wide logging service and a macro interface. Every
//! logging call is a no-op until [`init_global_logging`] or
//! [`init_global_logging_with_service`] has been called, so library users who
//! never initialize logging pay nothing and see no output.

pub mod codes;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use events::{LogEvent, LogLevel};
pub use service::{ConsoleLogger, Logger, LoggingService, MemoryLogger, StructuredLogger};

use crate::config::RuntimeConfig;
use crate::utils::SourceRange;

// ============================================================================
// GLOBAL STATE
// ============================================================================

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize global logging from the runtime configuration
pub fn init_global_logging() -> Result<(), String> {
    let logging_service = Arc::new(service::create_configured_service());

    GLOBAL_LOGGER
        .set(logging_service.clone())
        .map_err(|_| "Global logger already initialized".to_string())?;

    logging_service.log_event(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Global logging system initialized",
    ));
    logging_service.log_event(LogEvent::debug(&config::get_config_summary()));

    Ok(())
}

/// Initialize global logging with preferences from a loaded runtime configuration
pub fn init_global_logging_from(config: &RuntimeConfig) -> Result<(), String> {
    self::config::init_runtime_preferences(config.logging.clone())?;
    init_global_logging()
}

/// Initialize with custom service (primarily for testing)
pub fn init_global_logging_with_service(service: Arc<LoggingService>) -> Result<(), String> {
    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized".to_string())
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER.get().is_some()
}

/// Safe access to global logger
pub fn try_get_global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get().map(|service| service.as_ref())
}

// ============================================================================
// MACRO SUPPORT FUNCTIONS
// ============================================================================

/// Log error with context (used by log_error! macro)
pub fn log_error_with_context(
    code: Code,
    message: &str,
    range: Option<SourceRange>,
    context: Vec<(&str, &str)>,
) {
    let Some(logger) = try_get_global_logger() else {
        return;
    };

    let mut event = LogEvent::error(code, message);
    if let Some(r) = range {
        event = event.with_range(r);
    }
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    logger.log_event(event);
}

/// Log success with context (used by log_success! macro)
pub fn log_success_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    let Some(logger) = try_get_global_logger() else {
        return;
    };

    let mut event = LogEvent::success(code, message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    logger.log_event(event);
}

/// Log a codeless event at the given level (used by log_info!, log_warning!, log_debug!)
pub fn log_with_context(level: LogLevel, message: &str, context: Vec<(&str, &str)>) {
    let Some(logger) = try_get_global_logger() else {
        return;
    };
    if level > config::get_min_log_level() {
        return;
    }

    let mut event = LogEvent::new(level, None, message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    logger.log_event(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninitialized_logging_is_noop() {
        // Must not panic whether or not another test initialized logging
        log_error_with_context(codes::system::INTERNAL_ERROR, "test", None, vec![]);
        log_with_context(LogLevel::Debug, "test", vec![("k", "v")]);
    }
}
