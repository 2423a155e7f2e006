//! Logging service and logger backends

use super::codes::Code;
use super::config;
use super::events::{LogEvent, LogLevel};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Sink for log events. Implementations filter by their own level.
pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent);
}

/// Front end of the global logger: drops events below `min_level` and
/// forwards the rest to one backend
pub struct LoggingService {
    logger: Arc<dyn Logger>,
    min_level: LogLevel,
}

impl LoggingService {
    pub fn new(logger: Arc<dyn Logger>, min_level: LogLevel) -> Self {
        Self { logger, min_level }
    }

    /// Backend chosen from the runtime logging preferences: structured JSON,
    /// plain console lines, or an in-memory buffer when console output is off
    pub fn with_config() -> Self {
        let min_level = config::get_min_log_level();
        let logger: Arc<dyn Logger> = if config::use_structured_logging() {
            Arc::new(StructuredLogger::new(min_level))
        } else if config::use_console_logging() {
            Arc::new(ConsoleLogger::new(min_level))
        } else {
            Arc::new(MemoryLogger::new())
        };

        Self::new(logger, min_level)
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level <= self.min_level
    }

    pub fn log_event(&self, event: LogEvent) {
        if self.should_log(event.level) {
            self.logger.log(&event);
        }
    }

    pub fn log_error(&self, error_code: Code, message: &str) {
        self.log_event(LogEvent::error(error_code, message));
    }

    pub fn log_success(&self, success_code: Code, message: &str) {
        self.log_event(LogEvent::success(success_code, message));
    }
}

/// Plain-text logger writing to stdout/stderr
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, event: &LogEvent) {
        if event.level <= self.min_level {
            match event.level {
                LogLevel::Error => eprintln!("{}", event),
                _ => println!("{}", event),
            }
        }
    }
}

/// Structured logger for JSON output
pub struct StructuredLogger {
    min_level: LogLevel,
}

impl StructuredLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl Logger for StructuredLogger {
    fn log(&self, event: &LogEvent) {
        if event.level > self.min_level {
            return;
        }
        let line = event.format_json().unwrap_or_else(|_| event.to_string());
        match event.level {
            LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Bounded in-memory logger, used by tests and embedders that inspect events
pub struct MemoryLogger {
    events: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::with_capacity(config::get_log_buffer_size())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get_events(&self) -> Vec<LogEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.get_events().len()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn get_errors(&self) -> Vec<LogEvent> {
        self.get_events()
            .into_iter()
            .filter(|event| event.is_error())
            .collect()
    }

    pub fn has_error_with_code(&self, code: Code) -> bool {
        self.get_events()
            .iter()
            .any(|event| event.is_error() && event.code == code)
    }

    /// Events whose code belongs to `category` (`Typecheck`, `Entities`, ...)
    pub fn events_in_category(&self, category: &str) -> Vec<LogEvent> {
        self.get_events()
            .into_iter()
            .filter(|event| event.category() == category)
            .collect()
    }

    pub fn has_success_with_code(&self, code: Code) -> bool {
        self.get_events()
            .iter()
            .any(|event| event.is_info() && event.code == code)
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, event: &LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() >= self.capacity {
                events.pop_front();
            }
            events.push_back(event.clone());
        }
    }
}

pub fn create_configured_service() -> LoggingService {
    LoggingService::with_config()
}

/// Unbounded-level memory logger for inspecting events in tests
pub fn create_test_logger() -> Arc<MemoryLogger> {
    Arc::new(MemoryLogger::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;

    #[test]
    fn test_memory_logger_captures_events() {
        let logger = create_test_logger();
        let service = LoggingService::new(logger.clone(), LogLevel::Debug);

        service.log_error(codes::typecheck::UNKNOWN_ARGUMENT, "unknown argument foo");
        service.log_success(codes::success::TYPECHECK_COMPLETE, "done");

        assert_eq!(logger.event_count(), 2);
        assert!(logger.has_error_with_code(codes::typecheck::UNKNOWN_ARGUMENT));
        assert!(logger.has_success_with_code(codes::success::TYPECHECK_COMPLETE));
        assert_eq!(logger.get_errors().len(), 1);

        service.log_error(codes::entities::ENTITY_NOT_FOUND, "no NUMBER_0");
        assert_eq!(logger.events_in_category("Typecheck").len(), 2);
        assert_eq!(logger.events_in_category("Entities").len(), 1);
    }

    #[test]
    fn test_min_level_filtering() {
        let logger = create_test_logger();
        let service = LoggingService::new(logger.clone(), LogLevel::Warning);

        service.log_event(LogEvent::debug("hidden"));
        service.log_event(LogEvent::warning("shown"));
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_memory_logger_is_bounded() {
        let logger = MemoryLogger::with_capacity(2);
        for i in 0..5 {
            logger.log(&LogEvent::info(&format!("event {}", i)));
        }
        let events = logger.get_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message, "event 4");
    }

    #[test]
    fn test_structured_logger() {
        let logger = StructuredLogger::new(LogLevel::Debug);
        let event = LogEvent::error(codes::entities::ENTITY_NOT_FOUND, "Test error")
            .with_context("key", "value");
        logger.log(&event);
    }
}
