//! Logging macros. Context values accept any `Display` type.

/// Log error with a `Code`, an optional source range and key/value context
#[macro_export]
macro_rules! log_error {
    ($code:expr, $message:expr) => {
        $crate::logging::log_error_with_context($code, $message, None, vec![])
    };

    ($code:expr, $message:expr, range = $range:expr) => {
        $crate::logging::log_error_with_context($code, $message, $range, vec![])
    };

    ($code:expr, $message:expr, $($key:expr => $value:expr),+ $(,)?) => {
        {
            let context_strings: Vec<(&str, String)> = vec![$(($key, format!("{}", $value))),+];
            let context_refs: Vec<(&str, &str)> = context_strings.iter()
                .map(|(k, v)| (*k, v.as_str()))
                .collect();
            $crate::logging::log_error_with_context($code, $message, None, context_refs)
        }
    };

    ($code:expr, $message:expr, range = $range:expr, $($key:expr => $value:expr),+ $(,)?) => {
        {
            let context_strings: Vec<(&str, String)> = vec![$(($key, format!("{}", $value))),+];
            let context_refs: Vec<(&str, &str)> = context_strings.iter()
                .map(|(k, v)| (*k, v.as_str()))
                .collect();
            $crate::logging::log_error_with_context($code, $message, $range, context_refs)
        }
    };
}

/// Log success with a `Code` and key/value context
#[macro_export]
macro_rules! log_success {
    ($code:expr, $message:expr) => {
        $crate::logging::log_success_with_context($code, $message, vec![])
    };

    ($code:expr, $message:expr, $($key:expr => $value:expr),+ $(,)?) => {
        {
            let context_strings: Vec<(&str, String)> = vec![$(($key, format!("{}", $value))),+];
            let context_refs: Vec<(&str, &str)> = context_strings.iter()
                .map(|(k, v)| (*k, v.as_str()))
                .collect();
            $crate::logging::log_success_with_context($code, $message, context_refs)
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_level {
    ($level:expr, $message:expr) => {
        $crate::logging::log_with_context($level, $message, vec![])
    };

    ($level:expr, $message:expr, $($key:expr => $value:expr),+ $(,)?) => {
        if $crate::logging::is_initialized() {
            let context_strings: Vec<(&str, String)> = vec![$(($key, format!("{}", $value))),+];
            let context_refs: Vec<(&str, &str)> = context_strings.iter()
                .map(|(k, v)| (*k, v.as_str()))
                .collect();
            $crate::logging::log_with_context($level, $message, context_refs)
        }
    };
}

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__log_level!($crate::logging::LogLevel::Info, $($arg)*)
    };
}

/// Log warning message
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::__log_level!($crate::logging::LogLevel::Warning, $($arg)*)
    };
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__log_level!($crate::logging::LogLevel::Debug, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use crate::logging::codes;

    #[test]
    fn test_macro_forms_compile_and_do_not_panic() {
        let count: usize = 3;
        log_error!(codes::typecheck::TYPE_MISMATCH, "bad type");
        log_error!(codes::typecheck::TYPE_MISMATCH, "bad type", range = None);
        log_error!(codes::typecheck::TYPE_MISMATCH, "bad type",
            "param" => "temperature",
            "count" => count
        );
        log_success!(codes::success::TYPECHECK_COMPLETE, "done", "statements" => count);
        log_info!("info message");
        log_warning!("warning", "k" => 1);
        log_debug!("debug", "flag" => true);
    }
}
