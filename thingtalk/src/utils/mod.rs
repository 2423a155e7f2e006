//! Shared primitive types used across the AST, typechecker and serializers

pub mod span;

pub use span::{SourceLocation, SourceRange};

use crate::config::compile_time::typecheck::MAX_ERROR_MESSAGE_LENGTH;

/// Bound a message to the configured maximum error message length
pub fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
        return message.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LENGTH.saturating_sub(3);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short"), "short");
        let long = "x".repeat(MAX_ERROR_MESSAGE_LENGTH + 10);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.len(), MAX_ERROR_MESSAGE_LENGTH);
        assert!(truncated.ends_with("..."));
    }
}
