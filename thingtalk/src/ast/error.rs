//! Structural errors raised by AST constructors and conversions

use crate::logging::codes;
use crate::utils::{truncate_message, SourceRange};
use thiserror::Error;

pub type AstResult<T> = Result<T, AstError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstError {
    /// Malformed node arguments (E010)
    #[error("Invalid AST structure: {message}")]
    InvalidStructure {
        message: String,
        range: Option<SourceRange>,
    },

    /// Construct with no legacy equivalent (E011)
    #[error("Cannot convert {construct} to legacy syntax")]
    Unserializable {
        construct: String,
        range: Option<SourceRange>,
    },

    /// Dialogue history invariant violation (E012)
    #[error("Invalid dialogue state: {message}")]
    InvalidDialogueState { message: String },

    /// Runtime conversion of a value that is not a constant (E013)
    #[error("Value '{value}' is not a constant")]
    NonConstant { value: String },
}

impl AstError {
    pub fn error_code(&self) -> codes::Code {
        match self {
            AstError::InvalidStructure { .. } => codes::ast::INVALID_STRUCTURE,
            AstError::Unserializable { .. } => codes::ast::UNSERIALIZABLE,
            AstError::InvalidDialogueState { .. } => codes::ast::INVALID_DIALOGUE_STATE,
            AstError::NonConstant { .. } => codes::ast::NON_CONSTANT_VALUE,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AstError::InvalidStructure { .. } => "InvalidStructure",
            AstError::Unserializable { .. } => "Unserializable",
            AstError::InvalidDialogueState { .. } => "InvalidDialogueState",
            AstError::NonConstant { .. } => "NonConstant",
        }
    }

    pub fn range(&self) -> Option<SourceRange> {
        match self {
            AstError::InvalidStructure { range, .. } | AstError::Unserializable { range, .. } => {
                *range
            }
            _ => None,
        }
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.error_code().as_str())
    }

    pub fn invalid_structure(message: &str, range: Option<SourceRange>) -> Self {
        Self::InvalidStructure {
            message: truncate_message(message),
            range,
        }
    }

    pub fn unserializable(construct: &str, range: Option<SourceRange>) -> Self {
        crate::log_error!(
            codes::serialization::LEGACY_CONVERSION_FAILED,
            "Construct has no legacy equivalent",
            range = range,
            "construct" => construct
        );
        Self::Unserializable {
            construct: construct.to_string(),
            range,
        }
    }

    pub fn invalid_dialogue_state(message: &str) -> Self {
        Self::InvalidDialogueState {
            message: truncate_message(message),
        }
    }

    pub fn non_constant(value: &str) -> Self {
        Self::NonConstant {
            value: truncate_message(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_types() {
        let err = AstError::unserializable("join expression", None);
        assert_eq!(err.error_code(), codes::ast::UNSERIALIZABLE);
        assert_eq!(err.error_type(), "Unserializable");
        assert_eq!(err.to_string(), "Cannot convert join expression to legacy syntax");
        assert!(err.is_recoverable());
    }
}
