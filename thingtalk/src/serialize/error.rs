//! Serialization errors

use crate::ast::AstError;
use crate::entities::EntityError;
use crate::logging::codes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    /// The requested syntax cannot express the input
    #[error(transparent)]
    Ast(#[from] AstError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("Serialized output has {count} tokens, more than the limit of {limit}")]
    TokenLimitExceeded { count: usize, limit: usize },
}

impl SerializeError {
    pub fn error_code(&self) -> codes::Code {
        match self {
            SerializeError::Ast(err) => err.error_code(),
            SerializeError::Entity(err) => err.error_code(),
            SerializeError::TokenLimitExceeded { .. } => codes::serialization::TOKEN_LIMIT_EXCEEDED,
        }
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.error_code().as_str())
    }

    pub fn token_limit_exceeded(count: usize, limit: usize) -> Self {
        crate::log_error!(
            codes::serialization::TOKEN_LIMIT_EXCEEDED,
            "Token limit exceeded",
            "count" => count,
            "limit" => limit
        );
        Self::TokenLimitExceeded { count, limit }
    }
}
