//! Entity retrieval errors

use crate::logging::codes;
use crate::utils::truncate_message;
use thiserror::Error;

pub type EntityResult<T> = Result<T, EntityError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntityError {
    /// Value is neither mentioned in the sentence nor present in the entity map
    #[error("Cannot find entity {entity_type} for value {value}, have {known}")]
    NotFound {
        entity_type: String,
        value: String,
        /// Rendering of the known entity map, for diagnostics
        known: String,
    },

    #[error("Too many entities of type {entity_type} (limit {limit})")]
    LimitExceeded { entity_type: String, limit: usize },

    /// Value has no entity representation (e.g. a relative location)
    #[error("Value {value} cannot be stored as {entity_type}")]
    InvalidValue { entity_type: String, value: String },
}

impl EntityError {
    pub fn error_code(&self) -> codes::Code {
        match self {
            EntityError::NotFound { .. } => codes::entities::ENTITY_NOT_FOUND,
            EntityError::LimitExceeded { .. } => codes::entities::ENTITY_LIMIT_EXCEEDED,
            EntityError::InvalidValue { .. } => codes::entities::INVALID_ENTITY_VALUE,
        }
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.error_code().as_str())
    }

    pub fn not_found(entity_type: &str, value: &str, known: &str) -> Self {
        crate::log_error!(
            codes::entities::ENTITY_NOT_FOUND,
            "Entity not found",
            "entity_type" => entity_type,
            "value" => value
        );
        Self::NotFound {
            entity_type: entity_type.to_string(),
            value: truncate_message(value),
            known: truncate_message(known),
        }
    }

    pub fn limit_exceeded(entity_type: &str, limit: usize) -> Self {
        crate::log_error!(
            codes::entities::ENTITY_LIMIT_EXCEEDED,
            "Entity limit exceeded",
            "entity_type" => entity_type,
            "limit" => limit
        );
        Self::LimitExceeded {
            entity_type: entity_type.to_string(),
            limit,
        }
    }

    pub fn invalid_value(entity_type: &str, value: &str) -> Self {
        Self::InvalidValue {
            entity_type: entity_type.to_string(),
            value: truncate_message(value),
        }
    }
}
