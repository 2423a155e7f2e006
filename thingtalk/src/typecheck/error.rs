//! Typechecking errors
//!
//! Every variant that points at a node carries that node's range, so a
//! caller holding the source text can underline the offending construct.

use crate::ast::FunctionType;
use crate::logging::codes;
use crate::types::Type;
use crate::utils::{truncate_message, SourceRange};
use thiserror::Error;

pub type TypeResult<T> = Result<T, TypeError>;

/// Failure to obtain a function signature
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Function @{kind}.{channel} not found")]
    NotFound { kind: String, channel: String },

    #[error("Invalid schema for {kind}: {message}")]
    InvalidSchema { kind: String, message: String },

    #[error("Invalid schema JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Json(truncate_message(&err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// Function call to a name that is neither declared nor builtin (E100)
    #[error("Function {name} is not declared")]
    FunctionNotFound {
        name: String,
        range: Option<SourceRange>,
    },

    /// Parameter the signature does not declare as input (E101)
    #[error("Invalid parameter {name} for {function}")]
    UnknownArgument {
        function: String,
        name: String,
        range: Option<SourceRange>,
    },

    /// Same parameter passed twice (E102)
    #[error("Duplicate parameter {name} for {function}")]
    DuplicateArgument {
        function: String,
        name: String,
        range: Option<SourceRange>,
    },

    /// Required input left out (E103)
    #[error("Missing required parameter {name} for {function}")]
    MissingRequiredArgument {
        function: String,
        name: String,
        range: Option<SourceRange>,
    },

    /// None of a `require_either` group was given (E103)
    #[error("{function} requires one of {names}")]
    RequireEither {
        function: String,
        names: String,
        range: Option<SourceRange>,
    },

    /// Value type not assignable to the parameter type (E104)
    #[error("Invalid type for {name}: expected {expected}, found {found}")]
    InvalidArgumentType {
        name: String,
        expected: Type,
        found: Type,
        range: Option<SourceRange>,
    },

    /// No overload of the operator accepts the operand types (E105)
    #[error("Invalid operator {operator} for types {types}")]
    InvalidOperator {
        operator: String,
        types: String,
        range: Option<SourceRange>,
    },

    /// Reference to a name not in scope (E106)
    #[error("Variable {name} is not in scope")]
    UndeclaredVariable {
        name: String,
        range: Option<SourceRange>,
    },

    /// Operation applied to the wrong kind of function (E107)
    #[error("Cannot apply {operation} to {found}")]
    InvalidFunctionType {
        operation: String,
        found: FunctionType,
        range: Option<SourceRange>,
    },

    /// `monitor` on a query that is not monitorable (E107)
    #[error("{function} is not monitorable")]
    NotMonitorable {
        function: String,
        range: Option<SourceRange>,
    },

    /// List operation on a query returning a single result (E107)
    #[error("{function} does not return a list")]
    NotList {
        function: String,
        range: Option<SourceRange>,
    },

    /// Unsupported or ill-typed device attribute (E108)
    #[error("Invalid device selector: {message}")]
    InvalidSelector {
        message: String,
        range: Option<SourceRange>,
    },

    /// Value not legal in its position (E111)
    #[error("Invalid value: {message}")]
    InvalidValue {
        message: String,
        range: Option<SourceRange>,
    },

    /// Chain with more elements than the configured limit (E109)
    #[error("Chain of {length} expressions exceeds the limit of {limit}")]
    ChainTooLong {
        length: usize,
        limit: usize,
        range: Option<SourceRange>,
    },

    /// Nesting deeper than the configured limit (E109)
    #[error("Expression nesting exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// Schema retriever failure (E110)
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl TypeError {
    pub fn error_code(&self) -> codes::Code {
        match self {
            TypeError::FunctionNotFound { .. } => codes::typecheck::FUNCTION_NOT_FOUND,
            TypeError::UnknownArgument { .. } => codes::typecheck::UNKNOWN_ARGUMENT,
            TypeError::DuplicateArgument { .. } => codes::typecheck::DUPLICATE_ARGUMENT,
            TypeError::MissingRequiredArgument { .. } | TypeError::RequireEither { .. } => {
                codes::typecheck::MISSING_REQUIRED_ARGUMENT
            }
            TypeError::InvalidArgumentType { .. } => codes::typecheck::TYPE_MISMATCH,
            TypeError::InvalidOperator { .. } => codes::typecheck::INVALID_OPERATOR,
            TypeError::UndeclaredVariable { .. } => codes::typecheck::UNDECLARED_VARIABLE,
            TypeError::InvalidFunctionType { .. }
            | TypeError::NotMonitorable { .. }
            | TypeError::NotList { .. } => codes::typecheck::INVALID_FUNCTION_TYPE,
            TypeError::InvalidSelector { .. } => codes::typecheck::INVALID_SELECTOR,
            TypeError::InvalidValue { .. } => codes::typecheck::INVALID_VALUE,
            TypeError::ChainTooLong { .. } | TypeError::DepthLimitExceeded { .. } => {
                codes::typecheck::DEPTH_LIMIT_EXCEEDED
            }
            TypeError::Schema(_) => codes::typecheck::SCHEMA_UNAVAILABLE,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            TypeError::FunctionNotFound { .. } => "FunctionNotFound",
            TypeError::UnknownArgument { .. } => "UnknownArgument",
            TypeError::DuplicateArgument { .. } => "DuplicateArgument",
            TypeError::MissingRequiredArgument { .. } => "MissingRequiredArgument",
            TypeError::RequireEither { .. } => "RequireEither",
            TypeError::InvalidArgumentType { .. } => "InvalidArgumentType",
            TypeError::InvalidOperator { .. } => "InvalidOperator",
            TypeError::UndeclaredVariable { .. } => "UndeclaredVariable",
            TypeError::InvalidFunctionType { .. } => "InvalidFunctionType",
            TypeError::NotMonitorable { .. } => "NotMonitorable",
            TypeError::NotList { .. } => "NotList",
            TypeError::InvalidSelector { .. } => "InvalidSelector",
            TypeError::InvalidValue { .. } => "InvalidValue",
            TypeError::ChainTooLong { .. } => "ChainTooLong",
            TypeError::DepthLimitExceeded { .. } => "DepthLimitExceeded",
            TypeError::Schema(_) => "Schema",
        }
    }

    pub fn range(&self) -> Option<SourceRange> {
        match self {
            TypeError::FunctionNotFound { range, .. }
            | TypeError::UnknownArgument { range, .. }
            | TypeError::DuplicateArgument { range, .. }
            | TypeError::MissingRequiredArgument { range, .. }
            | TypeError::RequireEither { range, .. }
            | TypeError::InvalidArgumentType { range, .. }
            | TypeError::InvalidOperator { range, .. }
            | TypeError::UndeclaredVariable { range, .. }
            | TypeError::InvalidFunctionType { range, .. }
            | TypeError::NotMonitorable { range, .. }
            | TypeError::NotList { range, .. }
            | TypeError::InvalidSelector { range, .. }
            | TypeError::InvalidValue { range, .. }
            | TypeError::ChainTooLong { range, .. } => *range,
            TypeError::DepthLimitExceeded { .. } | TypeError::Schema(_) => None,
        }
    }

    pub fn severity(&self) -> &'static str {
        codes::get_severity(self.error_code().as_str()).as_str()
    }

    pub fn is_recoverable(&self) -> bool {
        codes::is_recoverable(self.error_code().as_str())
    }

    pub fn unknown_argument(function: &str, name: &str, range: Option<SourceRange>) -> Self {
        Self::UnknownArgument {
            function: function.to_string(),
            name: name.to_string(),
            range,
        }
    }

    pub fn invalid_argument_type(name: &str, expected: &Type, found: &Type, range: Option<SourceRange>) -> Self {
        Self::InvalidArgumentType {
            name: name.to_string(),
            expected: expected.clone(),
            found: found.clone(),
            range,
        }
    }

    pub fn invalid_operator(operator: &str, types: &[Type], range: Option<SourceRange>) -> Self {
        let types = types.iter().map(Type::to_string).collect::<Vec<_>>().join(", ");
        crate::log_error!(
            codes::typecheck::INVALID_OPERATOR,
            "No overload matches the operand types",
            range = range,
            "operator" => operator,
            "types" => &types
        );
        Self::InvalidOperator {
            operator: operator.to_string(),
            types: truncate_message(&types),
            range,
        }
    }

    pub fn invalid_function_type(operation: &str, found: FunctionType, range: Option<SourceRange>) -> Self {
        Self::InvalidFunctionType {
            operation: operation.to_string(),
            found,
            range,
        }
    }

    pub fn invalid_selector(message: &str, range: Option<SourceRange>) -> Self {
        Self::InvalidSelector {
            message: truncate_message(message),
            range,
        }
    }

    pub fn invalid_value(message: &str, range: Option<SourceRange>) -> Self {
        Self::InvalidValue {
            message: truncate_message(message),
            range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_ranges() {
        let err = TypeError::invalid_operator(">=", &[Type::String, Type::Number], None);
        assert_eq!(err.error_code(), codes::typecheck::INVALID_OPERATOR);
        assert_eq!(err.to_string(), "Invalid operator >= for types String, Number");
        assert_eq!(err.error_type(), "InvalidOperator");

        let err = TypeError::from(SchemaError::NotFound {
            kind: "com.example".into(),
            channel: "missing".into(),
        });
        assert_eq!(err.error_code(), codes::typecheck::SCHEMA_UNAVAILABLE);
        assert_eq!(err.to_string(), "Function @com.example.missing not found");
        assert_eq!(err.range(), None);
    }

    #[test]
    fn test_schema_json_error() {
        let err = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err();
        assert!(SchemaError::from(err).to_string().starts_with("Invalid schema JSON"));
    }
}
