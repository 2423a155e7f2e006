//! Error and success codes used in log events and error values
//!
//! Error codes are numbered per area: `E0xx` AST, `E1xx` typechecking,
//! `E2xx` serialization, `E3xx` entities. Success codes mirror the same
//! ranges with an `I` prefix.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for both error and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for an error code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
    pub const CONFIG_LOAD_FAILURE: Code = Code::new("ERR003");
}

/// AST construction and conversion error codes
pub mod ast {
    use super::Code;

    pub const INVALID_STRUCTURE: Code = Code::new("E010");
    pub const UNSERIALIZABLE: Code = Code::new("E011");
    pub const INVALID_DIALOGUE_STATE: Code = Code::new("E012");
    pub const NON_CONSTANT_VALUE: Code = Code::new("E013");
}

/// Typechecking error codes
pub mod typecheck {
    use super::Code;

    pub const FUNCTION_NOT_FOUND: Code = Code::new("E100");
    pub const UNKNOWN_ARGUMENT: Code = Code::new("E101");
    pub const DUPLICATE_ARGUMENT: Code = Code::new("E102");
    pub const MISSING_REQUIRED_ARGUMENT: Code = Code::new("E103");
    pub const TYPE_MISMATCH: Code = Code::new("E104");
    pub const INVALID_OPERATOR: Code = Code::new("E105");
    pub const UNDECLARED_VARIABLE: Code = Code::new("E106");
    pub const INVALID_FUNCTION_TYPE: Code = Code::new("E107");
    pub const INVALID_SELECTOR: Code = Code::new("E108");
    pub const DEPTH_LIMIT_EXCEEDED: Code = Code::new("E109");
    pub const SCHEMA_UNAVAILABLE: Code = Code::new("E110");
    pub const INVALID_VALUE: Code = Code::new("E111");
}

/// Serialization error codes
pub mod serialization {
    use super::Code;

    pub const TOKEN_LIMIT_EXCEEDED: Code = Code::new("E200");
    pub const LEGACY_CONVERSION_FAILED: Code = Code::new("E201");
}

/// Entity retrieval error codes
pub mod entities {
    use super::Code;

    pub const ENTITY_NOT_FOUND: Code = Code::new("E300");
    pub const ENTITY_LIMIT_EXCEEDED: Code = Code::new("E301");
    pub const INVALID_ENTITY_VALUE: Code = Code::new("E302");
}

// ============================================================================
// SUCCESS CODE CONSTANTS
// ============================================================================

/// Success codes
pub mod success {
    use super::Code;

    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I001");

    // Typecheck success codes
    pub const TYPECHECK_COMPLETE: Code = Code::new("I100");
    pub const SCHEMA_RESOLVED: Code = Code::new("I101");

    // Serialization success codes
    pub const SERIALIZATION_COMPLETE: Code = Code::new("I200");

    // Entity success codes
    pub const ENTITY_ALLOCATED: Code = Code::new("I300");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let entries = [
            // System errors
            ErrorMetadata::new(
                "ERR001",
                "System",
                Severity::Critical,
                false,
                true,
                "Critical internal error",
                "File a bug report with the failing input",
            ),
            ErrorMetadata::new(
                "ERR002",
                "System",
                Severity::Critical,
                false,
                true,
                "Logging or configuration initialization failure",
                "Check the runtime configuration and environment variables",
            ),
            ErrorMetadata::new(
                "ERR003",
                "System",
                Severity::High,
                true,
                false,
                "Runtime configuration file could not be loaded",
                "Check the configuration path and TOML syntax",
            ),
            // AST errors
            ErrorMetadata::new(
                "E010",
                "Ast",
                Severity::Critical,
                false,
                true,
                "Malformed AST node (wrong arity or wrong node kind for a slot)",
                "Fix the code that builds the AST; parsers never produce this",
            ),
            ErrorMetadata::new(
                "E011",
                "Ast",
                Severity::Medium,
                true,
                false,
                "Construct has no equivalent in the legacy syntax",
                "Serialize with a non-legacy syntax type or a newer compatibility version",
            ),
            ErrorMetadata::new(
                "E012",
                "Ast",
                Severity::High,
                false,
                false,
                "Dialogue history item carries results without being confirmed",
                "Only attach results to confirmed history items",
            ),
            ErrorMetadata::new(
                "E013",
                "Ast",
                Severity::Medium,
                true,
                false,
                "Value has no runtime representation because it is not constant",
                "Resolve relative and placeholder values before conversion",
            ),
            // Typecheck errors
            ErrorMetadata::new(
                "E100",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Function could not be resolved",
                "Check the class name and function name, or the schema retriever",
            ),
            ErrorMetadata::new(
                "E101",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Parameter is not declared by the function",
                "Remove the parameter or fix its name",
            ),
            ErrorMetadata::new(
                "E102",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Parameter given more than once",
                "Remove the duplicate parameter",
            ),
            ErrorMetadata::new(
                "E103",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Required argument is missing",
                "Pass the argument, or use $? to mark it as a slot",
            ),
            ErrorMetadata::new(
                "E104",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Value type is not assignable to the declared type",
                "Use a value of the declared type",
            ),
            ErrorMetadata::new(
                "E105",
                "Typecheck",
                Severity::High,
                true,
                false,
                "No overload of the operator accepts the operand types",
                "Use an operator defined for these types",
            ),
            ErrorMetadata::new(
                "E106",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Variable reference is not in scope",
                "Reference an output parameter of an earlier expression",
            ),
            ErrorMetadata::new(
                "E107",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Operation is not legal on this kind of function",
                "Filters and projections apply to queries and streams only",
            ),
            ErrorMetadata::new(
                "E108",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Device selector attribute is invalid",
                "Only id, all and name attributes are allowed",
            ),
            ErrorMetadata::new(
                "E109",
                "Typecheck",
                Severity::Critical,
                false,
                true,
                "Expression nesting exceeds the configured limit",
                "Simplify the program or raise typecheck.max_depth",
            ),
            ErrorMetadata::new(
                "E110",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Schema retriever failed",
                "Check the retriever configuration; retrying is up to the caller",
            ),
            ErrorMetadata::new(
                "E111",
                "Typecheck",
                Severity::High,
                true,
                false,
                "Value is not legal in this position",
                "Use a constant value where a constant is required",
            ),
            // Serialization errors
            ErrorMetadata::new(
                "E200",
                "Serialization",
                Severity::High,
                false,
                true,
                "Token stream exceeds the configured maximum size",
                "Raise serialization.max_tokens",
            ),
            ErrorMetadata::new(
                "E201",
                "Serialization",
                Severity::Medium,
                true,
                false,
                "Legacy conversion failed",
                "Serialize with the normal syntax",
            ),
            // Entity errors
            ErrorMetadata::new(
                "E300",
                "Entities",
                Severity::Medium,
                true,
                false,
                "Entity not found in the sentence or entity map",
                "Retry with ignore_not_found or provide more entities",
            ),
            ErrorMetadata::new(
                "E301",
                "Entities",
                Severity::High,
                false,
                false,
                "Too many entities of one type",
                "Raise entities.max_entities_per_type",
            ),
            ErrorMetadata::new(
                "E302",
                "Entities",
                Severity::Medium,
                true,
                false,
                "Value cannot be stored as an entity",
                "Only constant values can be allocated as numbered entities",
            ),
            // Success codes
            ErrorMetadata::new(
                "I001",
                "System",
                Severity::Low,
                true,
                false,
                "Logging system initialized",
                "No action required",
            ),
            ErrorMetadata::new(
                "I100",
                "Typecheck",
                Severity::Low,
                true,
                false,
                "Typechecking completed successfully",
                "No action required",
            ),
            ErrorMetadata::new(
                "I101",
                "Typecheck",
                Severity::Low,
                true,
                false,
                "Function schema resolved",
                "No action required",
            ),
            ErrorMetadata::new(
                "I200",
                "Serialization",
                Severity::Low,
                true,
                false,
                "Serialization completed successfully",
                "No action required",
            ),
            ErrorMetadata::new(
                "I300",
                "Entities",
                Severity::Low,
                true,
                false,
                "New entity placeholder allocated",
                "No action required",
            ),
        ];

        entries
            .into_iter()
            .map(|metadata| (metadata.code, metadata))
            .collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get error metadata for a specific error code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get error severity from error code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Check if error requires immediate halt
pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

/// Get human-readable description for error code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get recommended action for error code
pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

/// Get error category from error code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_has_metadata() {
        let all = [
            system::INTERNAL_ERROR,
            system::INITIALIZATION_FAILURE,
            system::CONFIG_LOAD_FAILURE,
            ast::INVALID_STRUCTURE,
            ast::UNSERIALIZABLE,
            ast::INVALID_DIALOGUE_STATE,
            ast::NON_CONSTANT_VALUE,
            typecheck::FUNCTION_NOT_FOUND,
            typecheck::UNKNOWN_ARGUMENT,
            typecheck::DUPLICATE_ARGUMENT,
            typecheck::MISSING_REQUIRED_ARGUMENT,
            typecheck::TYPE_MISMATCH,
            typecheck::INVALID_OPERATOR,
            typecheck::UNDECLARED_VARIABLE,
            typecheck::INVALID_FUNCTION_TYPE,
            typecheck::INVALID_SELECTOR,
            typecheck::DEPTH_LIMIT_EXCEEDED,
            typecheck::SCHEMA_UNAVAILABLE,
            typecheck::INVALID_VALUE,
            serialization::TOKEN_LIMIT_EXCEEDED,
            serialization::LEGACY_CONVERSION_FAILED,
            entities::ENTITY_NOT_FOUND,
            entities::ENTITY_LIMIT_EXCEEDED,
            entities::INVALID_ENTITY_VALUE,
            success::SYSTEM_INITIALIZATION_COMPLETED,
            success::TYPECHECK_COMPLETE,
            success::SCHEMA_RESOLVED,
            success::SERIALIZATION_COMPLETE,
            success::ENTITY_ALLOCATED,
        ];
        for code in all {
            assert!(
                get_error_metadata(code.as_str()).is_some(),
                "missing metadata for {}",
                code
            );
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(get_severity("E010"), Severity::Critical);
        assert!(!is_recoverable("E010"));
        assert!(is_recoverable("E011"));
        assert!(is_recoverable("E300"));
        assert_eq!(get_category("E104"), "Typecheck");
        assert_eq!(get_description("nope"), "Unknown error");
    }
}
