//! The typed abstract syntax tree
//!
//! Node families are closed sum types: [`Value`], [`BooleanExpression`],
//! [`Expression`] and [`Statement`], plus the top-level [`Input`] kinds.
//! Containers carry an optional [`SourceRange`](crate::utils::SourceRange);
//! values do not. Every node renders itself as a [`TokenStream`] with
//! `to_source()`, inserting parentheses only where the priority of a child
//! is lower than its position requires.

pub mod boolean_expression;
pub mod control;
pub mod dialogue;
pub mod error;
pub mod expression;
pub mod function_def;
pub mod invocation;
pub mod legacy;
pub mod permissions;
pub mod program;
pub mod slots;
pub mod syntax_priority;
pub mod values;

pub use boolean_expression::{
    AndBooleanExpression, AtomBooleanExpression, BooleanExpression, ComputeBooleanExpression,
    DontCareBooleanExpression, ExternalBooleanExpression, NotBooleanExpression,
    OrBooleanExpression,
};
pub use control::{ControlCommand, ControlIntent};
pub use dialogue::{ConfirmationState, DialogueHistoryItem, DialogueState, ResultItem, ResultList};
pub use error::{AstError, AstResult};
pub use expression::{
    AggregationExpression, AliasExpression, BooleanQuestionExpression, ChainExpression,
    Expression, FilterExpression, FunctionCallExpression, IndexExpression, InvocationExpression,
    JoinExpression, MonitorExpression, ProjectionElement, ProjectionExpression,
    ProjectionExpression2, ProjectionValue, SliceExpression, SortDirection, SortExpression,
};
pub use function_def::{ArgDirection, ArgumentDef, FunctionDef, FunctionType};
pub use invocation::{DeviceSelector, InputParam, Invocation, Selector};
pub use legacy::{Action, LegacyNode, LegacyProgram, LegacyStatement, Stream, Table};
pub use permissions::{PermissionFunction, PermissionRule, SpecifiedPermissionFunction};
pub use program::{
    Assignment, ClassDef, ExpressionStatement, FunctionDeclaration, Program, ReturnStatement,
    Statement,
};
pub use slots::{rewrite_slots, ScopeEntry, ScopeMap, SlotItem, SlotIteration, SlotKind, SlotOwner};
pub use syntax_priority::SyntaxPriority;
pub use values::{
    ArrayFieldValue, ArrayValue, ComputationValue, ContextRefValue, CurrencyValue, DateEdge,
    DateValue, EntityValue, FilterValue, LocationValue, MeasureValue, TimeValue, Value,
    VarRefValue,
};

use crate::tokens::TokenStream;

/// Anything a parser can produce at the top level
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Program(Program),
    PermissionRule(PermissionRule),
    DialogueState(DialogueState),
    ControlCommand(ControlCommand),
}

impl Input {
    pub fn kind(&self) -> &'static str {
        match self {
            Input::Program(_) => "program",
            Input::PermissionRule(_) => "permission rule",
            Input::DialogueState(_) => "dialogue state",
            Input::ControlCommand(_) => "control command",
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Input::Program(program) => program.to_source(),
            Input::PermissionRule(rule) => rule.to_source(),
            Input::DialogueState(state) => state.to_source(),
            Input::ControlCommand(command) => command.to_source(),
        }
    }

    /// Source in the legacy syntax; dialogue states have no legacy form
    pub fn to_legacy_source(&self) -> AstResult<TokenStream> {
        match self {
            Input::Program(program) => Ok(program.to_legacy()?.to_source()),
            Input::PermissionRule(rule) => Ok(rule.to_source()),
            Input::ControlCommand(command) => Ok(command.to_source()),
            Input::DialogueState(state) => Err(AstError::unserializable("dialogue state", state.range)),
        }
    }
}

impl From<Program> for Input {
    fn from(program: Program) -> Self {
        Input::Program(program)
    }
}

impl From<PermissionRule> for Input {
    fn from(rule: PermissionRule) -> Self {
        Input::PermissionRule(rule)
    }
}

impl From<DialogueState> for Input {
    fn from(state: DialogueState) -> Self {
        Input::DialogueState(state)
    }
}

impl From<ControlCommand> for Input {
    fn from(command: ControlCommand) -> Self {
        Input::ControlCommand(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::prettyprint;
    use assert_matches::assert_matches;

    #[test]
    fn test_legacy_source_of_inputs() {
        let program = Program::new(vec![Statement::expression(Expression::invocation(
            Invocation::new(Selector::device("com.example"), "get", vec![]),
        ))]);
        let input = Input::from(program);
        assert_eq!(prettyprint(&input.to_source()), "@com.example.get();");
        let legacy = input.to_legacy_source().unwrap();
        assert_eq!(prettyprint(&legacy), "now => @com.example.get() => notify;");

        let state = Input::from(DialogueState::new("org.thingpedia.dialogue.transaction", "init", None, vec![]));
        assert_matches!(state.to_legacy_source(), Err(AstError::Unserializable { .. }));
        assert_eq!(
            prettyprint(&state.to_source()),
            "$dialogue @org.thingpedia.dialogue.transaction.init;"
        );
    }
}
