//! Filter predicates

use super::function_def::FunctionDef;
use super::invocation::{call_source, InputParam, Selector};
use super::syntax_priority::{add_parens, SyntaxPriority};
use super::values::Value;
use crate::tokens;
use crate::tokens::TokenStream;
use crate::types::Type;
use crate::utils::SourceRange;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct AndBooleanExpression {
    pub range: Option<SourceRange>,
    pub operands: Vec<BooleanExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrBooleanExpression {
    pub range: Option<SourceRange>,
    pub operands: Vec<BooleanExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotBooleanExpression {
    pub range: Option<SourceRange>,
    pub expr: Box<BooleanExpression>,
}

/// `name op value`, comparing an output parameter against a value
#[derive(Debug, Clone, PartialEq)]
pub struct AtomBooleanExpression {
    pub range: Option<SourceRange>,
    pub name: String,
    pub operator: String,
    pub value: Value,
    /// Resolved operand types, filled by the typechecker
    pub overload: Option<Vec<Type>>,
}

/// `any(@kind.channel(...) filter ...)`: true when the query has a matching result
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalBooleanExpression {
    pub range: Option<SourceRange>,
    pub selector: Selector,
    pub channel: String,
    pub in_params: Vec<InputParam>,
    pub filter: Box<BooleanExpression>,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `true(name)`: the user does not care about `name`
#[derive(Debug, Clone, PartialEq)]
pub struct DontCareBooleanExpression {
    pub range: Option<SourceRange>,
    pub name: String,
}

/// `lhs op rhs` between two scalar expressions
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeBooleanExpression {
    pub range: Option<SourceRange>,
    pub lhs: Value,
    pub operator: String,
    pub rhs: Value,
    pub overload: Option<Vec<Type>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BooleanExpression {
    And(AndBooleanExpression),
    Or(OrBooleanExpression),
    Not(NotBooleanExpression),
    Atom(AtomBooleanExpression),
    External(ExternalBooleanExpression),
    DontCare(DontCareBooleanExpression),
    /// Shared constant; carries no range
    True,
    /// Shared constant; carries no range
    False,
    Compute(ComputeBooleanExpression),
}

/// Operators written between their operands; all others use call syntax
pub fn is_infix_operator(operator: &str) -> bool {
    matches!(operator, "==" | ">=" | "<=" | ">" | "<" | "=~" | "~=")
}

impl BooleanExpression {
    pub fn and(operands: Vec<BooleanExpression>) -> Self {
        BooleanExpression::And(AndBooleanExpression {
            range: None,
            operands,
        })
    }

    pub fn or(operands: Vec<BooleanExpression>) -> Self {
        BooleanExpression::Or(OrBooleanExpression {
            range: None,
            operands,
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: BooleanExpression) -> Self {
        BooleanExpression::Not(NotBooleanExpression {
            range: None,
            expr: Box::new(expr),
        })
    }

    pub fn atom(name: &str, operator: &str, value: Value) -> Self {
        BooleanExpression::Atom(AtomBooleanExpression {
            range: None,
            name: name.to_string(),
            operator: operator.to_string(),
            value,
            overload: None,
        })
    }

    pub fn compute(lhs: Value, operator: &str, rhs: Value) -> Self {
        BooleanExpression::Compute(ComputeBooleanExpression {
            range: None,
            lhs,
            operator: operator.to_string(),
            rhs,
            overload: None,
        })
    }

    pub fn dont_care(name: &str) -> Self {
        BooleanExpression::DontCare(DontCareBooleanExpression {
            range: None,
            name: name.to_string(),
        })
    }

    pub fn external(
        selector: Selector,
        channel: &str,
        in_params: Vec<InputParam>,
        filter: BooleanExpression,
    ) -> Self {
        BooleanExpression::External(ExternalBooleanExpression {
            range: None,
            selector,
            channel: channel.to_string(),
            in_params,
            filter: Box::new(filter),
            schema: None,
        })
    }

    pub fn is_true(&self) -> bool {
        matches!(self, BooleanExpression::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, BooleanExpression::False)
    }

    pub fn range(&self) -> Option<SourceRange> {
        match self {
            BooleanExpression::And(node) => node.range,
            BooleanExpression::Or(node) => node.range,
            BooleanExpression::Not(node) => node.range,
            BooleanExpression::Atom(node) => node.range,
            BooleanExpression::External(node) => node.range,
            BooleanExpression::DontCare(node) => node.range,
            BooleanExpression::Compute(node) => node.range,
            BooleanExpression::True | BooleanExpression::False => None,
        }
    }

    pub fn priority(&self) -> SyntaxPriority {
        match self {
            BooleanExpression::And(_) => SyntaxPriority::And,
            BooleanExpression::Or(_) => SyntaxPriority::Or,
            BooleanExpression::Not(_) => SyntaxPriority::Not,
            BooleanExpression::Atom(atom) if is_infix_operator(&atom.operator) => {
                SyntaxPriority::Comp
            }
            BooleanExpression::Compute(compute) if is_infix_operator(&compute.operator) => {
                SyntaxPriority::Comp
            }
            _ => SyntaxPriority::Primary,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            BooleanExpression::And(and) if and.operands.is_empty() => TokenStream::from("true"),
            BooleanExpression::And(and) => join_operands(&and.operands, SyntaxPriority::And, "&&"),
            BooleanExpression::Or(or) if or.operands.is_empty() => TokenStream::from("false"),
            BooleanExpression::Or(or) => join_operands(&or.operands, SyntaxPriority::Or, "||"),
            BooleanExpression::Not(not) => tokens![
                "!",
                add_parens(SyntaxPriority::Not, not.expr.priority(), not.expr.to_source())
            ],
            BooleanExpression::Atom(atom) => comparison_source(
                TokenStream::from(atom.name.as_str()),
                SyntaxPriority::Primary,
                &atom.operator,
                &atom.value,
            ),
            BooleanExpression::Compute(compute) => comparison_source(
                compute.lhs.to_source(),
                compute.lhs.priority(),
                &compute.operator,
                &compute.rhs,
            ),
            BooleanExpression::External(external) => {
                let call = call_source(&external.selector, &external.channel, &external.in_params);
                if external.filter.is_true() {
                    tokens!["any", "(", call, ")"]
                } else {
                    tokens!["any", "(", call, "filter", external.filter.to_source(), ")"]
                }
            }
            BooleanExpression::DontCare(dont_care) => {
                tokens!["true", "(", dont_care.name.as_str(), ")"]
            }
            BooleanExpression::True => TokenStream::from("true"),
            BooleanExpression::False => TokenStream::from("false"),
        }
    }
}

fn join_operands(operands: &[BooleanExpression], priority: SyntaxPriority, op: &str) -> TokenStream {
    let operands = operands
        .iter()
        .map(|operand| add_parens(priority, operand.priority(), operand.to_source()));
    TokenStream::join(operands, op.into())
}

fn comparison_source(
    lhs: TokenStream,
    lhs_priority: SyntaxPriority,
    operator: &str,
    rhs: &Value,
) -> TokenStream {
    if is_infix_operator(operator) {
        tokens![
            add_parens(SyntaxPriority::Add, lhs_priority, lhs),
            operator,
            add_parens(SyntaxPriority::Add, rhs.priority(), rhs.to_source())
        ]
    } else {
        tokens![operator, "(", lhs, ",", rhs.to_source(), ")"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::prettyprint;

    #[test]
    fn test_and_or_parenthesization() {
        let a = BooleanExpression::atom("a", "==", Value::Number(1.0));
        let b = BooleanExpression::atom("b", ">=", Value::Number(2.0));
        let c = BooleanExpression::atom("c", "contains", Value::String("x".into()));

        let or = BooleanExpression::or(vec![a.clone(), b.clone()]);
        let and = BooleanExpression::and(vec![or, c]);
        assert_eq!(
            prettyprint(&and.to_source()),
            "(a == 1 || b >= 2) && contains(c, \"x\")"
        );

        let flat = BooleanExpression::or(vec![BooleanExpression::and(vec![a, b.clone()]), b]);
        assert_eq!(prettyprint(&flat.to_source()), "a == 1 && b >= 2 || b >= 2");
    }

    #[test]
    fn test_not_and_dont_care() {
        let not = BooleanExpression::not(BooleanExpression::and(vec![
            BooleanExpression::dont_care("x"),
            BooleanExpression::True,
        ]));
        assert_eq!(prettyprint(&not.to_source()), "!(true(x) && true)");
    }

    #[test]
    fn test_external() {
        let external = BooleanExpression::external(
            Selector::device("com.weather"),
            "current",
            vec![],
            BooleanExpression::atom("temperature", ">=", Value::measure(20.0, "C")),
        );
        assert_eq!(
            prettyprint(&external.to_source()),
            "any(@com.weather.current() filter temperature >= 20C)"
        );
    }

    #[test]
    fn test_singletons() {
        assert!(BooleanExpression::True.is_true());
        assert!(BooleanExpression::False.is_false());
        assert_eq!(BooleanExpression::True, BooleanExpression::True.clone());
        assert!(BooleanExpression::True.range().is_none());
    }
}
