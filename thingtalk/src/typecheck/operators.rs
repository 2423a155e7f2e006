//! Operator overload tables
//!
//! Each operator maps to an ordered list of signatures. Resolution tries
//! them in order and takes the first whose parameters accept the operand
//! types; type variables and the polymorphic measure unit bound while
//! matching are substituted into the chosen signature.

use crate::config::compile_time::typecheck::MAX_OVERLOADS_TRIED;
use crate::types::{is_assignable, Type, TypeScope};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Overload {
    pub params: Vec<Type>,
    pub result: Type,
}

impl Overload {
    fn new(params: Vec<Type>, result: Type) -> Self {
        Self { params, result }
    }

    fn predicate(lhs: Type, rhs: Type) -> Self {
        Self::new(vec![lhs, rhs], Type::Boolean)
    }

    /// Parameter types followed by the result type
    pub fn to_types(&self) -> Vec<Type> {
        let mut types = self.params.clone();
        types.push(self.result.clone());
        types
    }
}

fn var(name: &str) -> Type {
    Type::TypeVar(name.to_string())
}

fn any_measure() -> Type {
    Type::measure("")
}

fn any_entity() -> Type {
    Type::entity("*")
}

fn comparison() -> Vec<Overload> {
    [
        Type::Number,
        Type::Currency,
        any_measure(),
        Type::Date,
        Type::Time,
        Type::String,
    ]
    .into_iter()
    .map(|ty| Overload::predicate(ty.clone(), ty))
    .collect()
}

fn string_predicate() -> Vec<Overload> {
    vec![Overload::predicate(Type::String, Type::String)]
}

/// Filter operators; every overload produces a Boolean
pub fn filter_operators() -> &'static HashMap<&'static str, Vec<Overload>> {
    static OPERATORS: OnceLock<HashMap<&'static str, Vec<Overload>>> = OnceLock::new();
    OPERATORS.get_or_init(|| {
        let mut table = HashMap::new();
        table.insert("==", vec![Overload::predicate(var("a"), var("a"))]);
        for op in [">=", "<=", ">", "<"] {
            table.insert(op, comparison());
        }
        for op in ["=~", "~="] {
            table.insert(
                op,
                vec![
                    Overload::predicate(Type::String, Type::String),
                    Overload::predicate(any_entity(), Type::String),
                ],
            );
        }
        for op in ["starts_with", "ends_with", "prefix_of", "suffix_of"] {
            table.insert(op, string_predicate());
        }
        table.insert(
            "contains",
            vec![
                Overload::predicate(Type::array(var("a")), var("a")),
                Overload::predicate(Type::RecurrentTimeSpecification, Type::Date),
                Overload::predicate(Type::RecurrentTimeSpecification, Type::Time),
            ],
        );
        table.insert(
            "contains~",
            vec![
                Overload::predicate(Type::array(Type::String), Type::String),
                Overload::predicate(Type::array(any_entity()), Type::String),
            ],
        );
        table.insert(
            "~contains",
            vec![Overload::predicate(Type::array(Type::String), Type::String)],
        );
        table.insert(
            "in_array",
            vec![Overload::predicate(var("a"), Type::array(var("a")))],
        );
        table.insert(
            "in_array~",
            vec![
                Overload::predicate(Type::String, Type::array(Type::String)),
                Overload::predicate(any_entity(), Type::array(Type::String)),
            ],
        );
        table.insert(
            "~in_array",
            vec![Overload::predicate(Type::String, Type::array(Type::String))],
        );
        table.insert(
            "has_member",
            vec![Overload::predicate(
                Type::entity("tt:contact_group"),
                Type::entity("tt:contact"),
            )],
        );
        table.insert(
            "group_member",
            vec![Overload::predicate(
                Type::entity("tt:contact"),
                Type::entity("tt:contact_group"),
            )],
        );
        table
    })
}

/// Operators usable inside computed values
pub fn scalar_operators() -> &'static HashMap<&'static str, Vec<Overload>> {
    static OPERATORS: OnceLock<HashMap<&'static str, Vec<Overload>>> = OnceLock::new();
    OPERATORS.get_or_init(|| {
        let ms = || Type::measure("ms");
        let mut table = HashMap::new();
        table.insert(
            "+",
            vec![
                Overload::new(vec![Type::Number, Type::Number], Type::Number),
                Overload::new(vec![Type::Currency, Type::Currency], Type::Currency),
                Overload::new(vec![any_measure(), any_measure()], any_measure()),
                Overload::new(vec![Type::Date, ms()], Type::Date),
                Overload::new(vec![Type::Time, ms()], Type::Time),
                Overload::new(vec![Type::String, Type::String], Type::String),
            ],
        );
        table.insert(
            "-",
            vec![
                Overload::new(vec![Type::Number, Type::Number], Type::Number),
                Overload::new(vec![Type::Currency, Type::Currency], Type::Currency),
                Overload::new(vec![Type::Date, Type::Date], ms()),
                Overload::new(vec![any_measure(), any_measure()], any_measure()),
                Overload::new(vec![Type::Date, ms()], Type::Date),
                Overload::new(vec![Type::Time, ms()], Type::Time),
            ],
        );
        table.insert(
            "*",
            vec![
                Overload::new(vec![Type::Number, Type::Number], Type::Number),
                Overload::new(vec![Type::Currency, Type::Number], Type::Currency),
                Overload::new(vec![any_measure(), Type::Number], any_measure()),
            ],
        );
        table.insert(
            "/",
            vec![
                Overload::new(vec![Type::Number, Type::Number], Type::Number),
                Overload::new(vec![Type::Currency, Type::Number], Type::Currency),
                Overload::new(vec![any_measure(), any_measure()], Type::Number),
                Overload::new(vec![any_measure(), Type::Number], any_measure()),
            ],
        );
        for op in ["%", "**"] {
            table.insert(
                op,
                vec![Overload::new(vec![Type::Number, Type::Number], Type::Number)],
            );
        }
        table.insert(
            "distance",
            vec![Overload::new(
                vec![Type::Location, Type::Location],
                Type::measure("m"),
            )],
        );
        for op in ["max", "min", "sum", "avg"] {
            table.insert(
                op,
                vec![
                    Overload::new(vec![Type::array(Type::Number)], Type::Number),
                    Overload::new(vec![Type::array(Type::Currency)], Type::Currency),
                    Overload::new(vec![Type::array(any_measure())], any_measure()),
                ],
            );
        }
        table.insert(
            "count",
            vec![Overload::new(vec![Type::array(Type::Any)], Type::Number)],
        );
        table.insert(
            "get_currency",
            vec![Overload::new(vec![Type::Number], Type::Currency)],
        );
        table
    })
}

/// Aggregation operators, applied to one output field of a list query
pub fn aggregation_operators() -> &'static HashMap<&'static str, Vec<Overload>> {
    static OPERATORS: OnceLock<HashMap<&'static str, Vec<Overload>>> = OnceLock::new();
    OPERATORS.get_or_init(|| {
        let numeric = || {
            vec![
                Overload::new(vec![Type::Number], Type::Number),
                Overload::new(vec![Type::Currency], Type::Currency),
                Overload::new(vec![any_measure()], any_measure()),
            ]
        };
        let mut table = HashMap::new();
        table.insert("count", vec![Overload::new(vec![Type::Any], Type::Number)]);
        for op in ["sum", "avg"] {
            table.insert(op, numeric());
        }
        for op in ["min", "max"] {
            let mut overloads = numeric();
            overloads.push(Overload::new(vec![Type::Date], Type::Date));
            overloads.push(Overload::new(vec![Type::Time], Type::Time));
            table.insert(op, overloads);
        }
        table
    })
}

/// First overload of `table[operator]` accepting `args`, with bindings
/// substituted; `None` when the operator is unknown or nothing matches
pub fn resolve_overload(
    table: &HashMap<&'static str, Vec<Overload>>,
    operator: &str,
    args: &[Type],
    lenient: bool,
) -> Option<Overload> {
    let overloads = table.get(operator)?;
    overloads
        .iter()
        .take(MAX_OVERLOADS_TRIED)
        .filter(|overload| overload.params.len() == args.len())
        .find_map(|overload| {
            let mut scope = TypeScope::new();
            let accepted = args
                .iter()
                .zip(&overload.params)
                .all(|(arg, param)| is_assignable(arg, param, &mut scope, lenient));
            accepted.then(|| Overload {
                params: overload.params.iter().map(|param| param.resolve(&scope)).collect(),
                result: overload.result.resolve(&scope),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_binds_unit() {
        let overload = resolve_overload(
            filter_operators(),
            ">=",
            &[Type::measure("C"), Type::measure("F")],
            false,
        )
        .unwrap();
        assert_eq!(overload.params, vec![Type::measure("C"), Type::measure("C")]);
        assert_eq!(overload.result, Type::Boolean);

        assert!(resolve_overload(filter_operators(), ">=", &[Type::measure("C"), Type::measure("km")], false).is_none());
        assert!(resolve_overload(filter_operators(), ">=", &[Type::Boolean, Type::Boolean], false).is_none());
    }

    #[test]
    fn test_type_variables() {
        let overload = resolve_overload(
            filter_operators(),
            "contains",
            &[Type::array(Type::entity("tt:hashtag")), Type::entity("tt:hashtag")],
            false,
        )
        .unwrap();
        assert_eq!(overload.params[1], Type::entity("tt:hashtag"));

        assert!(resolve_overload(filter_operators(), "==", &[Type::Number, Type::String], false).is_none());
        assert!(resolve_overload(filter_operators(), "==", &[Type::String, Type::String], false).is_some());
    }

    #[test]
    fn test_scalar_and_aggregation() {
        let sum = resolve_overload(scalar_operators(), "+", &[Type::Date, Type::measure("h")], false).unwrap();
        assert_eq!(sum.result, Type::Date);
        let distance =
            resolve_overload(scalar_operators(), "distance", &[Type::Location, Type::Location], false).unwrap();
        assert_eq!(distance.to_types(), vec![Type::Location, Type::Location, Type::measure("m")]);

        let max = resolve_overload(aggregation_operators(), "max", &[Type::measure("byte")], false).unwrap();
        assert_eq!(max.result, Type::measure("byte"));
        assert!(resolve_overload(aggregation_operators(), "median", &[Type::Number], false).is_none());
    }
}
