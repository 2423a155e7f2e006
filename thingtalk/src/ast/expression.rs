//! The expression algebra
//!
//! Every executable statement is a composition of [`Expression`]s: function
//! calls and invocations at the leaves, wrapped by filters, projections,
//! aggregations, sorts, indices and slices, and composed left to right by
//! chains (`=>`) and joins.
//!
//! After typechecking each node carries the [`FunctionDef`] describing its
//! result, classified as stream, query or action.

use super::boolean_expression::BooleanExpression;
use super::function_def::{FunctionDef, FunctionType};
use super::invocation::{InputParam, Invocation};
use super::syntax_priority::{add_parens, SyntaxPriority};
use super::values::Value;
use crate::tokens;
use crate::tokens::TokenStream;
use crate::types::Type;
use crate::utils::SourceRange;
use std::sync::Arc;

/// Call of a builtin (`timer`, `attimer`, `ontimer`) or a locally declared function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallExpression {
    pub range: Option<SourceRange>,
    pub name: String,
    pub in_params: Vec<InputParam>,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationExpression {
    pub range: Option<SourceRange>,
    pub invocation: Invocation,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub filter: BooleanExpression,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `monitor(e)`, optionally restricted with `on new [args]`
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub args: Option<Vec<String>>,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `[a, b, f(c) as d] of e`
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub args: Vec<String>,
    pub computations: Vec<Value>,
    /// One alias slot per computation
    pub aliases: Vec<Option<String>>,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionValue {
    /// A (possibly dotted) output parameter path
    Path(String),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionElement {
    pub value: ProjectionValue,
    pub alias: Option<String>,
    /// Types the element is restricted to, empty for any
    pub types: Vec<Type>,
}

/// Projection with typed and path elements: `[a.b, c : Entity(x)] of e`
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionExpression2 {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub projections: Vec<ProjectionElement>,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `[cond] of e`: whether the results of `e` satisfy `cond`
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanQuestionExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub boolean_expression: BooleanExpression,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub name: String,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `count(e)` or `op(field of e)`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    /// Aggregated field, `*` for `count` over whole results
    pub field: String,
    pub operator: String,
    pub overload: Option<Vec<Type>>,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// `sort(value direction of e)`
#[derive(Debug, Clone, PartialEq)]
pub struct SortExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub value: Value,
    pub direction: SortDirection,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `e[i, j]`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub indices: Vec<Value>,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `e[base : limit]`
#[derive(Debug, Clone, PartialEq)]
pub struct SliceExpression {
    pub range: Option<SourceRange>,
    pub expression: Box<Expression>,
    pub base: Value,
    pub limit: Value,
    pub schema: Option<Arc<FunctionDef>>,
}

/// `e1 => e2 => ...`: the results of each element are in scope for the next
#[derive(Debug, Clone, PartialEq)]
pub struct ChainExpression {
    pub range: Option<SourceRange>,
    pub expressions: Vec<Expression>,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpression {
    pub range: Option<SourceRange>,
    pub lhs: Box<Expression>,
    pub rhs: Box<Expression>,
    pub schema: Option<Arc<FunctionDef>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    FunctionCall(FunctionCallExpression),
    Invocation(InvocationExpression),
    Filter(FilterExpression),
    Monitor(MonitorExpression),
    Projection(ProjectionExpression),
    Projection2(ProjectionExpression2),
    BooleanQuestion(BooleanQuestionExpression),
    Alias(AliasExpression),
    Aggregation(AggregationExpression),
    Sort(SortExpression),
    Index(IndexExpression),
    Slice(SliceExpression),
    Chain(ChainExpression),
    Join(JoinExpression),
}

macro_rules! for_each_variant {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            Expression::FunctionCall($node) => $body,
            Expression::Invocation($node) => $body,
            Expression::Filter($node) => $body,
            Expression::Monitor($node) => $body,
            Expression::Projection($node) => $body,
            Expression::Projection2($node) => $body,
            Expression::BooleanQuestion($node) => $body,
            Expression::Alias($node) => $body,
            Expression::Aggregation($node) => $body,
            Expression::Sort($node) => $body,
            Expression::Index($node) => $body,
            Expression::Slice($node) => $body,
            Expression::Chain($node) => $body,
            Expression::Join($node) => $body,
        }
    };
}

impl Expression {
    pub fn invocation(invocation: Invocation) -> Self {
        Expression::Invocation(InvocationExpression {
            range: invocation.range,
            invocation,
            schema: None,
        })
    }

    pub fn function_call(name: &str, in_params: Vec<InputParam>) -> Self {
        Expression::FunctionCall(FunctionCallExpression {
            range: None,
            name: name.to_string(),
            in_params,
            schema: None,
        })
    }

    pub fn filter(expression: Expression, filter: BooleanExpression) -> Self {
        Expression::Filter(FilterExpression {
            range: None,
            expression: Box::new(expression),
            filter,
            schema: None,
        })
    }

    pub fn monitor(expression: Expression, args: Option<Vec<String>>) -> Self {
        Expression::Monitor(MonitorExpression {
            range: None,
            expression: Box::new(expression),
            args,
            schema: None,
        })
    }

    pub fn projection(expression: Expression, args: Vec<String>) -> Self {
        Expression::Projection(ProjectionExpression {
            range: None,
            expression: Box::new(expression),
            args,
            computations: Vec::new(),
            aliases: Vec::new(),
            schema: None,
        })
    }

    pub fn alias(expression: Expression, name: &str) -> Self {
        Expression::Alias(AliasExpression {
            range: None,
            expression: Box::new(expression),
            name: name.to_string(),
            schema: None,
        })
    }

    pub fn aggregation(expression: Expression, field: &str, operator: &str) -> Self {
        Expression::Aggregation(AggregationExpression {
            range: None,
            expression: Box::new(expression),
            field: field.to_string(),
            operator: operator.to_string(),
            overload: None,
            schema: None,
        })
    }

    pub fn sort(expression: Expression, value: Value, direction: SortDirection) -> Self {
        Expression::Sort(SortExpression {
            range: None,
            expression: Box::new(expression),
            value,
            direction,
            schema: None,
        })
    }

    pub fn index(expression: Expression, indices: Vec<Value>) -> Self {
        Expression::Index(IndexExpression {
            range: None,
            expression: Box::new(expression),
            indices,
            schema: None,
        })
    }

    pub fn slice(expression: Expression, base: Value, limit: Value) -> Self {
        Expression::Slice(SliceExpression {
            range: None,
            expression: Box::new(expression),
            base,
            limit,
            schema: None,
        })
    }

    pub fn chain(expressions: Vec<Expression>) -> Self {
        Expression::Chain(ChainExpression {
            range: None,
            expressions,
            schema: None,
        })
    }

    pub fn join(lhs: Expression, rhs: Expression) -> Self {
        Expression::Join(JoinExpression {
            range: None,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            schema: None,
        })
    }

    pub fn range(&self) -> Option<SourceRange> {
        for_each_variant!(self, node => node.range)
    }

    pub fn schema(&self) -> Option<&Arc<FunctionDef>> {
        for_each_variant!(self, node => node.schema.as_ref())
    }

    pub fn set_schema(&mut self, schema: Arc<FunctionDef>) {
        for_each_variant!(self, node => node.schema = Some(schema))
    }

    pub fn function_type(&self) -> Option<FunctionType> {
        self.schema().map(|schema| schema.function_type)
    }

    /// The wrapped expression of single-child variants
    pub fn child(&self) -> Option<&Expression> {
        match self {
            Expression::Filter(node) => Some(&node.expression),
            Expression::Monitor(node) => Some(&node.expression),
            Expression::Projection(node) => Some(&node.expression),
            Expression::Projection2(node) => Some(&node.expression),
            Expression::BooleanQuestion(node) => Some(&node.expression),
            Expression::Alias(node) => Some(&node.expression),
            Expression::Aggregation(node) => Some(&node.expression),
            Expression::Sort(node) => Some(&node.expression),
            Expression::Index(node) => Some(&node.expression),
            Expression::Slice(node) => Some(&node.expression),
            Expression::FunctionCall(_)
            | Expression::Invocation(_)
            | Expression::Chain(_)
            | Expression::Join(_) => None,
        }
    }

    pub fn priority(&self) -> SyntaxPriority {
        match self {
            Expression::Filter(_) => SyntaxPriority::Filter,
            Expression::Projection(_)
            | Expression::Projection2(_)
            | Expression::BooleanQuestion(_)
            | Expression::Alias(_) => SyntaxPriority::Projection,
            Expression::Index(_) | Expression::Slice(_) => SyntaxPriority::Index,
            Expression::Chain(chain) if chain.expressions.len() == 1 => {
                chain.expressions[0].priority()
            }
            Expression::Chain(_) => SyntaxPriority::Chain,
            Expression::Join(_) => SyntaxPriority::Join,
            Expression::FunctionCall(_)
            | Expression::Invocation(_)
            | Expression::Monitor(_)
            | Expression::Aggregation(_)
            | Expression::Sort(_) => SyntaxPriority::Primary,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Expression::FunctionCall(call) => {
                let params = call.in_params.iter().map(InputParam::to_source);
                tokens![
                    call.name.as_str(),
                    "(",
                    TokenStream::join(params, ",".into()),
                    ")"
                ]
            }
            Expression::Invocation(node) => node.invocation.to_source(),
            Expression::Filter(node) => tokens![
                wrap(SyntaxPriority::Filter, &node.expression),
                "filter",
                node.filter.to_source()
            ],
            Expression::Monitor(node) => {
                let head = tokens!["monitor", "(", node.expression.to_source(), ")"];
                match &node.args {
                    Some(args) => tokens![head, "on", "new", names_source(args)],
                    None => head,
                }
            }
            Expression::Projection(node) => {
                let mut elements: Vec<TokenStream> =
                    node.args.iter().map(|arg| TokenStream::from(arg.as_str())).collect();
                for (i, computation) in node.computations.iter().enumerate() {
                    match node.aliases.get(i).and_then(Option::as_ref) {
                        Some(alias) => elements.push(tokens![
                            computation.to_source(),
                            "as",
                            alias.as_str()
                        ]),
                        None => elements.push(computation.to_source()),
                    }
                }
                tokens![
                    "[",
                    TokenStream::join(elements, ",".into()),
                    "]",
                    "of",
                    wrap(SyntaxPriority::Filter, &node.expression)
                ]
            }
            Expression::Projection2(node) => {
                let elements = node.projections.iter().map(projection_element_source);
                tokens![
                    "[",
                    TokenStream::join(elements, ",".into()),
                    "]",
                    "of",
                    wrap(SyntaxPriority::Filter, &node.expression)
                ]
            }
            Expression::BooleanQuestion(node) => tokens![
                "[",
                node.boolean_expression.to_source(),
                "]",
                "of",
                wrap(SyntaxPriority::Filter, &node.expression)
            ],
            Expression::Alias(node) => tokens![
                wrap(SyntaxPriority::Projection, &node.expression),
                "as",
                node.name.as_str()
            ],
            Expression::Aggregation(node) if node.field == "*" => {
                tokens![node.operator.as_str(), "(", node.expression.to_source(), ")"]
            }
            Expression::Aggregation(node) => tokens![
                node.operator.as_str(),
                "(",
                node.field.as_str(),
                "of",
                wrap(SyntaxPriority::Projection, &node.expression),
                ")"
            ],
            Expression::Sort(node) => tokens![
                "sort",
                "(",
                node.value.to_source(),
                node.direction.as_str(),
                "of",
                wrap(SyntaxPriority::Projection, &node.expression),
                ")"
            ],
            Expression::Index(node) => {
                let indices = node.indices.iter().map(Value::to_source);
                tokens![
                    wrap(SyntaxPriority::Index, &node.expression),
                    "[",
                    TokenStream::join(indices, ",".into()),
                    "]"
                ]
            }
            Expression::Slice(node) => tokens![
                wrap(SyntaxPriority::Index, &node.expression),
                "[",
                node.base.to_source(),
                ":",
                node.limit.to_source(),
                "]"
            ],
            Expression::Chain(node) => {
                let elements = node
                    .expressions
                    .iter()
                    .map(|expression| wrap(SyntaxPriority::Join, expression));
                TokenStream::join(elements, "=>".into())
            }
            Expression::Join(node) => tokens![
                wrap(SyntaxPriority::Join, &node.lhs),
                "join",
                wrap(SyntaxPriority::Filter, &node.rhs)
            ],
        }
    }
}

fn wrap(required: SyntaxPriority, expression: &Expression) -> TokenStream {
    add_parens(required, expression.priority(), expression.to_source())
}

fn names_source(names: &[String]) -> TokenStream {
    let names = names.iter().map(|name| TokenStream::from(name.as_str()));
    tokens!["[", TokenStream::join(names, ",".into()), "]"]
}

fn projection_element_source(element: &ProjectionElement) -> TokenStream {
    let value = match &element.value {
        ProjectionValue::Path(path) => TokenStream::from(path.as_str()),
        ProjectionValue::Value(value) => value.to_source(),
    };
    let alias = match &element.alias {
        Some(alias) => tokens!["as", alias.as_str()],
        None => TokenStream::new(),
    };
    let types = if element.types.is_empty() {
        TokenStream::new()
    } else {
        let types = element.types.iter().map(|ty| TokenStream::from(ty.to_string()));
        tokens![":", TokenStream::join(types, "|".into())]
    };
    tokens![value, alias, types]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::invocation::Selector;
    use crate::serialize::prettyprint;

    fn call(kind: &str, channel: &str) -> Expression {
        Expression::invocation(Invocation::new(Selector::device(kind), channel, vec![]))
    }

    fn atom() -> BooleanExpression {
        BooleanExpression::atom("status", "=~", Value::String("rain".into()))
    }

    #[test]
    fn test_filter_and_projection() {
        let filtered = Expression::filter(call("com.weather", "current"), atom());
        let projected = Expression::projection(filtered, vec!["temperature".into()]);
        assert_eq!(
            prettyprint(&projected.to_source()),
            "[temperature] of @com.weather.current() filter status =~ \"rain\""
        );
    }

    #[test]
    fn test_parenthesization_follows_priority() {
        let projected = Expression::projection(call("com.a", "q"), vec!["x".into()]);
        let filtered = Expression::filter(projected, atom());
        assert_eq!(
            prettyprint(&filtered.to_source()),
            "[x] of @com.a.q() filter status =~ \"rain\""
        );

        let filtered = Expression::filter(call("com.a", "q"), atom());
        let indexed = Expression::index(filtered, vec![Value::Number(1.0)]);
        assert_eq!(
            prettyprint(&indexed.to_source()),
            "(@com.a.q() filter status =~ \"rain\")[1]"
        );

        let chain = Expression::chain(vec![call("com.a", "q"), call("com.b", "do")]);
        let joined = Expression::join(chain.clone(), call("com.c", "q"));
        assert_eq!(
            prettyprint(&joined.to_source()),
            "(@com.a.q() => @com.b.do()) join @com.c.q()"
        );
        assert_eq!(prettyprint(&chain.to_source()), "@com.a.q() => @com.b.do()");
    }

    #[test]
    fn test_aggregation_sort_slice_monitor() {
        let count = Expression::aggregation(call("com.a", "q"), "*", "count");
        assert_eq!(prettyprint(&count.to_source()), "count(@com.a.q())");

        let max = Expression::aggregation(call("com.a", "q"), "size", "max");
        assert_eq!(prettyprint(&max.to_source()), "max(size of @com.a.q())");

        let sorted = Expression::sort(call("com.a", "q"), Value::var_ref("size"), SortDirection::Desc);
        assert_eq!(prettyprint(&sorted.to_source()), "sort(size desc of @com.a.q())");

        let slice = Expression::slice(call("com.a", "q"), Value::Number(1.0), Value::Number(5.0));
        assert_eq!(prettyprint(&slice.to_source()), "@com.a.q()[1 : 5]");

        let monitor = Expression::monitor(call("com.a", "q"), Some(vec!["x".into()]));
        assert_eq!(prettyprint(&monitor.to_source()), "monitor(@com.a.q()) on new [x]");
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Expression::filter(call("com.a", "q"), atom());
        let mut copy = original.clone();
        if let Expression::Filter(filter) = &mut copy {
            filter.filter = BooleanExpression::True;
        }
        assert_ne!(original, copy);
        assert_eq!(original.clone().to_source(), original.to_source());
    }
}
