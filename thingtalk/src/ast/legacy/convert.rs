//! Conversion from the expression algebra to the legacy tree

use super::{Action, LegacyNode, LegacyProgram, LegacyStatement, Stream, Table};
use crate::ast::error::{AstError, AstResult};
use crate::ast::expression::{Expression, FunctionCallExpression, ProjectionExpression};
use crate::ast::function_def::{FunctionDef, FunctionType};
use crate::ast::invocation::InputParam;
use crate::ast::program::{ExpressionStatement, Program, Statement};
use crate::ast::values::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Names bound by the earlier elements of a chain; `None` when an earlier
/// element has no resolved schema, in which case every variable reference
/// is assumed to come from it.
type Bound = Option<BTreeSet<String>>;

impl Expression {
    /// Stream, query or action, from the resolved schema when present and
    /// from the shape of the expression otherwise
    pub(crate) fn classify(&self) -> FunctionType {
        if let Some(function_type) = self.function_type() {
            return function_type;
        }
        match self {
            Expression::Invocation(node) => node
                .invocation
                .schema
                .as_ref()
                .map(|schema| schema.function_type)
                .unwrap_or(FunctionType::Query),
            Expression::FunctionCall(call) => match call.name.as_str() {
                "timer" | "attimer" | "ontimer" => FunctionType::Stream,
                "notify" | "return" => FunctionType::Action,
                _ => FunctionType::Query,
            },
            Expression::Monitor(_) => FunctionType::Stream,
            Expression::Chain(chain) => match chain.expressions.last() {
                Some(last) if last.classify() == FunctionType::Action => FunctionType::Action,
                _ => chain
                    .expressions
                    .first()
                    .map(Expression::classify)
                    .unwrap_or(FunctionType::Query),
            },
            Expression::Join(join) => join.lhs.classify(),
            other => other
                .child()
                .map(Expression::classify)
                .unwrap_or(FunctionType::Query),
        }
    }

    pub fn to_legacy(&self) -> AstResult<LegacyNode> {
        match self {
            Expression::Invocation(node) => Ok(match self.classify() {
                FunctionType::Action => LegacyNode::Action(Action::Invocation(node.invocation.clone())),
                FunctionType::Stream => {
                    return Err(AstError::invalid_structure(
                        "a function invocation cannot be a stream",
                        node.range,
                    ))
                }
                FunctionType::Query => LegacyNode::Table(Table::Invocation(node.invocation.clone())),
            }),
            Expression::FunctionCall(call) => function_call_to_legacy(call, self.classify()),
            Expression::Filter(node) => match node.expression.to_legacy()? {
                LegacyNode::Table(table) => Ok(LegacyNode::Table(Table::Filter {
                    table: Box::new(table),
                    filter: node.filter.clone(),
                })),
                LegacyNode::Stream(stream) => Ok(LegacyNode::Stream(Stream::Filter {
                    stream: Box::new(stream),
                    filter: node.filter.clone(),
                })),
                LegacyNode::Action(_) => Err(AstError::invalid_structure(
                    "a filter cannot wrap an action",
                    node.range,
                )),
            },
            Expression::Monitor(node) => {
                let table = expect_table(node.expression.to_legacy()?, "monitor")?;
                Ok(LegacyNode::Stream(Stream::Monitor {
                    table: Box::new(table),
                    args: node.args.clone(),
                }))
            }
            Expression::Projection(node) => projection_to_legacy(node),
            Expression::Alias(node) => match node.expression.to_legacy()? {
                LegacyNode::Table(table) => Ok(LegacyNode::Table(Table::Alias {
                    table: Box::new(table),
                    name: node.name.clone(),
                })),
                LegacyNode::Stream(stream) => Ok(LegacyNode::Stream(Stream::Alias {
                    stream: Box::new(stream),
                    name: node.name.clone(),
                })),
                LegacyNode::Action(_) => Err(AstError::invalid_structure(
                    "an alias cannot wrap an action",
                    node.range,
                )),
            },
            Expression::Aggregation(node) => {
                let table = expect_table(node.expression.to_legacy()?, "aggregation")?;
                Ok(LegacyNode::Table(Table::Aggregation {
                    table: Box::new(table),
                    field: node.field.clone(),
                    operator: node.operator.clone(),
                }))
            }
            Expression::Sort(node) => {
                let field = match &node.value {
                    Value::VarRef(var) => var.name.clone(),
                    _ => return Err(AstError::unserializable("sort by computed value", node.range)),
                };
                let table = expect_table(node.expression.to_legacy()?, "sort")?;
                Ok(LegacyNode::Table(Table::Sort {
                    table: Box::new(table),
                    field,
                    direction: node.direction,
                }))
            }
            Expression::Index(node) => {
                let table = expect_table(node.expression.to_legacy()?, "index")?;
                Ok(LegacyNode::Table(Table::Index {
                    table: Box::new(table),
                    indices: node.indices.clone(),
                }))
            }
            Expression::Slice(node) => {
                let table = expect_table(node.expression.to_legacy()?, "slice")?;
                Ok(LegacyNode::Table(Table::Slice {
                    table: Box::new(table),
                    base: node.base.clone(),
                    limit: node.limit.clone(),
                }))
            }
            Expression::Chain(chain) => chain_to_legacy(&chain.expressions),
            Expression::Join(node) => Err(AstError::unserializable("join", node.range)),
            Expression::BooleanQuestion(node) => {
                Err(AstError::unserializable("boolean question", node.range))
            }
            Expression::Projection2(node) => {
                Err(AstError::unserializable("typed projection", node.range))
            }
        }
    }
}

fn expect_table(node: LegacyNode, construct: &str) -> AstResult<Table> {
    match node {
        LegacyNode::Table(table) => Ok(table),
        _ => Err(AstError::invalid_structure(
            &format!("{} requires a query", construct),
            None,
        )),
    }
}

fn find_param(params: &[InputParam], name: &str) -> Option<Value> {
    params
        .iter()
        .find(|param| param.name == name)
        .map(|param| param.value.clone())
}

fn require_param(call: &FunctionCallExpression, name: &str) -> AstResult<Value> {
    find_param(&call.in_params, name).ok_or_else(|| {
        AstError::invalid_structure(
            &format!("{} requires parameter '{}'", call.name, name),
            call.range,
        )
    })
}

fn values_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(array) => array.values,
        other => vec![other],
    }
}

fn function_call_to_legacy(
    call: &FunctionCallExpression,
    function_type: FunctionType,
) -> AstResult<LegacyNode> {
    let stream = match call.name.as_str() {
        "timer" => Stream::Timer {
            base: require_param(call, "base")?,
            interval: require_param(call, "interval")?,
            frequency: find_param(&call.in_params, "frequency"),
        },
        "attimer" => Stream::AtTimer {
            time: values_of(require_param(call, "time")?),
            expiration_date: find_param(&call.in_params, "expiration_date"),
        },
        "ontimer" => Stream::OnTimer {
            date: values_of(require_param(call, "date")?),
        },
        "notify" | "return" => return Ok(LegacyNode::Action(Action::Notify(call.name.clone()))),
        name => {
            let name = name.to_string();
            let in_params = call.in_params.clone();
            return Ok(match function_type {
                FunctionType::Stream => LegacyNode::Stream(Stream::VarRef { name, in_params }),
                FunctionType::Query => LegacyNode::Table(Table::VarRef { name, in_params }),
                FunctionType::Action => LegacyNode::Action(Action::VarRef { name, in_params }),
            });
        }
    };
    Ok(LegacyNode::Stream(stream))
}

fn projection_to_legacy(node: &ProjectionExpression) -> AstResult<LegacyNode> {
    let mut inner = node.expression.to_legacy()?;
    for (i, computation) in node.computations.iter().enumerate() {
        let alias = node.aliases.get(i).cloned().flatten();
        inner = match inner {
            LegacyNode::Table(table) => LegacyNode::Table(Table::Compute {
                table: Box::new(table),
                expression: computation.clone(),
                alias,
            }),
            LegacyNode::Stream(stream) => LegacyNode::Stream(Stream::Compute {
                stream: Box::new(stream),
                expression: computation.clone(),
                alias,
            }),
            LegacyNode::Action(_) => {
                return Err(AstError::unserializable("computed projection of an action", node.range))
            }
        };
    }
    if node.args.is_empty() {
        return Ok(inner);
    }
    let mut args = node.args.clone();
    args.extend(node.aliases.iter().flatten().cloned());
    match inner {
        LegacyNode::Table(table) => Ok(LegacyNode::Table(Table::Projection {
            table: Box::new(table),
            args,
        })),
        LegacyNode::Stream(stream) => Ok(LegacyNode::Stream(Stream::Projection {
            stream: Box::new(stream),
            args,
        })),
        LegacyNode::Action(_) => Err(AstError::invalid_structure(
            "a projection cannot wrap an action",
            node.range,
        )),
    }
}

/// Output names an expression contributes to the scope of the next element
fn add_outputs(bound: &mut Bound, expression: &Expression) {
    let schema = expression.schema().cloned().or_else(|| primitive_schema(expression));
    match (bound.as_mut(), schema) {
        (Some(names), Some(schema)) => names.extend(schema.out_args().map(|arg| arg.name.clone())),
        _ => *bound = None,
    }
}

fn primitive_schema(expression: &Expression) -> Option<Arc<FunctionDef>> {
    match expression {
        Expression::Invocation(node) => node.invocation.schema.clone(),
        Expression::FunctionCall(call) => call.schema.clone(),
        other => other.child().and_then(primitive_schema),
    }
}

fn primitive_params_mut(expression: &mut Expression) -> Option<&mut Vec<InputParam>> {
    match expression {
        Expression::Invocation(node) => Some(&mut node.invocation.in_params),
        Expression::FunctionCall(call) => Some(&mut call.in_params),
        Expression::Filter(node) => primitive_params_mut(&mut node.expression),
        Expression::Monitor(node) => primitive_params_mut(&mut node.expression),
        Expression::Projection(node) => primitive_params_mut(&mut node.expression),
        Expression::Projection2(node) => primitive_params_mut(&mut node.expression),
        Expression::BooleanQuestion(node) => primitive_params_mut(&mut node.expression),
        Expression::Alias(node) => primitive_params_mut(&mut node.expression),
        Expression::Aggregation(node) => primitive_params_mut(&mut node.expression),
        Expression::Sort(node) => primitive_params_mut(&mut node.expression),
        Expression::Index(node) => primitive_params_mut(&mut node.expression),
        Expression::Slice(node) => primitive_params_mut(&mut node.expression),
        Expression::Chain(_) | Expression::Join(_) => None,
    }
}

/// Move parameters that refer to earlier outputs into the join's own list
fn split_join_params(expression: &Expression, bound: &Bound) -> (Expression, Vec<InputParam>) {
    let mut expression = expression.clone();
    let mut join_params = Vec::new();
    if let Some(params) = primitive_params_mut(&mut expression) {
        let (passed, own): (Vec<InputParam>, Vec<InputParam>) =
            std::mem::take(params).into_iter().partition(|param| match &param.value {
                Value::VarRef(var) => bound
                    .as_ref()
                    .map(|names| names.contains(&var.name))
                    .unwrap_or(true),
                _ => false,
            });
        *params = own;
        join_params = passed;
    }
    (expression, join_params)
}

fn chain_to_legacy(expressions: &[Expression]) -> AstResult<LegacyNode> {
    let (first, rest) = expressions
        .split_first()
        .ok_or_else(|| AstError::invalid_structure("empty chain", None))?;
    if rest.is_empty() {
        return first.to_legacy();
    }

    let mut bound: Bound = Some(BTreeSet::new());
    add_outputs(&mut bound, first);
    let mut current = first.to_legacy()?;
    for element in rest {
        let (element_without_params, in_params) = split_join_params(element, &bound);
        let table = expect_table(element_without_params.to_legacy()?, "join")?;
        current = match current {
            LegacyNode::Stream(stream) => LegacyNode::Stream(Stream::Join {
                stream: Box::new(stream),
                table: Box::new(table),
                in_params,
            }),
            LegacyNode::Table(lhs) => LegacyNode::Table(Table::Join {
                lhs: Box::new(lhs),
                rhs: Box::new(table),
                in_params,
            }),
            LegacyNode::Action(_) => {
                return Err(AstError::invalid_structure(
                    "an action can only end a chain",
                    element.range(),
                ))
            }
        };
        add_outputs(&mut bound, element);
    }
    Ok(current)
}

fn statement_to_legacy(expression: &Expression, terminal: Option<&str>) -> AstResult<LegacyStatement> {
    let (source, actions) = match expression {
        Expression::Chain(chain)
            if chain.expressions.len() > 1
                && chain.expressions.last().map(Expression::classify) == Some(FunctionType::Action) =>
        {
            let (last, init) = chain
                .expressions
                .split_last()
                .ok_or_else(|| AstError::invalid_structure("empty chain", chain.range))?;
            let action = match last.to_legacy()? {
                LegacyNode::Action(action) => action,
                _ => return Err(AstError::invalid_structure("expected an action", last.range())),
            };
            (Some(chain_to_legacy(init)?), vec![action])
        }
        _ => match expression.to_legacy()? {
            LegacyNode::Action(action) => (None, vec![action]),
            node => (
                Some(node),
                vec![Action::Notify(terminal.unwrap_or("notify").to_string())],
            ),
        },
    };
    Ok(match source {
        None => LegacyStatement::Command {
            table: None,
            actions,
        },
        Some(LegacyNode::Table(table)) => LegacyStatement::Command {
            table: Some(table),
            actions,
        },
        Some(LegacyNode::Stream(stream)) => LegacyStatement::Rule { stream, actions },
        Some(LegacyNode::Action(_)) => {
            return Err(AstError::invalid_structure(
                "an action can only end a chain",
                expression.range(),
            ))
        }
    })
}

impl ExpressionStatement {
    /// Split off the trailing action; queries and streams without one
    /// notify their results
    pub fn to_legacy(&self) -> AstResult<LegacyStatement> {
        statement_to_legacy(&self.expression, None)
    }
}

impl Statement {
    pub fn to_legacy(&self) -> AstResult<LegacyStatement> {
        match self {
            Statement::Expression(stmt) => stmt.to_legacy(),
            Statement::Return(stmt) => statement_to_legacy(&stmt.expression, Some("return")),
            Statement::Assignment(stmt) => Err(AstError::unserializable("assignment", stmt.range)),
        }
    }
}

impl Program {
    pub fn to_legacy(&self) -> AstResult<LegacyProgram> {
        if let Some(declaration) = self.declarations.first() {
            return Err(AstError::unserializable("function declaration", declaration.range));
        }
        let statements = self
            .statements
            .iter()
            .map(Statement::to_legacy)
            .collect::<AstResult<Vec<_>>>()?;
        Ok(LegacyProgram {
            classes: self.classes.clone(),
            statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::function_def::{ArgDirection, ArgumentDef};
    use crate::ast::invocation::{Invocation, Selector};
    use crate::serialize::prettyprint;
    use crate::types::Type;
    use assert_matches::assert_matches;

    fn call(kind: &str, channel: &str, function_type: FunctionType, args: &[(&str, ArgDirection)], params: Vec<InputParam>) -> Expression {
        let mut schema = FunctionDef::new(function_type, Some(kind), channel);
        for (name, direction) in args {
            schema = schema.with_arg(ArgumentDef::new(name, *direction, Type::String));
        }
        let mut invocation = Invocation::new(Selector::device(kind), channel, params);
        invocation.schema = Some(Arc::new(schema));
        Expression::invocation(invocation)
    }

    fn search() -> Expression {
        call(
            "com.bing",
            "web_search",
            FunctionType::Query,
            &[("query", ArgDirection::InReq), ("title", ArgDirection::Out)],
            vec![InputParam::new("query", Value::String("rust".into()))],
        )
    }

    fn translate() -> Expression {
        call(
            "com.yandex",
            "translate",
            FunctionType::Query,
            &[
                ("text", ArgDirection::InReq),
                ("target", ArgDirection::InReq),
                ("translated", ArgDirection::Out),
            ],
            vec![
                InputParam::new("text", Value::var_ref("title")),
                InputParam::new("target", Value::var_ref("lang")),
            ],
        )
    }

    #[test]
    fn test_table_chain_becomes_join() {
        let statement = ExpressionStatement::new(Expression::chain(vec![search(), translate()]));
        let legacy = statement.to_legacy().unwrap();
        assert_matches!(
            &legacy,
            LegacyStatement::Command { table: Some(Table::Join { in_params, .. }), actions }
                if in_params.len() == 1 && actions == &vec![Action::Notify("notify".into())]
        );
        assert_eq!(
            prettyprint(&legacy.to_source()),
            "now => @com.bing.web_search(query=\"rust\") join @com.yandex.translate(target=lang) on (text=title) => notify;"
        );
    }

    #[test]
    fn test_stream_chain_with_action() {
        let post = call(
            "com.twitter",
            "post",
            FunctionType::Action,
            &[("status", ArgDirection::InReq)],
            vec![InputParam::new("status", Value::var_ref("translated"))],
        );
        let statement = ExpressionStatement::new(Expression::chain(vec![
            Expression::monitor(search(), None),
            translate(),
            post,
        ]));
        assert_matches!(
            statement.to_legacy(),
            Ok(LegacyStatement::Rule { stream: Stream::Join { .. }, actions }) if actions.len() == 1
        );
    }

    #[test]
    fn test_unserializable_constructs() {
        let join = ExpressionStatement::new(Expression::join(search(), translate()));
        assert_matches!(join.to_legacy(), Err(AstError::Unserializable { .. }));

        let program = Program::new(vec![Statement::Assignment(crate::ast::program::Assignment {
            range: None,
            name: "x".into(),
            value: search(),
        })]);
        assert_matches!(program.to_legacy(), Err(AstError::Unserializable { .. }));
    }

    #[test]
    fn test_computed_projection_of_action_is_unserializable() {
        let post = call(
            "com.twitter",
            "post",
            FunctionType::Action,
            &[("status", ArgDirection::InReq)],
            vec![InputParam::new("status", Value::String("hi".into()))],
        );
        let projection = Expression::Projection(ProjectionExpression {
            range: None,
            expression: Box::new(post),
            args: Vec::new(),
            computations: vec![Value::computation("+", vec![Value::Number(1.0), Value::Number(2.0)])],
            aliases: vec![None],
            schema: None,
        });
        assert_matches!(
            projection.to_legacy(),
            Err(AstError::Unserializable { construct, .. }) if construct == "computed projection of an action"
        );
    }
}
