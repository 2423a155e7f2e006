//! The legacy statement tree
//!
//! Before the unified expression algebra, statements were built from three
//! separate families: tables (queries), streams (event sources) and actions,
//! joined explicitly with named parameter passing. The tree is kept only as
//! the target of `to_legacy()` for clients that still read the older
//! syntax; nothing converts back.

mod convert;

use super::boolean_expression::BooleanExpression;
use super::expression::SortDirection;
use super::invocation::{InputParam, Invocation};
use super::program::ClassDef;
use super::values::Value;
use crate::tokens;
use crate::tokens::{LayoutToken, TokenStream};

#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    Invocation(Invocation),
    VarRef {
        name: String,
        in_params: Vec<InputParam>,
    },
    Filter {
        table: Box<Table>,
        filter: BooleanExpression,
    },
    Projection {
        table: Box<Table>,
        args: Vec<String>,
    },
    Compute {
        table: Box<Table>,
        expression: Value,
        alias: Option<String>,
    },
    Alias {
        table: Box<Table>,
        name: String,
    },
    Aggregation {
        table: Box<Table>,
        field: String,
        operator: String,
    },
    Sort {
        table: Box<Table>,
        field: String,
        direction: SortDirection,
    },
    Index {
        table: Box<Table>,
        indices: Vec<Value>,
    },
    Slice {
        table: Box<Table>,
        base: Value,
        limit: Value,
    },
    Join {
        lhs: Box<Table>,
        rhs: Box<Table>,
        in_params: Vec<InputParam>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stream {
    Timer {
        base: Value,
        interval: Value,
        frequency: Option<Value>,
    },
    AtTimer {
        time: Vec<Value>,
        expiration_date: Option<Value>,
    },
    OnTimer {
        date: Vec<Value>,
    },
    VarRef {
        name: String,
        in_params: Vec<InputParam>,
    },
    Monitor {
        table: Box<Table>,
        args: Option<Vec<String>>,
    },
    EdgeNew {
        stream: Box<Stream>,
    },
    EdgeFilter {
        stream: Box<Stream>,
        filter: BooleanExpression,
    },
    Filter {
        stream: Box<Stream>,
        filter: BooleanExpression,
    },
    Projection {
        stream: Box<Stream>,
        args: Vec<String>,
    },
    Compute {
        stream: Box<Stream>,
        expression: Value,
        alias: Option<String>,
    },
    Alias {
        stream: Box<Stream>,
        name: String,
    },
    Join {
        stream: Box<Stream>,
        table: Box<Table>,
        in_params: Vec<InputParam>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `notify` or `return`
    Notify(String),
    Invocation(Invocation),
    VarRef {
        name: String,
        in_params: Vec<InputParam>,
    },
}

/// Result of converting a single expression
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyNode {
    Table(Table),
    Stream(Stream),
    Action(Action),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyStatement {
    /// `now => [table =>] actions;`
    Command {
        table: Option<Table>,
        actions: Vec<Action>,
    },
    /// `stream => actions;`
    Rule { stream: Stream, actions: Vec<Action> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyProgram {
    pub classes: Vec<ClassDef>,
    pub statements: Vec<LegacyStatement>,
}

fn params_source(params: &[InputParam]) -> TokenStream {
    TokenStream::join(params.iter().map(InputParam::to_source), ",".into())
}

fn call(name: &str, params: &[InputParam]) -> TokenStream {
    tokens![name, "(", params_source(params), ")"]
}

fn paren(inner: TokenStream) -> TokenStream {
    tokens!["(", inner, ")"]
}

fn names(names: &[String]) -> TokenStream {
    let names = names.iter().map(|name| TokenStream::from(name.as_str()));
    tokens!["[", TokenStream::join(names, ",".into()), "]"]
}

fn join_params(in_params: &[InputParam]) -> TokenStream {
    if in_params.is_empty() {
        TokenStream::new()
    } else {
        tokens!["on", paren(params_source(in_params))]
    }
}

fn optional_param(name: &str, value: &Option<Value>) -> Option<TokenStream> {
    value
        .as_ref()
        .map(|value| tokens![name, "=", value.to_source()])
}

fn array_param(name: &str, values: &[Value]) -> TokenStream {
    let values = values.iter().map(Value::to_source);
    tokens![name, "=", "[", TokenStream::join(values, ",".into()), "]"]
}

impl Table {
    fn is_primary(&self) -> bool {
        matches!(self, Table::Invocation(_) | Table::VarRef { .. })
    }

    fn wrapped(&self) -> TokenStream {
        if self.is_primary() {
            self.to_source()
        } else {
            paren(self.to_source())
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Table::Invocation(invocation) => invocation.to_source(),
            Table::VarRef { name, in_params } => call(name, in_params),
            Table::Filter { table, filter } => tokens![table.wrapped(), ",", filter.to_source()],
            Table::Projection { table, args } => tokens![names(args), "of", table.wrapped()],
            Table::Compute {
                table,
                expression,
                alias,
            } => compute_source(expression, alias, table.wrapped()),
            Table::Alias { table, name } => tokens![table.wrapped(), "as", name.as_str()],
            Table::Aggregation {
                table,
                field,
                operator,
            } if field == "*" => tokens!["aggregate", operator.as_str(), "of", table.wrapped()],
            Table::Aggregation {
                table,
                field,
                operator,
            } => tokens![
                "aggregate",
                operator.as_str(),
                field.as_str(),
                "of",
                table.wrapped()
            ],
            Table::Sort {
                table,
                field,
                direction,
            } => tokens!["sort", field.as_str(), direction.as_str(), "of", table.wrapped()],
            Table::Index { table, indices } => {
                let indices = indices.iter().map(Value::to_source);
                tokens![table.wrapped(), "[", TokenStream::join(indices, ",".into()), "]"]
            }
            Table::Slice { table, base, limit } => tokens![
                table.wrapped(),
                "[",
                base.to_source(),
                ":",
                limit.to_source(),
                "]"
            ],
            Table::Join { lhs, rhs, in_params } => tokens![
                lhs.wrapped(),
                "join",
                rhs.wrapped(),
                join_params(in_params)
            ],
        }
    }
}

fn compute_source(expression: &Value, alias: &Option<String>, inner: TokenStream) -> TokenStream {
    let alias = match alias {
        Some(alias) => tokens!["as", alias.as_str()],
        None => TokenStream::new(),
    };
    tokens!["compute", expression.to_source(), alias, "of", inner]
}

impl Stream {
    fn is_primary(&self) -> bool {
        matches!(
            self,
            Stream::Timer { .. } | Stream::AtTimer { .. } | Stream::OnTimer { .. } | Stream::VarRef { .. }
        )
    }

    fn wrapped(&self) -> TokenStream {
        if self.is_primary() {
            self.to_source()
        } else {
            paren(self.to_source())
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Stream::Timer {
                base,
                interval,
                frequency,
            } => {
                let mut params = vec![
                    tokens!["base", "=", base.to_source()],
                    tokens!["interval", "=", interval.to_source()],
                ];
                params.extend(optional_param("frequency", frequency));
                tokens!["timer", "(", TokenStream::join(params, ",".into()), ")"]
            }
            Stream::AtTimer {
                time,
                expiration_date,
            } => {
                let mut params = vec![array_param("time", time)];
                params.extend(optional_param("expiration_date", expiration_date));
                tokens!["attimer", "(", TokenStream::join(params, ",".into()), ")"]
            }
            Stream::OnTimer { date } => tokens!["ontimer", "(", array_param("date", date), ")"],
            Stream::VarRef { name, in_params } => call(name, in_params),
            Stream::Monitor { table, args } => {
                let head = tokens!["monitor", paren(table.to_source())];
                match args {
                    Some(args) => tokens![head, "on", "new", names(args)],
                    None => head,
                }
            }
            Stream::EdgeNew { stream } => tokens!["edge", stream.wrapped(), "on", "new"],
            Stream::EdgeFilter { stream, filter } => {
                tokens!["edge", stream.wrapped(), "on", filter.to_source()]
            }
            Stream::Filter { stream, filter } => {
                tokens![stream.wrapped(), ",", filter.to_source()]
            }
            Stream::Projection { stream, args } => tokens![names(args), "of", stream.wrapped()],
            Stream::Compute {
                stream,
                expression,
                alias,
            } => compute_source(expression, alias, stream.wrapped()),
            Stream::Alias { stream, name } => tokens![stream.wrapped(), "as", name.as_str()],
            Stream::Join {
                stream,
                table,
                in_params,
            } => tokens![
                stream.wrapped(),
                "join",
                table.wrapped(),
                join_params(in_params)
            ],
        }
    }
}

impl Action {
    pub fn to_source(&self) -> TokenStream {
        match self {
            Action::Notify(name) => TokenStream::from(name.as_str()),
            Action::Invocation(invocation) => invocation.to_source(),
            Action::VarRef { name, in_params } => call(name, in_params),
        }
    }
}

impl LegacyStatement {
    pub fn actions(&self) -> &[Action] {
        match self {
            LegacyStatement::Command { actions, .. } | LegacyStatement::Rule { actions, .. } => {
                actions
            }
        }
    }

    pub fn to_source(&self) -> TokenStream {
        let actions = TokenStream::join(self.actions().iter().map(Action::to_source), ",".into());
        match self {
            LegacyStatement::Command { table: None, .. } => tokens!["now", "=>", actions, ";"],
            LegacyStatement::Command {
                table: Some(table), ..
            } => tokens!["now", "=>", table.to_source(), "=>", actions, ";"],
            LegacyStatement::Rule { stream, .. } => tokens![stream.to_source(), "=>", actions, ";"],
        }
    }
}

impl LegacyProgram {
    pub fn to_source(&self) -> TokenStream {
        let items = self
            .classes
            .iter()
            .map(ClassDef::to_source)
            .chain(self.statements.iter().map(LegacyStatement::to_source));
        TokenStream::join(items, LayoutToken::Newline.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::invocation::Selector;
    use crate::ast::values::DateValue;
    use crate::serialize::prettyprint;

    #[test]
    fn test_legacy_sources() {
        let table = Table::Filter {
            table: Box::new(Table::Invocation(Invocation::new(
                Selector::device("com.bing"),
                "web_search",
                vec![InputParam::new("query", Value::String("rust".into()))],
            ))),
            filter: BooleanExpression::atom("title", "=~", Value::String("book".into())),
        };
        let statement = LegacyStatement::Command {
            table: Some(Table::Projection {
                table: Box::new(table),
                args: vec!["link".into()],
            }),
            actions: vec![Action::Notify("notify".into())],
        };
        assert_eq!(
            prettyprint(&statement.to_source()),
            "now => [link] of (@com.bing.web_search(query=\"rust\"), title =~ \"book\") => notify;"
        );

        let rule = LegacyStatement::Rule {
            stream: Stream::EdgeNew {
                stream: Box::new(Stream::Timer {
                    base: Value::Date(DateValue::Now),
                    interval: Value::measure(1.0, "h"),
                    frequency: None,
                }),
            },
            actions: vec![Action::Notify("notify".into())],
        };
        assert_eq!(
            prettyprint(&rule.to_source()),
            "edge timer(base=$now, interval=1h) on new => notify;"
        );
    }
}
