//! Programs, statements, local classes and function declarations

use super::expression::Expression;
use super::function_def::{ArgumentDef, FunctionDef, FunctionType};
use crate::tokens;
use crate::tokens::{LayoutToken, TokenStream};
use crate::utils::SourceRange;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub range: Option<SourceRange>,
    pub expression: Expression,
}

impl ExpressionStatement {
    pub fn new(expression: Expression) -> Self {
        Self {
            range: expression.range(),
            expression,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        tokens![self.expression.to_source(), ";"]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub range: Option<SourceRange>,
    pub expression: Expression,
}

/// `let name = expression;`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub range: Option<SourceRange>,
    pub name: String,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(ExpressionStatement),
    Return(ReturnStatement),
    Assignment(Assignment),
}

impl Statement {
    pub fn expression(expression: Expression) -> Self {
        Statement::Expression(ExpressionStatement::new(expression))
    }

    pub fn range(&self) -> Option<SourceRange> {
        match self {
            Statement::Expression(stmt) => stmt.range,
            Statement::Return(stmt) => stmt.range,
            Statement::Assignment(stmt) => stmt.range,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        match self {
            Statement::Expression(stmt) => stmt.to_source(),
            Statement::Return(stmt) => tokens!["return", stmt.expression.to_source(), ";"],
            Statement::Assignment(stmt) => tokens![
                "let",
                stmt.name.as_str(),
                LayoutToken::Space,
                "=",
                LayoutToken::Space,
                stmt.value.to_source(),
                ";"
            ],
        }
    }
}

/// A class defined inline in a program
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub range: Option<SourceRange>,
    pub kind: String,
    pub extends: Vec<String>,
    pub queries: BTreeMap<String, FunctionDef>,
    pub actions: BTreeMap<String, FunctionDef>,
}

impl ClassDef {
    pub fn new(kind: &str) -> Self {
        Self {
            range: None,
            kind: kind.to_string(),
            extends: Vec::new(),
            queries: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }

    /// Add a function; its class is set to this class
    pub fn with_function(mut self, mut def: FunctionDef) -> Self {
        def.class = Some(self.kind.clone());
        match def.function_type {
            FunctionType::Action => {
                self.actions.insert(def.name.clone(), def);
            }
            FunctionType::Query | FunctionType::Stream => {
                self.queries.insert(def.name.clone(), def);
            }
        }
        self
    }

    pub fn get_function(&self, channel: &str, function_type: Option<FunctionType>) -> Option<&FunctionDef> {
        match function_type {
            Some(FunctionType::Action) => self.actions.get(channel),
            Some(_) => self.queries.get(channel),
            None => self.queries.get(channel).or_else(|| self.actions.get(channel)),
        }
    }

    pub fn to_source(&self) -> TokenStream {
        let mut head = vec![TokenStream::from("class"), TokenStream::from(format!("@{}", self.kind))];
        if !self.extends.is_empty() {
            let parents = self
                .extends
                .iter()
                .map(|parent| TokenStream::from(format!("@{}", parent)));
            head.push(TokenStream::from("extends"));
            head.push(TokenStream::join(parents, ",".into()));
        }
        let functions = self
            .queries
            .values()
            .chain(self.actions.values())
            .map(FunctionDef::to_source);
        tokens![
            TokenStream::concat(head),
            "{",
            block(functions),
            "}"
        ]
    }
}

/// `function name(args) { statements }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub range: Option<SourceRange>,
    pub name: String,
    pub args: Vec<ArgumentDef>,
    pub statements: Vec<Statement>,
    /// Signature inferred by the typechecker
    pub schema: Option<Arc<FunctionDef>>,
}

impl FunctionDeclaration {
    pub fn new(name: &str, args: Vec<ArgumentDef>, statements: Vec<Statement>) -> Self {
        Self {
            range: None,
            name: name.to_string(),
            args,
            statements,
            schema: None,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        let args = self.args.iter().map(ArgumentDef::to_source);
        tokens![
            "function",
            self.name.as_str(),
            "(",
            TokenStream::join(args, ",".into()),
            ")",
            "{",
            block(self.statements.iter().map(Statement::to_source)),
            "}"
        ]
    }
}

/// Indented block body, one element per line
pub(crate) fn block(items: impl Iterator<Item = TokenStream>) -> TokenStream {
    let body = TokenStream::join(items, LayoutToken::Newline.into());
    if body.is_empty() {
        return body;
    }
    tokens![
        LayoutToken::Indent,
        LayoutToken::Newline,
        body,
        LayoutToken::Dedent,
        LayoutToken::Newline
    ]
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub range: Option<SourceRange>,
    pub classes: Vec<ClassDef>,
    pub declarations: Vec<FunctionDeclaration>,
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
            ..Self::default()
        }
    }

    pub fn to_source(&self) -> TokenStream {
        let items = self
            .classes
            .iter()
            .map(ClassDef::to_source)
            .chain(self.declarations.iter().map(FunctionDeclaration::to_source))
            .chain(self.statements.iter().map(Statement::to_source));
        TokenStream::join(items, LayoutToken::Newline.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::function_def::ArgDirection;
    use crate::config::compile_time::serialization::INDENT_WIDTH;
    use crate::ast::invocation::{Invocation, Selector};
    use crate::serialize::prettyprint;
    use crate::types::Type;

    #[test]
    fn test_program_source() {
        let class = ClassDef::new("com.example").with_function(
            FunctionDef::new(FunctionType::Query, None, "get")
                .with_arg(ArgumentDef::new("value", ArgDirection::Out, Type::Number)),
        );
        let program = Program {
            classes: vec![class],
            statements: vec![
                Statement::Assignment(Assignment {
                    range: None,
                    name: "x".into(),
                    value: Expression::invocation(Invocation::new(
                        Selector::device("com.example"),
                        "get",
                        vec![],
                    )),
                }),
                Statement::expression(Expression::function_call("x", vec![])),
            ],
            ..Program::default()
        };
        let indent = " ".repeat(INDENT_WIDTH);
        assert_eq!(
            prettyprint(&program.to_source()),
            format!(
                "class @com.example {{\n{}query get(out value : Number);\n}}\nlet x = @com.example.get();\nx();",
                indent
            )
        );
    }
}
