//! Permission rules: `principal : query => action;`

use super::boolean_expression::BooleanExpression;
use super::function_def::FunctionDef;
use crate::tokens;
use crate::tokens::TokenStream;
use crate::utils::SourceRange;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SpecifiedPermissionFunction {
    pub range: Option<SourceRange>,
    pub kind: String,
    pub channel: String,
    pub filter: BooleanExpression,
    pub schema: Option<Arc<FunctionDef>>,
}

/// The query or action side of a permission rule
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionFunction {
    /// A specific function, optionally restricted by a filter
    Specified(SpecifiedPermissionFunction),
    /// `now` on the query side, `notify` on the action side
    Builtin,
    /// Every function of a class: `@kind.*`
    ClassStar { kind: String },
    /// Any function: `*`
    Star,
}

impl PermissionFunction {
    pub fn specified(kind: &str, channel: &str, filter: BooleanExpression) -> Self {
        PermissionFunction::Specified(SpecifiedPermissionFunction {
            range: None,
            kind: kind.to_string(),
            channel: channel.to_string(),
            filter,
            schema: None,
        })
    }

    fn to_source(&self, builtin: &'static str) -> TokenStream {
        match self {
            PermissionFunction::Specified(function) => {
                let head = TokenStream::from(format!("@{}.{}", function.kind, function.channel));
                if function.filter.is_true() {
                    head
                } else {
                    tokens![head, "filter", function.filter.to_source()]
                }
            }
            PermissionFunction::Builtin => TokenStream::from(builtin),
            PermissionFunction::ClassStar { kind } => TokenStream::from(format!("@{}.*", kind)),
            PermissionFunction::Star => TokenStream::from("*"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRule {
    pub range: Option<SourceRange>,
    /// Predicate over `source`, the requesting principal
    pub principal: BooleanExpression,
    pub query: PermissionFunction,
    pub action: PermissionFunction,
}

impl PermissionRule {
    pub fn new(principal: BooleanExpression, query: PermissionFunction, action: PermissionFunction) -> Self {
        Self {
            range: None,
            principal,
            query,
            action,
        }
    }

    pub fn to_source(&self) -> TokenStream {
        tokens![
            self.principal.to_source(),
            ":",
            self.query.to_source("now"),
            "=>",
            self.action.to_source("notify"),
            ";"
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::values::Value;
    use crate::serialize::prettyprint;

    #[test]
    fn test_rule_source() {
        let rule = PermissionRule::new(
            BooleanExpression::atom(
                "source",
                "==",
                Value::entity("mock-account:alice", "tt:contact", Some("Alice")),
            ),
            PermissionFunction::specified(
                "com.bing",
                "web_search",
                BooleanExpression::atom("query", "=~", Value::String("cats".into())),
            ),
            PermissionFunction::Builtin,
        );
        assert_eq!(
            prettyprint(&rule.to_source()),
            "source == \"mock-account:alice\"^^tt:contact(\"Alice\") : @com.bing.web_search filter query =~ \"cats\" => notify;"
        );

        let any = PermissionRule::new(
            BooleanExpression::True,
            PermissionFunction::Builtin,
            PermissionFunction::ClassStar {
                kind: "com.twitter".into(),
            },
        );
        assert_eq!(prettyprint(&any.to_source()), "true : now => @com.twitter.*;");
    }
}
