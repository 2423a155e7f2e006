//! Dialogue state: the policy, the current dialogue act and the history of
//! executed or proposed statements with their results.

use super::error::{AstError, AstResult};
use super::program::ExpressionStatement;
use super::values::Value;
use crate::tokens;
use crate::tokens::{LayoutToken, TokenStream};
use crate::utils::SourceRange;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Proposed,
    Accepted,
    Confirmed,
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationState::Proposed => "proposed",
            ConfirmationState::Accepted => "accepted",
            ConfirmationState::Confirmed => "confirmed",
        }
    }
}

/// One result row: output parameter name to value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultItem {
    pub range: Option<SourceRange>,
    pub value: BTreeMap<String, Value>,
}

impl ResultItem {
    pub fn to_source(&self) -> TokenStream {
        Value::Object(self.value.clone()).to_source()
    }
}

/// A page of results
#[derive(Debug, Clone, PartialEq)]
pub struct ResultList {
    pub range: Option<SourceRange>,
    pub results: Vec<ResultItem>,
    /// Total number of results, possibly more than the page holds
    pub count: Value,
    pub more: bool,
    pub error: Option<Value>,
}

impl ResultList {
    pub fn new(results: Vec<ResultItem>, count: Value, more: bool, error: Option<Value>) -> Self {
        Self {
            range: None,
            results,
            count,
            more,
            error,
        }
    }

    fn to_source(&self) -> TokenStream {
        let results = self.results.iter().map(ResultItem::to_source);
        let mut parts = vec![
            tokens![
                "#[",
                "results",
                "=",
                "[",
                TokenStream::join(results, ",".into()),
                "]",
                "]"
            ],
            tokens!["#[", "count", "=", self.count.to_source(), "]"],
        ];
        if self.more {
            parts.push(tokens!["#[", "more", "=", "true", "]"]);
        }
        if let Some(error) = &self.error {
            parts.push(tokens!["#[", "error", "=", error.to_source(), "]"]);
        }
        TokenStream::join(parts, LayoutToken::Newline.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueHistoryItem {
    pub range: Option<SourceRange>,
    pub stmt: ExpressionStatement,
    results: Option<ResultList>,
    confirm: ConfirmationState,
}

impl DialogueHistoryItem {
    /// Fails when results are given for an item that is not confirmed
    pub fn new(
        stmt: ExpressionStatement,
        results: Option<ResultList>,
        confirm: ConfirmationState,
    ) -> AstResult<Self> {
        check_results(&results, confirm)?;
        Ok(Self {
            range: stmt.range,
            stmt,
            results,
            confirm,
        })
    }

    pub fn results(&self) -> Option<&ResultList> {
        self.results.as_ref()
    }

    pub fn confirm(&self) -> ConfirmationState {
        self.confirm
    }

    pub fn set_results(&mut self, results: Option<ResultList>) -> AstResult<()> {
        check_results(&results, self.confirm)?;
        self.results = results;
        Ok(())
    }

    pub fn set_confirm(&mut self, confirm: ConfirmationState) -> AstResult<()> {
        check_results(&self.results, confirm)?;
        self.confirm = confirm;
        Ok(())
    }

    pub fn to_source(&self) -> TokenStream {
        let annotations = match (&self.results, self.confirm) {
            (Some(results), _) => results.to_source(),
            (None, ConfirmationState::Proposed) => TokenStream::new(),
            (None, confirm) => tokens!["#[", "confirm", "=", "enum", "(", confirm.as_str(), ")", "]"],
        };
        if annotations.is_empty() {
            return self.stmt.to_source();
        }
        tokens![
            self.stmt.expression.to_source(),
            LayoutToken::Indent,
            LayoutToken::Newline,
            annotations,
            LayoutToken::Dedent,
            ";"
        ]
    }
}

fn check_results(results: &Option<ResultList>, confirm: ConfirmationState) -> AstResult<()> {
    if results.is_some() && confirm != ConfirmationState::Confirmed {
        return Err(AstError::invalid_dialogue_state(&format!(
            "history item in state '{}' cannot carry results",
            confirm.as_str()
        )));
    }
    Ok(())
}

/// `$dialogue @policy.act(params);` followed by the history.
///
/// `current` points at the most recent history item with results and is
/// recomputed whenever the history changes, which is why the history is
/// only reachable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueState {
    pub range: Option<SourceRange>,
    pub policy: String,
    pub dialogue_act: String,
    pub dialogue_act_param: Option<Vec<String>>,
    history: Vec<DialogueHistoryItem>,
    current: Option<usize>,
}

impl DialogueState {
    pub fn new(
        policy: &str,
        dialogue_act: &str,
        dialogue_act_param: Option<Vec<String>>,
        history: Vec<DialogueHistoryItem>,
    ) -> Self {
        let mut state = Self {
            range: None,
            policy: policy.to_string(),
            dialogue_act: dialogue_act.to_string(),
            dialogue_act_param,
            history,
            current: None,
        };
        state.update_current();
        state
    }

    fn update_current(&mut self) {
        self.current = self.history.iter().rposition(|item| item.results.is_some());
    }

    pub fn history(&self) -> &[DialogueHistoryItem] {
        &self.history
    }

    pub fn current(&self) -> Option<&DialogueHistoryItem> {
        self.current.and_then(|index| self.history.get(index))
    }

    /// Items after the current one, i.e. not yet executed
    pub fn next(&self) -> Option<&DialogueHistoryItem> {
        let index = self.current.map(|index| index + 1).unwrap_or(0);
        self.history.get(index)
    }

    pub fn push(&mut self, item: DialogueHistoryItem) {
        self.history.push(item);
        self.update_current();
    }

    /// Mutate the history in place; `current` is recomputed afterwards
    pub fn update_history<R>(&mut self, f: impl FnOnce(&mut Vec<DialogueHistoryItem>) -> R) -> R {
        let result = f(&mut self.history);
        self.update_current();
        result
    }

    pub fn to_source(&self) -> TokenStream {
        let params = match &self.dialogue_act_param {
            Some(params) => {
                let params = params.iter().map(|param| TokenStream::from(param.as_str()));
                tokens!["(", TokenStream::join(params, ",".into()), ")"]
            }
            None => TokenStream::new(),
        };
        let head = tokens![
            "$dialogue",
            format!("@{}.{}", self.policy, self.dialogue_act),
            params,
            ";"
        ];
        let items = std::iter::once(head).chain(self.history.iter().map(DialogueHistoryItem::to_source));
        TokenStream::join(items, LayoutToken::Newline.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::Expression;
    use crate::ast::invocation::{Invocation, Selector};
    use assert_matches::assert_matches;

    fn stmt(channel: &str) -> ExpressionStatement {
        ExpressionStatement::new(Expression::invocation(Invocation::new(
            Selector::device("com.example"),
            channel,
            vec![],
        )))
    }

    fn results() -> ResultList {
        let mut row = BTreeMap::new();
        row.insert("value".to_string(), Value::Number(1.0));
        ResultList::new(
            vec![ResultItem {
                range: None,
                value: row,
            }],
            Value::Number(1.0),
            false,
            None,
        )
    }

    #[test]
    fn test_results_require_confirmation() {
        let err = DialogueHistoryItem::new(stmt("get"), Some(results()), ConfirmationState::Accepted);
        assert_matches!(err, Err(AstError::InvalidDialogueState { .. }));

        let mut item =
            DialogueHistoryItem::new(stmt("get"), Some(results()), ConfirmationState::Confirmed)
                .unwrap();
        assert_matches!(
            item.set_confirm(ConfirmationState::Proposed),
            Err(AstError::InvalidDialogueState { .. })
        );
        assert!(item.set_results(None).is_ok());
        assert!(item.set_confirm(ConfirmationState::Proposed).is_ok());
    }

    #[test]
    fn test_current_tracks_history() {
        let executed =
            DialogueHistoryItem::new(stmt("get"), Some(results()), ConfirmationState::Confirmed)
                .unwrap();
        let proposed = DialogueHistoryItem::new(stmt("set"), None, ConfirmationState::Proposed)
            .unwrap();

        let mut state = DialogueState::new("org.thingpedia.dialogue.transaction", "sys_recommend_one", None, vec![]);
        assert!(state.current().is_none());

        state.push(executed);
        state.push(proposed);
        assert_eq!(state.current().map(|item| item.stmt.clone()), Some(stmt("get")));
        assert_eq!(state.next().map(|item| item.stmt.clone()), Some(stmt("set")));

        state.update_history(|history| history.remove(0));
        assert!(state.current().is_none());
    }
}
