//! Slot iteration
//!
//! A slot is a value hole the user may have to fill: an input parameter, a
//! device attribute, the value side of a filter atom, or a scalar operand of
//! a projection, sort, index or slice. Iteration threads a name scope through
//! chains so that every slot knows which earlier results it may refer to.
//!
//! `iterate_slots` yields shared borrows; `rewrite_slots` visits the same
//! positions mutably, in the same order, for passes that fill them in.

use super::boolean_expression::{
    AtomBooleanExpression, BooleanExpression, ComputeBooleanExpression,
    ExternalBooleanExpression,
};
use super::expression::{Expression, FunctionCallExpression, ProjectionValue};
use super::function_def::{ArgumentDef, FunctionDef};
use super::invocation::{InputParam, Invocation, Selector};
use super::program::{Program, Statement};
use super::values::Value;
use crate::types::Type;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A name visible to a slot, with the function that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeEntry {
    pub ty: Type,
    pub origin: String,
}

pub type ScopeMap = BTreeMap<String, ScopeEntry>;

/// The invocation-like node a slot belongs to
#[derive(Debug, Clone, Copy)]
pub enum SlotOwner<'a> {
    Invocation(&'a Invocation),
    FunctionCall(&'a FunctionCallExpression),
    External(&'a ExternalBooleanExpression),
}

impl<'a> SlotOwner<'a> {
    pub fn schema(&self) -> Option<&'a Arc<FunctionDef>> {
        match self {
            SlotOwner::Invocation(invocation) => invocation.schema.as_ref(),
            SlotOwner::FunctionCall(call) => call.schema.as_ref(),
            SlotOwner::External(external) => external.schema.as_ref(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            SlotOwner::Invocation(invocation) => invocation.qualified_name(),
            SlotOwner::FunctionCall(call) => call.name.clone(),
            SlotOwner::External(external) => match &external.selector {
                Selector::Device(device) => format!("@{}.{}", device.kind, external.channel),
                Selector::Builtin => external.channel.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SlotKind<'a> {
    InputParam(&'a InputParam),
    DeviceAttribute(&'a InputParam),
    FilterAtom(&'a AtomBooleanExpression),
    Scalar(&'a Value),
}

#[derive(Debug, Clone)]
pub struct SlotItem<'a> {
    pub kind: SlotKind<'a>,
    /// Schema argument the slot fills, when it can be resolved
    pub arg: Option<&'a ArgumentDef>,
    pub owner: Option<SlotOwner<'a>>,
    pub scope: ScopeMap,
}

impl<'a> SlotItem<'a> {
    pub fn value(&self) -> &'a Value {
        match self.kind {
            SlotKind::InputParam(param) | SlotKind::DeviceAttribute(param) => &param.value,
            SlotKind::FilterAtom(atom) => &atom.value,
            SlotKind::Scalar(value) => value,
        }
    }

    /// Whether the slot still needs a value from the user
    pub fn is_undefined(&self) -> bool {
        self.value().is_undefined()
    }
}

/// Slots of a subtree plus the primitive owner and the scope after it
#[derive(Debug, Clone)]
pub struct SlotIteration<'a> {
    pub slots: Vec<SlotItem<'a>>,
    pub result: (Option<SlotOwner<'a>>, ScopeMap),
}

struct Collector<'a> {
    slots: Vec<SlotItem<'a>>,
}

impl<'a> Collector<'a> {
    fn push(
        &mut self,
        kind: SlotKind<'a>,
        arg: Option<&'a ArgumentDef>,
        owner: Option<SlotOwner<'a>>,
        scope: &ScopeMap,
    ) {
        self.slots.push(SlotItem {
            kind,
            arg,
            owner,
            scope: scope.clone(),
        });
    }

    fn selector(&mut self, selector: &'a Selector, owner: SlotOwner<'a>, scope: &ScopeMap) {
        if let Selector::Device(device) = selector {
            for attribute in &device.attributes {
                self.push(SlotKind::DeviceAttribute(attribute), None, Some(owner), scope);
            }
        }
    }

    fn params(&mut self, params: &'a [InputParam], owner: SlotOwner<'a>, scope: &ScopeMap) {
        let schema = owner.schema();
        for param in params {
            let arg = schema.and_then(|schema| schema.get_arg(&param.name));
            self.push(SlotKind::InputParam(param), arg, Some(owner), scope);
        }
    }

    fn filter(
        &mut self,
        filter: &'a BooleanExpression,
        schema: Option<&'a Arc<FunctionDef>>,
        owner: Option<SlotOwner<'a>>,
        scope: &ScopeMap,
    ) {
        match filter {
            BooleanExpression::And(and) => {
                for operand in &and.operands {
                    self.filter(operand, schema, owner, scope);
                }
            }
            BooleanExpression::Or(or) => {
                for operand in &or.operands {
                    self.filter(operand, schema, owner, scope);
                }
            }
            BooleanExpression::Not(not) => self.filter(&not.expr, schema, owner, scope),
            BooleanExpression::Atom(atom) => {
                let arg = schema.and_then(|schema| schema.get_arg(&atom.name));
                self.push(SlotKind::FilterAtom(atom), arg, owner, scope);
            }
            BooleanExpression::Compute(ComputeBooleanExpression { lhs, rhs, .. }) => {
                self.push(SlotKind::Scalar(lhs), None, owner, scope);
                self.push(SlotKind::Scalar(rhs), None, owner, scope);
            }
            BooleanExpression::External(external) => {
                let inner = SlotOwner::External(external);
                self.selector(&external.selector, inner, scope);
                self.params(&external.in_params, inner, scope);
                self.filter(&external.filter, external.schema.as_ref(), Some(inner), scope);
            }
            BooleanExpression::DontCare(_) | BooleanExpression::True | BooleanExpression::False => {}
        }
    }

    fn expression(
        &mut self,
        expression: &'a Expression,
        scope: ScopeMap,
    ) -> (Option<SlotOwner<'a>>, ScopeMap) {
        match expression {
            Expression::Invocation(node) => {
                let owner = SlotOwner::Invocation(&node.invocation);
                self.selector(&node.invocation.selector, owner, &scope);
                self.params(&node.invocation.in_params, owner, &scope);
                let scope = extend_scope(scope, owner);
                (Some(owner), scope)
            }
            Expression::FunctionCall(call) => {
                let owner = SlotOwner::FunctionCall(call);
                self.params(&call.in_params, owner, &scope);
                let scope = extend_scope(scope, owner);
                (Some(owner), scope)
            }
            Expression::Filter(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                let schema = result_schema(&node.expression, owner);
                self.filter(&node.filter, schema, owner, &scope);
                (owner, scope)
            }
            Expression::BooleanQuestion(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                let schema = result_schema(&node.expression, owner);
                self.filter(&node.boolean_expression, schema, owner, &scope);
                (owner, scope)
            }
            Expression::Projection(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                for computation in &node.computations {
                    self.push(SlotKind::Scalar(computation), None, owner, &scope);
                }
                (owner, scope)
            }
            Expression::Projection2(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                for element in &node.projections {
                    if let ProjectionValue::Value(value) = &element.value {
                        self.push(SlotKind::Scalar(value), None, owner, &scope);
                    }
                }
                (owner, scope)
            }
            Expression::Sort(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                self.push(SlotKind::Scalar(&node.value), None, owner, &scope);
                (owner, scope)
            }
            Expression::Index(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                for index in &node.indices {
                    self.push(SlotKind::Scalar(index), None, owner, &scope);
                }
                (owner, scope)
            }
            Expression::Slice(node) => {
                let (owner, scope) = self.expression(&node.expression, scope);
                self.push(SlotKind::Scalar(&node.base), None, owner, &scope);
                self.push(SlotKind::Scalar(&node.limit), None, owner, &scope);
                (owner, scope)
            }
            Expression::Monitor(node) => self.expression(&node.expression, scope),
            Expression::Alias(node) => self.expression(&node.expression, scope),
            Expression::Aggregation(node) => self.expression(&node.expression, scope),
            Expression::Chain(chain) => {
                let mut owner = None;
                let mut scope = scope;
                for element in &chain.expressions {
                    let (next_owner, next_scope) = self.expression(element, scope);
                    owner = next_owner;
                    scope = next_scope;
                }
                (owner, scope)
            }
            Expression::Join(join) => {
                let (_, scope) = self.expression(&join.lhs, scope);
                self.expression(&join.rhs, scope)
            }
        }
    }
}

/// Schema a filter over `expression` is checked against
fn result_schema<'a>(
    expression: &'a Expression,
    owner: Option<SlotOwner<'a>>,
) -> Option<&'a Arc<FunctionDef>> {
    expression.schema().or_else(|| owner.and_then(|owner| owner.schema()))
}

/// Add the outputs of `owner` to `scope`; later names shadow earlier ones
fn extend_scope(mut scope: ScopeMap, owner: SlotOwner<'_>) -> ScopeMap {
    if let Some(schema) = owner.schema() {
        let origin = owner.name();
        for arg in schema.out_args() {
            scope.insert(
                arg.name.clone(),
                ScopeEntry {
                    ty: arg.ty.clone(),
                    origin: origin.clone(),
                },
            );
        }
    }
    scope
}

impl Expression {
    pub fn iterate_slots(&self, scope: ScopeMap) -> SlotIteration<'_> {
        let mut collector = Collector { slots: Vec::new() };
        let result = collector.expression(self, scope);
        SlotIteration {
            slots: collector.slots,
            result,
        }
    }
}

impl BooleanExpression {
    /// Slots of a filter evaluated against the results of `schema`
    pub fn iterate_slots<'a>(
        &'a self,
        schema: Option<&'a Arc<FunctionDef>>,
        scope: &ScopeMap,
    ) -> Vec<SlotItem<'a>> {
        let mut collector = Collector { slots: Vec::new() };
        collector.filter(self, schema, None, scope);
        collector.slots
    }
}

impl Program {
    /// Slots of every statement; each statement starts from an empty scope
    pub fn iterate_slots(&self) -> Vec<SlotItem<'_>> {
        let mut collector = Collector { slots: Vec::new() };
        for statement in &self.statements {
            let expression = match statement {
                Statement::Expression(stmt) => &stmt.expression,
                Statement::Return(stmt) => &stmt.expression,
                Statement::Assignment(stmt) => &stmt.value,
            };
            collector.expression(expression, ScopeMap::new());
        }
        collector.slots
    }
}

/// Visit every slot value mutably, in iteration order
pub fn rewrite_slots(expression: &mut Expression, f: &mut impl FnMut(&mut Value)) {
    match expression {
        Expression::Invocation(node) => {
            rewrite_selector(&mut node.invocation.selector, f);
            node.invocation.in_params.iter_mut().for_each(|param| f(&mut param.value));
        }
        Expression::FunctionCall(call) => {
            call.in_params.iter_mut().for_each(|param| f(&mut param.value));
        }
        Expression::Filter(node) => {
            rewrite_slots(&mut node.expression, f);
            rewrite_filter(&mut node.filter, f);
        }
        Expression::BooleanQuestion(node) => {
            rewrite_slots(&mut node.expression, f);
            rewrite_filter(&mut node.boolean_expression, f);
        }
        Expression::Projection(node) => {
            rewrite_slots(&mut node.expression, f);
            node.computations.iter_mut().for_each(|value| f(value));
        }
        Expression::Projection2(node) => {
            rewrite_slots(&mut node.expression, f);
            for element in &mut node.projections {
                if let ProjectionValue::Value(value) = &mut element.value {
                    f(value);
                }
            }
        }
        Expression::Sort(node) => {
            rewrite_slots(&mut node.expression, f);
            f(&mut node.value);
        }
        Expression::Index(node) => {
            rewrite_slots(&mut node.expression, f);
            node.indices.iter_mut().for_each(|value| f(value));
        }
        Expression::Slice(node) => {
            rewrite_slots(&mut node.expression, f);
            f(&mut node.base);
            f(&mut node.limit);
        }
        Expression::Monitor(node) => rewrite_slots(&mut node.expression, f),
        Expression::Alias(node) => rewrite_slots(&mut node.expression, f),
        Expression::Aggregation(node) => rewrite_slots(&mut node.expression, f),
        Expression::Chain(chain) => {
            for element in &mut chain.expressions {
                rewrite_slots(element, f);
            }
        }
        Expression::Join(join) => {
            rewrite_slots(&mut join.lhs, f);
            rewrite_slots(&mut join.rhs, f);
        }
    }
}

fn rewrite_selector(selector: &mut Selector, f: &mut impl FnMut(&mut Value)) {
    if let Selector::Device(device) = selector {
        device.attributes.iter_mut().for_each(|attribute| f(&mut attribute.value));
    }
}

fn rewrite_filter(filter: &mut BooleanExpression, f: &mut impl FnMut(&mut Value)) {
    match filter {
        BooleanExpression::And(and) => and.operands.iter_mut().for_each(|op| rewrite_filter(op, f)),
        BooleanExpression::Or(or) => or.operands.iter_mut().for_each(|op| rewrite_filter(op, f)),
        BooleanExpression::Not(not) => rewrite_filter(&mut not.expr, f),
        BooleanExpression::Atom(atom) => f(&mut atom.value),
        BooleanExpression::Compute(compute) => {
            f(&mut compute.lhs);
            f(&mut compute.rhs);
        }
        BooleanExpression::External(external) => {
            rewrite_selector(&mut external.selector, f);
            external.in_params.iter_mut().for_each(|param| f(&mut param.value));
            rewrite_filter(&mut external.filter, f);
        }
        BooleanExpression::DontCare(_) | BooleanExpression::True | BooleanExpression::False => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::function_def::{ArgDirection, FunctionType};

    fn search() -> Expression {
        let schema = FunctionDef::new(FunctionType::Query, Some("com.bing"), "web_search")
            .with_arg(ArgumentDef::new("query", ArgDirection::InReq, Type::String))
            .with_arg(ArgumentDef::new("title", ArgDirection::Out, Type::String))
            .with_arg(ArgumentDef::new("link", ArgDirection::Out, Type::entity("tt:url")));
        let mut invocation = Invocation::new(
            Selector::device("com.bing"),
            "web_search",
            vec![InputParam::new("query", Value::undefined())],
        );
        invocation.schema = Some(Arc::new(schema));
        Expression::invocation(invocation)
    }

    fn post() -> Expression {
        let schema = FunctionDef::new(FunctionType::Action, Some("com.twitter"), "post")
            .with_arg(ArgumentDef::new("status", ArgDirection::InReq, Type::String));
        let mut invocation = Invocation::new(
            Selector::device("com.twitter"),
            "post",
            vec![InputParam::new("status", Value::var_ref("title"))],
        );
        invocation.schema = Some(Arc::new(schema));
        Expression::invocation(invocation)
    }

    #[test]
    fn test_scope_threads_through_chain() {
        let filtered = Expression::filter(
            search(),
            BooleanExpression::atom("title", "=~", Value::String("rust".into())),
        );
        let chain = Expression::chain(vec![filtered, post()]);
        let iteration = chain.iterate_slots(ScopeMap::new());

        assert_eq!(iteration.slots.len(), 3);
        let query = &iteration.slots[0];
        assert!(query.is_undefined());
        assert_eq!(query.arg.map(|arg| arg.name.as_str()), Some("query"));
        assert!(query.scope.is_empty());

        let atom = &iteration.slots[1];
        assert!(matches!(atom.kind, SlotKind::FilterAtom(_)));
        assert_eq!(atom.arg.map(|arg| arg.ty.clone()), Some(Type::String));

        let status = &iteration.slots[2];
        assert_eq!(
            status.scope.get("title").map(|entry| entry.origin.as_str()),
            Some("@com.bing.web_search")
        );
        assert_eq!(status.owner.map(|owner| owner.name()), Some("@com.twitter.post".to_string()));

        let (owner, scope) = iteration.result;
        assert_eq!(owner.map(|owner| owner.name()), Some("@com.twitter.post".to_string()));
        assert!(scope.contains_key("link"));
    }

    #[test]
    fn test_rewrite_fills_slots_in_order() {
        let mut chain = Expression::chain(vec![search(), post()]);
        let mut seen = Vec::new();
        rewrite_slots(&mut chain, &mut |value| {
            seen.push(value.clone());
            if value.is_undefined() {
                *value = Value::String("rust".into());
            }
        });
        assert_eq!(seen, vec![Value::undefined(), Value::var_ref("title")]);
        let slots = chain.iterate_slots(ScopeMap::new()).slots;
        assert!(slots.iter().all(|slot| !slot.is_undefined()));
    }
}
