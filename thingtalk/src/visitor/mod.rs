//! Generic AST traversal
//!
//! A [`Visitor`] gets `enter` and `exit` around every node and one
//! `visit_*` call per concrete node type; returning `false` from `visit_*`
//! skips the children of that node but still calls `exit`. Nodes dispatch to
//! the right method through [`Visit::visit`].
//!
//! Children are visited in source order: selectors before input parameters,
//! input parameters before nested filters, the inner expression before the
//! values that refer to its results. A local class visits its queries, then
//! its actions, each in name order.
//!
//! Every [`Value`] variant has its own `visit_*_value` method; `enter` and
//! `exit` receive the whole value as [`NodeRef::Value`].

use crate::ast::*;
use crate::types::Type;
use std::collections::BTreeMap;

/// Borrowed reference to any node, passed to `enter` and `exit`
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Program(&'a Program),
    ClassDef(&'a ClassDef),
    FunctionDef(&'a FunctionDef),
    FunctionDeclaration(&'a FunctionDeclaration),
    ExpressionStatement(&'a ExpressionStatement),
    ReturnStatement(&'a ReturnStatement),
    Assignment(&'a Assignment),
    PermissionRule(&'a PermissionRule),
    PermissionFunction(&'a PermissionFunction),
    ControlCommand(&'a ControlCommand),
    DialogueState(&'a DialogueState),
    DialogueHistoryItem(&'a DialogueHistoryItem),
    DeviceSelector(&'a DeviceSelector),
    BuiltinSelector,
    InputParam(&'a InputParam),
    Invocation(&'a Invocation),
    Value(&'a Value),
    AndBooleanExpression(&'a AndBooleanExpression),
    OrBooleanExpression(&'a OrBooleanExpression),
    NotBooleanExpression(&'a NotBooleanExpression),
    AtomBooleanExpression(&'a AtomBooleanExpression),
    ExternalBooleanExpression(&'a ExternalBooleanExpression),
    DontCareBooleanExpression(&'a DontCareBooleanExpression),
    ComputeBooleanExpression(&'a ComputeBooleanExpression),
    TrueBooleanExpression,
    FalseBooleanExpression,
    FunctionCallExpression(&'a FunctionCallExpression),
    InvocationExpression(&'a InvocationExpression),
    FilterExpression(&'a FilterExpression),
    MonitorExpression(&'a MonitorExpression),
    ProjectionExpression(&'a ProjectionExpression),
    ProjectionExpression2(&'a ProjectionExpression2),
    BooleanQuestionExpression(&'a BooleanQuestionExpression),
    AliasExpression(&'a AliasExpression),
    AggregationExpression(&'a AggregationExpression),
    SortExpression(&'a SortExpression),
    IndexExpression(&'a IndexExpression),
    SliceExpression(&'a SliceExpression),
    ChainExpression(&'a ChainExpression),
    JoinExpression(&'a JoinExpression),
}

#[allow(unused_variables)]
pub trait Visitor {
    fn enter(&mut self, node: NodeRef<'_>) {}
    fn exit(&mut self, node: NodeRef<'_>) {}

    fn visit_program(&mut self, node: &Program) -> bool {
        true
    }
    fn visit_class_def(&mut self, node: &ClassDef) -> bool {
        true
    }
    fn visit_function_def(&mut self, node: &FunctionDef) -> bool {
        true
    }
    fn visit_function_declaration(&mut self, node: &FunctionDeclaration) -> bool {
        true
    }
    fn visit_expression_statement(&mut self, node: &ExpressionStatement) -> bool {
        true
    }
    fn visit_return_statement(&mut self, node: &ReturnStatement) -> bool {
        true
    }
    fn visit_assignment(&mut self, node: &Assignment) -> bool {
        true
    }
    fn visit_permission_rule(&mut self, node: &PermissionRule) -> bool {
        true
    }
    fn visit_permission_function(&mut self, node: &PermissionFunction) -> bool {
        true
    }
    fn visit_control_command(&mut self, node: &ControlCommand) -> bool {
        true
    }
    fn visit_dialogue_state(&mut self, node: &DialogueState) -> bool {
        true
    }
    fn visit_dialogue_history_item(&mut self, node: &DialogueHistoryItem) -> bool {
        true
    }
    fn visit_device_selector(&mut self, node: &DeviceSelector) -> bool {
        true
    }
    fn visit_builtin_selector(&mut self) -> bool {
        true
    }
    fn visit_input_param(&mut self, node: &InputParam) -> bool {
        true
    }
    fn visit_invocation(&mut self, node: &Invocation) -> bool {
        true
    }
    fn visit_array_value(&mut self, node: &ArrayValue) -> bool {
        true
    }
    fn visit_var_ref_value(&mut self, node: &VarRefValue) -> bool {
        true
    }
    fn visit_computation_value(&mut self, node: &ComputationValue) -> bool {
        true
    }
    fn visit_array_field_value(&mut self, node: &ArrayFieldValue) -> bool {
        true
    }
    fn visit_filter_value(&mut self, node: &FilterValue) -> bool {
        true
    }
    fn visit_undefined_value(&mut self, local: bool) -> bool {
        true
    }
    fn visit_context_ref_value(&mut self, node: &ContextRefValue) -> bool {
        true
    }
    fn visit_boolean_value(&mut self, value: bool) -> bool {
        true
    }
    fn visit_string_value(&mut self, value: &str) -> bool {
        true
    }
    fn visit_measure_value(&mut self, node: &MeasureValue) -> bool {
        true
    }
    fn visit_number_value(&mut self, value: f64) -> bool {
        true
    }
    fn visit_currency_value(&mut self, node: &CurrencyValue) -> bool {
        true
    }
    fn visit_location_value(&mut self, node: &LocationValue) -> bool {
        true
    }
    fn visit_date_value(&mut self, node: &DateValue) -> bool {
        true
    }
    fn visit_time_value(&mut self, node: &TimeValue) -> bool {
        true
    }
    fn visit_entity_value(&mut self, node: &EntityValue) -> bool {
        true
    }
    fn visit_enum_value(&mut self, value: &str) -> bool {
        true
    }
    fn visit_event_value(&mut self, name: Option<&str>) -> bool {
        true
    }
    fn visit_arg_map_value(&mut self, node: &BTreeMap<String, Type>) -> bool {
        true
    }
    fn visit_object_value(&mut self, node: &BTreeMap<String, Value>) -> bool {
        true
    }
    fn visit_and_boolean_expression(&mut self, node: &AndBooleanExpression) -> bool {
        true
    }
    fn visit_or_boolean_expression(&mut self, node: &OrBooleanExpression) -> bool {
        true
    }
    fn visit_not_boolean_expression(&mut self, node: &NotBooleanExpression) -> bool {
        true
    }
    fn visit_atom_boolean_expression(&mut self, node: &AtomBooleanExpression) -> bool {
        true
    }
    fn visit_external_boolean_expression(&mut self, node: &ExternalBooleanExpression) -> bool {
        true
    }
    fn visit_dont_care_boolean_expression(&mut self, node: &DontCareBooleanExpression) -> bool {
        true
    }
    fn visit_compute_boolean_expression(&mut self, node: &ComputeBooleanExpression) -> bool {
        true
    }
    fn visit_true_boolean_expression(&mut self) -> bool {
        true
    }
    fn visit_false_boolean_expression(&mut self) -> bool {
        true
    }
    fn visit_function_call_expression(&mut self, node: &FunctionCallExpression) -> bool {
        true
    }
    fn visit_invocation_expression(&mut self, node: &InvocationExpression) -> bool {
        true
    }
    fn visit_filter_expression(&mut self, node: &FilterExpression) -> bool {
        true
    }
    fn visit_monitor_expression(&mut self, node: &MonitorExpression) -> bool {
        true
    }
    fn visit_projection_expression(&mut self, node: &ProjectionExpression) -> bool {
        true
    }
    fn visit_projection_expression2(&mut self, node: &ProjectionExpression2) -> bool {
        true
    }
    fn visit_boolean_question_expression(&mut self, node: &BooleanQuestionExpression) -> bool {
        true
    }
    fn visit_alias_expression(&mut self, node: &AliasExpression) -> bool {
        true
    }
    fn visit_aggregation_expression(&mut self, node: &AggregationExpression) -> bool {
        true
    }
    fn visit_sort_expression(&mut self, node: &SortExpression) -> bool {
        true
    }
    fn visit_index_expression(&mut self, node: &IndexExpression) -> bool {
        true
    }
    fn visit_slice_expression(&mut self, node: &SliceExpression) -> bool {
        true
    }
    fn visit_chain_expression(&mut self, node: &ChainExpression) -> bool {
        true
    }
    fn visit_join_expression(&mut self, node: &JoinExpression) -> bool {
        true
    }
}

/// Double dispatch entry point implemented by every node
pub trait Visit {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V);
}

/// enter, visit_*, children if asked for, exit
macro_rules! visit_node {
    ($visitor:ident, $node:expr, $method:ident($($arg:expr)?), $children:block) => {{
        $visitor.enter($node);
        if $visitor.$method($($arg)?) $children
        $visitor.exit($node);
    }};
}

fn visit_all<T: Visit, V: Visitor + ?Sized>(items: &[T], visitor: &mut V) {
    for item in items {
        item.visit(visitor);
    }
}

impl Visit for Input {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Input::Program(program) => program.visit(visitor),
            Input::PermissionRule(rule) => rule.visit(visitor),
            Input::DialogueState(state) => state.visit(visitor),
            Input::ControlCommand(command) => command.visit(visitor),
        }
    }
}

impl Visit for Program {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::Program(self), visit_program(self), {
            visit_all(&self.classes, visitor);
            visit_all(&self.declarations, visitor);
            visit_all(&self.statements, visitor);
        });
    }
}

impl Visit for ClassDef {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::ClassDef(self), visit_class_def(self), {
            for function in self.queries.values().chain(self.actions.values()) {
                function.visit(visitor);
            }
        });
    }
}

impl Visit for FunctionDef {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::FunctionDef(self), visit_function_def(self), {});
    }
}

impl Visit for FunctionDeclaration {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(
            visitor,
            NodeRef::FunctionDeclaration(self),
            visit_function_declaration(self),
            {
                visit_all(&self.statements, visitor);
            }
        );
    }
}

impl Visit for Statement {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Statement::Expression(stmt) => stmt.visit(visitor),
            Statement::Return(stmt) => {
                visit_node!(visitor, NodeRef::ReturnStatement(stmt), visit_return_statement(stmt), {
                    stmt.expression.visit(visitor);
                });
            }
            Statement::Assignment(stmt) => {
                visit_node!(visitor, NodeRef::Assignment(stmt), visit_assignment(stmt), {
                    stmt.value.visit(visitor);
                });
            }
        }
    }
}

impl Visit for ExpressionStatement {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(
            visitor,
            NodeRef::ExpressionStatement(self),
            visit_expression_statement(self),
            {
                self.expression.visit(visitor);
            }
        );
    }
}

impl Visit for PermissionRule {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::PermissionRule(self), visit_permission_rule(self), {
            self.principal.visit(visitor);
            self.query.visit(visitor);
            self.action.visit(visitor);
        });
    }
}

impl Visit for PermissionFunction {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(
            visitor,
            NodeRef::PermissionFunction(self),
            visit_permission_function(self),
            {
                if let PermissionFunction::Specified(function) = self {
                    function.filter.visit(visitor);
                }
            }
        );
    }
}

impl Visit for ControlCommand {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::ControlCommand(self), visit_control_command(self), {
            if let ControlIntent::Answer(value) = &self.intent {
                value.visit(visitor);
            }
        });
    }
}

impl Visit for DialogueState {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::DialogueState(self), visit_dialogue_state(self), {
            visit_all(self.history(), visitor);
        });
    }
}

impl Visit for DialogueHistoryItem {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(
            visitor,
            NodeRef::DialogueHistoryItem(self),
            visit_dialogue_history_item(self),
            {
                self.stmt.visit(visitor);
                if let Some(results) = self.results() {
                    for item in &results.results {
                        for value in item.value.values() {
                            value.visit(visitor);
                        }
                    }
                    results.count.visit(visitor);
                    if let Some(error) = &results.error {
                        error.visit(visitor);
                    }
                }
            }
        );
    }
}

impl Visit for Selector {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Selector::Device(device) => device.visit(visitor),
            Selector::Builtin => {
                visit_node!(visitor, NodeRef::BuiltinSelector, visit_builtin_selector(), {});
            }
        }
    }
}

impl Visit for DeviceSelector {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::DeviceSelector(self), visit_device_selector(self), {
            visit_all(&self.attributes, visitor);
        });
    }
}

impl Visit for InputParam {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::InputParam(self), visit_input_param(self), {
            self.value.visit(visitor);
        });
    }
}

impl Visit for Invocation {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visit_node!(visitor, NodeRef::Invocation(self), visit_invocation(self), {
            self.selector.visit(visitor);
            visit_all(&self.in_params, visitor);
        });
    }
}

impl Visit for Value {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        let node = NodeRef::Value(self);
        visitor.enter(node);
        let descend = match self {
            Value::Array(array) => visitor.visit_array_value(array),
            Value::VarRef(var_ref) => visitor.visit_var_ref_value(var_ref),
            Value::Computation(computation) => visitor.visit_computation_value(computation),
            Value::ArrayField(field) => visitor.visit_array_field_value(field),
            Value::Filter(filter) => visitor.visit_filter_value(filter),
            Value::Undefined { local } => visitor.visit_undefined_value(*local),
            Value::ContextRef(context_ref) => visitor.visit_context_ref_value(context_ref),
            Value::Boolean(value) => visitor.visit_boolean_value(*value),
            Value::String(value) => visitor.visit_string_value(value),
            Value::Measure(measure) => visitor.visit_measure_value(measure),
            Value::Number(value) => visitor.visit_number_value(*value),
            Value::Currency(currency) => visitor.visit_currency_value(currency),
            Value::Location(location) => visitor.visit_location_value(location),
            Value::Date(date) => visitor.visit_date_value(date),
            Value::Time(time) => visitor.visit_time_value(time),
            Value::Entity(entity) => visitor.visit_entity_value(entity),
            Value::Enum(value) => visitor.visit_enum_value(value),
            Value::Event(name) => visitor.visit_event_value(name.as_deref()),
            Value::ArgMap(map) => visitor.visit_arg_map_value(map),
            Value::Object(fields) => visitor.visit_object_value(fields),
        };
        if descend {
            match self {
                Value::Array(array) => visit_all(&array.values, visitor),
                Value::Computation(computation) => visit_all(&computation.operands, visitor),
                Value::ArrayField(field) => field.value.visit(visitor),
                Value::Filter(filter) => {
                    filter.value.visit(visitor);
                    filter.filter.visit(visitor);
                }
                Value::Object(fields) => {
                    for value in fields.values() {
                        value.visit(visitor);
                    }
                }
                _ => {}
            }
        }
        visitor.exit(node);
    }
}

impl Visit for BooleanExpression {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            BooleanExpression::And(node) => {
                visit_node!(
                    visitor,
                    NodeRef::AndBooleanExpression(node),
                    visit_and_boolean_expression(node),
                    {
                        visit_all(&node.operands, visitor);
                    }
                );
            }
            BooleanExpression::Or(node) => {
                visit_node!(
                    visitor,
                    NodeRef::OrBooleanExpression(node),
                    visit_or_boolean_expression(node),
                    {
                        visit_all(&node.operands, visitor);
                    }
                );
            }
            BooleanExpression::Not(node) => {
                visit_node!(
                    visitor,
                    NodeRef::NotBooleanExpression(node),
                    visit_not_boolean_expression(node),
                    {
                        node.expr.visit(visitor);
                    }
                );
            }
            BooleanExpression::Atom(node) => {
                visit_node!(
                    visitor,
                    NodeRef::AtomBooleanExpression(node),
                    visit_atom_boolean_expression(node),
                    {
                        node.value.visit(visitor);
                    }
                );
            }
            BooleanExpression::External(node) => {
                visit_node!(
                    visitor,
                    NodeRef::ExternalBooleanExpression(node),
                    visit_external_boolean_expression(node),
                    {
                        node.selector.visit(visitor);
                        visit_all(&node.in_params, visitor);
                        node.filter.visit(visitor);
                    }
                );
            }
            BooleanExpression::DontCare(node) => {
                visit_node!(
                    visitor,
                    NodeRef::DontCareBooleanExpression(node),
                    visit_dont_care_boolean_expression(node),
                    {}
                );
            }
            BooleanExpression::Compute(node) => {
                visit_node!(
                    visitor,
                    NodeRef::ComputeBooleanExpression(node),
                    visit_compute_boolean_expression(node),
                    {
                        node.lhs.visit(visitor);
                        node.rhs.visit(visitor);
                    }
                );
            }
            BooleanExpression::True => {
                visit_node!(
                    visitor,
                    NodeRef::TrueBooleanExpression,
                    visit_true_boolean_expression(),
                    {}
                );
            }
            BooleanExpression::False => {
                visit_node!(
                    visitor,
                    NodeRef::FalseBooleanExpression,
                    visit_false_boolean_expression(),
                    {}
                );
            }
        }
    }
}

impl Visit for Expression {
    fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Expression::FunctionCall(node) => {
                visit_node!(
                    visitor,
                    NodeRef::FunctionCallExpression(node),
                    visit_function_call_expression(node),
                    {
                        visit_all(&node.in_params, visitor);
                    }
                );
            }
            Expression::Invocation(node) => {
                visit_node!(
                    visitor,
                    NodeRef::InvocationExpression(node),
                    visit_invocation_expression(node),
                    {
                        node.invocation.visit(visitor);
                    }
                );
            }
            Expression::Filter(node) => {
                visit_node!(
                    visitor,
                    NodeRef::FilterExpression(node),
                    visit_filter_expression(node),
                    {
                        node.expression.visit(visitor);
                        node.filter.visit(visitor);
                    }
                );
            }
            Expression::Monitor(node) => {
                visit_node!(
                    visitor,
                    NodeRef::MonitorExpression(node),
                    visit_monitor_expression(node),
                    {
                        node.expression.visit(visitor);
                    }
                );
            }
            Expression::Projection(node) => {
                visit_node!(
                    visitor,
                    NodeRef::ProjectionExpression(node),
                    visit_projection_expression(node),
                    {
                        node.expression.visit(visitor);
                        visit_all(&node.computations, visitor);
                    }
                );
            }
            Expression::Projection2(node) => {
                visit_node!(
                    visitor,
                    NodeRef::ProjectionExpression2(node),
                    visit_projection_expression2(node),
                    {
                        node.expression.visit(visitor);
                        for element in &node.projections {
                            if let ProjectionValue::Value(value) = &element.value {
                                value.visit(visitor);
                            }
                        }
                    }
                );
            }
            Expression::BooleanQuestion(node) => {
                visit_node!(
                    visitor,
                    NodeRef::BooleanQuestionExpression(node),
                    visit_boolean_question_expression(node),
                    {
                        node.expression.visit(visitor);
                        node.boolean_expression.visit(visitor);
                    }
                );
            }
            Expression::Alias(node) => {
                visit_node!(
                    visitor,
                    NodeRef::AliasExpression(node),
                    visit_alias_expression(node),
                    {
                        node.expression.visit(visitor);
                    }
                );
            }
            Expression::Aggregation(node) => {
                visit_node!(
                    visitor,
                    NodeRef::AggregationExpression(node),
                    visit_aggregation_expression(node),
                    {
                        node.expression.visit(visitor);
                    }
                );
            }
            Expression::Sort(node) => {
                visit_node!(
                    visitor,
                    NodeRef::SortExpression(node),
                    visit_sort_expression(node),
                    {
                        node.expression.visit(visitor);
                        node.value.visit(visitor);
                    }
                );
            }
            Expression::Index(node) => {
                visit_node!(
                    visitor,
                    NodeRef::IndexExpression(node),
                    visit_index_expression(node),
                    {
                        node.expression.visit(visitor);
                        visit_all(&node.indices, visitor);
                    }
                );
            }
            Expression::Slice(node) => {
                visit_node!(
                    visitor,
                    NodeRef::SliceExpression(node),
                    visit_slice_expression(node),
                    {
                        node.expression.visit(visitor);
                        node.base.visit(visitor);
                        node.limit.visit(visitor);
                    }
                );
            }
            Expression::Chain(node) => {
                visit_node!(
                    visitor,
                    NodeRef::ChainExpression(node),
                    visit_chain_expression(node),
                    {
                        visit_all(&node.expressions, visitor);
                    }
                );
            }
            Expression::Join(node) => {
                visit_node!(
                    visitor,
                    NodeRef::JoinExpression(node),
                    visit_join_expression(node),
                    {
                        node.lhs.visit(visitor);
                        node.rhs.visit(visitor);
                    }
                );
            }
        }
    }
}

/// Finds `$?` slots
#[derive(Default)]
struct UndefinedFinder {
    found: bool,
}

impl Visitor for UndefinedFinder {
    fn visit_undefined_value(&mut self, _local: bool) -> bool {
        self.found = true;
        false
    }
}

/// Whether `node` can run as is, i.e. has no `$?` slot left to fill
pub fn is_executable<T: Visit + ?Sized>(node: &T) -> bool {
    let mut finder = UndefinedFinder::default();
    node.visit(&mut finder);
    !finder.found
}

/// Every device function referenced by `node`, as `@kind.channel`, in visit order
pub fn referenced_functions<T: Visit + ?Sized>(node: &T) -> Vec<String> {
    struct Collector(Vec<String>);

    impl Visitor for Collector {
        fn visit_invocation(&mut self, node: &Invocation) -> bool {
            if let Selector::Device(device) = &node.selector {
                self.0.push(format!("@{}.{}", device.kind, node.channel));
            }
            true
        }

        fn visit_external_boolean_expression(&mut self, node: &ExternalBooleanExpression) -> bool {
            if let Selector::Device(device) = &node.selector {
                self.0.push(format!("@{}.{}", device.kind, node.channel));
            }
            true
        }

        fn visit_permission_function(&mut self, node: &PermissionFunction) -> bool {
            if let PermissionFunction::Specified(function) = node {
                self.0.push(format!("@{}.{}", function.kind, function.channel));
            }
            true
        }
    }

    let mut collector = Collector(Vec::new());
    node.visit(&mut collector);
    collector.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        enters: usize,
        exits: usize,
        depth: usize,
        max_depth: usize,
        skip_filters: bool,
        values: usize,
    }

    impl Visitor for Counter {
        fn enter(&mut self, node: NodeRef<'_>) {
            if let NodeRef::Value(_) = node {
                self.values += 1;
            }
            self.enters += 1;
            self.depth += 1;
            self.max_depth = self.max_depth.max(self.depth);
        }

        fn exit(&mut self, _node: NodeRef<'_>) {
            self.exits += 1;
            self.depth -= 1;
        }

        fn visit_filter_expression(&mut self, _node: &FilterExpression) -> bool {
            !self.skip_filters
        }
    }

    fn program() -> Program {
        let search = Invocation::new(
            Selector::device("com.bing"),
            "web_search",
            vec![InputParam::new("query", Value::String("rust".into()))],
        );
        let filtered = Expression::filter(
            Expression::invocation(search),
            BooleanExpression::and(vec![
                BooleanExpression::atom("title", "=~", Value::String("book".into())),
                BooleanExpression::True,
            ]),
        );
        let post = Invocation::new(
            Selector::device("com.twitter"),
            "post",
            vec![InputParam::new("status", Value::var_ref("title"))],
        );
        Program::new(vec![Statement::expression(Expression::chain(vec![
            filtered,
            Expression::invocation(post),
        ]))])
    }

    #[test]
    fn test_enter_and_exit_are_paired() {
        let mut counter = Counter::default();
        program().visit(&mut counter);
        // program, statement, chain, filter, invocation expr, invocation,
        // selector, param, value, and, atom, value, true, invocation expr,
        // invocation, selector, param, value
        assert_eq!(counter.enters, 18);
        assert_eq!(counter.enters, counter.exits);
        assert_eq!(counter.depth, 0);
        assert_eq!(counter.values, 3);
    }

    #[test]
    fn test_false_skips_children_but_exits() {
        let mut counter = Counter {
            skip_filters: true,
            ..Counter::default()
        };
        program().visit(&mut counter);
        assert_eq!(counter.enters, 9);
        assert_eq!(counter.enters, counter.exits);
        assert_eq!(counter.values, 1);
    }

    /// Records which `visit_*_value` method each value reached
    #[derive(Default)]
    struct ValueKinds(Vec<&'static str>);

    impl Visitor for ValueKinds {
        fn visit_array_value(&mut self, _node: &ArrayValue) -> bool {
            self.0.push("array");
            true
        }
        fn visit_var_ref_value(&mut self, _node: &VarRefValue) -> bool {
            self.0.push("var_ref");
            true
        }
        fn visit_computation_value(&mut self, _node: &ComputationValue) -> bool {
            self.0.push("computation");
            true
        }
        fn visit_filter_value(&mut self, _node: &FilterValue) -> bool {
            self.0.push("filter");
            true
        }
        fn visit_number_value(&mut self, _value: f64) -> bool {
            self.0.push("number");
            true
        }
        fn visit_string_value(&mut self, _value: &str) -> bool {
            self.0.push("string");
            true
        }
        fn visit_entity_value(&mut self, _node: &EntityValue) -> bool {
            self.0.push("entity");
            false
        }
        fn visit_function_def(&mut self, node: &FunctionDef) -> bool {
            self.0.push(if node.function_type == FunctionType::Action { "action" } else { "query" });
            true
        }
    }

    #[test]
    fn test_each_value_variant_has_its_own_method() {
        let value = Value::Array(ArrayValue {
            values: vec![
                Value::computation("+", vec![Value::var_ref("count"), Value::Number(1.0)]),
                Value::String("hello".into()),
                Value::Entity(EntityValue::new(Some("rust"), "tt:hashtag", None)),
            ],
            ty: None,
        });
        let mut kinds = ValueKinds::default();
        value.visit(&mut kinds);
        assert_eq!(kinds.0, vec!["array", "computation", "var_ref", "number", "string", "entity"]);

        let filtered = Value::Filter(FilterValue {
            value: Box::new(Value::var_ref("results")),
            filter: Box::new(BooleanExpression::atom("score", ">=", Value::Number(3.0))),
            ty: None,
        });
        let mut kinds = ValueKinds::default();
        filtered.visit(&mut kinds);
        assert_eq!(kinds.0, vec!["filter", "var_ref", "number"]);
    }

    #[test]
    fn test_class_functions_are_visited_queries_first() {
        let mut class = ClassDef::new("com.example");
        class.actions.insert(
            "post".into(),
            FunctionDef::new(FunctionType::Action, Some("com.example"), "post"),
        );
        class.queries.insert(
            "search".into(),
            FunctionDef::new(FunctionType::Query, Some("com.example"), "search"),
        );
        class.queries.insert(
            "get".into(),
            FunctionDef::new(FunctionType::Query, Some("com.example"), "get"),
        );

        let mut kinds = ValueKinds::default();
        class.visit(&mut kinds);
        assert_eq!(kinds.0, vec!["query", "query", "action"]);

        let mut counter = Counter::default();
        class.visit(&mut counter);
        assert_eq!(counter.enters, 4);
        assert_eq!(counter.exits, 4);
    }

    #[test]
    fn test_helpers() {
        let program = program();
        assert!(is_executable(&program));
        assert_eq!(
            referenced_functions(&program),
            vec!["@com.bing.web_search", "@com.twitter.post"]
        );

        let slot = Expression::invocation(Invocation::new(
            Selector::device("com.twitter"),
            "post",
            vec![InputParam::new("status", Value::undefined())],
        ));
        assert!(!is_executable(&slot));
        assert!(!is_executable(&Input::from(Program::new(vec![Statement::expression(slot)]))));
    }
}
