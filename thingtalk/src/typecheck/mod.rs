//! Type checking
//!
//! [`TypeChecker::typecheck`] walks an [`Input`], resolves every function
//! reference to its signature through a [`SchemaRetriever`], checks
//! parameters and filters against those signatures and annotates the tree
//! in place: `schema` on invocations and expressions, `overload` on
//! operators and `ty` on variable references and computed values.
//!
//! Schema lookups are the only suspension points. The walk itself is
//! depth-first and sequential, so a pass over a given tree always issues
//! the same lookups in the same order.

pub mod builtin;
pub mod error;
pub mod operators;
pub mod retriever;
pub mod scope;

pub use builtin::{builtin_function, is_builtin};
pub use error::{SchemaError, TypeError, TypeResult};
pub use operators::{resolve_overload, Overload};
pub use retriever::{CachingSchemaRetriever, FunctionKind, MemorySchemaRetriever, SchemaRetriever};
pub use scope::Scope;

use crate::ast::values::format_number;
use crate::ast::{
    ArgDirection, ArgumentDef, BooleanExpression, ClassDef, ControlCommand, ControlIntent,
    DeviceSelector, DialogueState, Expression, FunctionDeclaration, FunctionDef, FunctionType,
    Input, InputParam, PermissionFunction, PermissionRule, Program, ProjectionValue, Selector,
    Statement, Value,
};
use crate::config::compile_time::typecheck::{MAX_CHAIN_LENGTH, MAX_DEPTH};
use crate::config::runtime::{RuntimeConfig, TypecheckPreferences};
use crate::logging::codes;
use crate::types::{is_assignable, Type, TypeScope};
use crate::utils::SourceRange;
use futures::future::{BoxFuture, FutureExt};
use operators::{aggregation_operators, filter_operators, scalar_operators};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Typechecker bound to a schema retriever
#[derive(Clone)]
pub struct TypeChecker {
    retriever: Arc<dyn SchemaRetriever>,
    lenient: bool,
    log_schema_lookups: bool,
}

impl TypeChecker {
    pub fn new(retriever: Arc<dyn SchemaRetriever>) -> Self {
        Self {
            retriever,
            lenient: false,
            log_schema_lookups: false,
        }
    }

    pub fn from_config(retriever: Arc<dyn SchemaRetriever>, config: &RuntimeConfig) -> Self {
        Self::new(retriever).with_preferences(&config.typecheck)
    }

    pub fn with_preferences(mut self, preferences: &TypecheckPreferences) -> Self {
        self.lenient = preferences.lenient_assignability;
        self.log_schema_lookups = preferences.log_schema_lookups;
        self
    }

    /// Accept String where an Entity is expected, and the reverse
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Typecheck `input`, returning it annotated
    pub async fn typecheck(&self, mut input: Input) -> TypeResult<Input> {
        crate::log_info!("Starting typecheck", "kind" => input.kind());
        let started = Instant::now();

        let pass = Pass::new(self);
        let result = match &mut input {
            Input::Program(program) => pass.check_program(program).await,
            Input::PermissionRule(rule) => pass.check_permission_rule(rule).await,
            Input::DialogueState(state) => pass.check_dialogue_state(state).await,
            Input::ControlCommand(command) => pass.check_control_command(command).await,
        };

        if crate::logging::config::log_performance_events() {
            crate::log_debug!(
                "Typecheck timing",
                "kind" => input.kind(),
                "elapsed_us" => started.elapsed().as_micros()
            );
        }

        match result {
            Ok(()) => {
                crate::log_success!(
                    codes::success::TYPECHECK_COMPLETE,
                    "Typecheck complete",
                    "kind" => input.kind()
                );
                Ok(input)
            }
            Err(err) => {
                crate::log_error!(
                    err.error_code(),
                    "Typecheck failed",
                    range = err.range(),
                    "error_type" => err.error_type(),
                    "error" => &err
                );
                Err(err)
            }
        }
    }

    pub async fn typecheck_program(&self, program: Program) -> TypeResult<Program> {
        match self.typecheck(Input::Program(program)).await? {
            Input::Program(program) => Ok(program),
            other => Err(TypeError::invalid_value(
                &format!("expected a program, found a {}", other.kind()),
                None,
            )),
        }
    }
}

/// State of one typechecking pass: the checker plus classes declared inline
struct Pass<'c> {
    checker: &'c TypeChecker,
    classes: HashMap<String, ClassDef>,
}

impl<'c> Pass<'c> {
    fn new(checker: &'c TypeChecker) -> Self {
        Self {
            checker,
            classes: HashMap::new(),
        }
    }

    fn lenient(&self) -> bool {
        self.checker.lenient
    }

    fn assignable(&self, ty: &Type, to: &Type) -> bool {
        is_assignable(ty, to, &mut TypeScope::new(), self.lenient())
    }

    async fn check_program(mut self, program: &mut Program) -> TypeResult<()> {
        for class in &program.classes {
            self.classes.insert(class.kind.clone(), class.clone());
        }

        let mut scope = Scope::new();
        for declaration in program.declarations.iter_mut() {
            let schema = self.check_declaration(declaration, &scope).await?;
            scope.add_function(&declaration.name, schema);
        }
        for statement in program.statements.iter_mut() {
            self.check_statement(statement, &mut scope).await?;
        }

        crate::log_debug!(
            "Program typechecked",
            "classes" => program.classes.len(),
            "declarations" => program.declarations.len(),
            "statements" => program.statements.len()
        );
        Ok(())
    }

    async fn check_declaration(
        &self,
        declaration: &mut FunctionDeclaration,
        outer: &Scope,
    ) -> TypeResult<Arc<FunctionDef>> {
        let mut scope = outer.clone();
        for arg in &declaration.args {
            scope.add_var(&arg.name, arg.ty.clone());
        }

        let mut function_type = FunctionType::Query;
        let mut outputs = Vec::new();
        for statement in declaration.statements.iter_mut() {
            if let Some(schema) = self.check_statement(statement, &mut scope).await? {
                if function_type != FunctionType::Action {
                    function_type = schema.function_type;
                }
                outputs = schema.out_args().cloned().collect();
            }
        }

        let mut schema = FunctionDef::new(function_type, None, &declaration.name);
        schema.args = declaration.args.clone();
        let schema = Arc::new(schema.add_arguments(outputs));
        declaration.schema = Some(schema.clone());
        Ok(schema)
    }

    /// Returns the schema of the statement's expression, `None` for assignments
    async fn check_statement(
        &self,
        statement: &mut Statement,
        scope: &mut Scope,
    ) -> TypeResult<Option<Arc<FunctionDef>>> {
        match statement {
            Statement::Expression(stmt) => {
                Ok(Some(self.check_expression(&mut stmt.expression, scope, 0).await?))
            }
            Statement::Return(stmt) => {
                Ok(Some(self.check_expression(&mut stmt.expression, scope, 0).await?))
            }
            Statement::Assignment(assignment) => {
                let schema = self.check_expression(&mut assignment.value, scope, 0).await?;
                let mut callable = FunctionDef::clone(&schema);
                callable.class = None;
                callable.name = assignment.name.clone();
                callable.args.retain(|arg| !arg.is_input());
                scope.add_function(&assignment.name, Arc::new(callable));
                Ok(None)
            }
        }
    }

    fn check_expression<'s>(
        &'s self,
        expression: &'s mut Expression,
        scope: &'s Scope,
        depth: usize,
    ) -> BoxFuture<'s, TypeResult<Arc<FunctionDef>>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(TypeError::DepthLimitExceeded { limit: MAX_DEPTH });
            }

            let schema = match expression {
                Expression::FunctionCall(call) => {
                    let schema = scope
                        .get_function(&call.name)
                        .cloned()
                        .or_else(|| builtin_function(&call.name))
                        .ok_or_else(|| TypeError::FunctionNotFound {
                            name: call.name.clone(),
                            range: call.range,
                        })?;
                    self.check_input_params(&schema, &mut call.in_params, scope, call.range, depth)
                        .await?;
                    schema
                }

                Expression::Invocation(node) => {
                    let invocation = &mut node.invocation;
                    let schema = self
                        .resolve_function(
                            &mut invocation.selector,
                            &invocation.channel,
                            FunctionKind::Both,
                            invocation.range,
                        )
                        .await?;
                    self.check_input_params(
                        &schema,
                        &mut invocation.in_params,
                        scope,
                        invocation.range,
                        depth,
                    )
                    .await?;
                    invocation.schema = Some(schema.clone());
                    schema
                }

                Expression::Filter(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    reject_action("filter", &schema, node.range)?;
                    self.check_filter(&mut node.filter, &schema, scope, depth + 1).await?;
                    schema
                }

                Expression::Monitor(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    if schema.function_type != FunctionType::Query {
                        return Err(TypeError::invalid_function_type(
                            "monitor",
                            schema.function_type,
                            node.range,
                        ));
                    }
                    if !schema.is_monitorable {
                        return Err(TypeError::NotMonitorable {
                            function: schema.qualified_name(),
                            range: node.range,
                        });
                    }
                    for arg in node.args.iter().flatten() {
                        if !schema.out_args().any(|out| &out.name == arg) {
                            return Err(TypeError::unknown_argument(
                                &schema.qualified_name(),
                                arg,
                                node.range,
                            ));
                        }
                    }
                    Arc::new(schema.with_function_type(FunctionType::Stream))
                }

                Expression::Projection(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    reject_action("projection", &schema, node.range)?;
                    for arg in &node.args {
                        if !schema.has_argument(arg) {
                            return Err(TypeError::unknown_argument(
                                &schema.qualified_name(),
                                arg,
                                node.range,
                            ));
                        }
                    }
                    let inner = scope.with_arguments(&schema);
                    let mut computed = Vec::new();
                    for (i, value) in node.computations.iter_mut().enumerate() {
                        let ty = self.check_value(value, &inner, depth + 1).await?;
                        let name = node
                            .aliases
                            .get(i)
                            .cloned()
                            .flatten()
                            .unwrap_or_else(|| output_name(value));
                        computed.push(ArgumentDef::new(&name, ArgDirection::Out, ty));
                    }
                    Arc::new(schema.filter_outputs(&node.args).add_arguments(computed))
                }

                Expression::Projection2(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    reject_action("projection", &schema, node.range)?;
                    let range = node.range;
                    let inner = scope.with_arguments(&schema);
                    let mut kept = Vec::new();
                    let mut extra = Vec::new();
                    for element in node.projections.iter_mut() {
                        match &mut element.value {
                            ProjectionValue::Path(path) => {
                                let path = path.as_str();
                                let ty = path_type(&schema, path).ok_or_else(|| {
                                    TypeError::unknown_argument(&schema.qualified_name(), path, range)
                                })?;
                                if let Some(expected) = element.types.first() {
                                    if !element.types.iter().any(|allowed| self.assignable(&ty, allowed)) {
                                        return Err(TypeError::invalid_argument_type(path, expected, &ty, range));
                                    }
                                }
                                match &element.alias {
                                    Some(alias) => extra.push(ArgumentDef::new(alias, ArgDirection::Out, ty)),
                                    None if !path.contains('.') => kept.push(path.to_string()),
                                    None => extra.push(ArgumentDef::new(path, ArgDirection::Out, ty)),
                                }
                            }
                            ProjectionValue::Value(value) => {
                                let ty = self.check_value(value, &inner, depth + 1).await?;
                                let name = element.alias.clone().unwrap_or_else(|| output_name(value));
                                extra.push(ArgumentDef::new(&name, ArgDirection::Out, ty));
                            }
                        }
                    }
                    Arc::new(schema.filter_outputs(&kept).add_arguments(extra))
                }

                Expression::BooleanQuestion(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    reject_action("boolean question", &schema, node.range)?;
                    self.check_filter(&mut node.boolean_expression, &schema, scope, depth + 1)
                        .await?;
                    Arc::new(schema.filter_outputs(&[]).add_arguments([ArgumentDef::new(
                        "__answer",
                        ArgDirection::Out,
                        Type::Boolean,
                    )]))
                }

                Expression::Alias(node) => {
                    self.check_expression(&mut node.expression, scope, depth + 1).await?
                }

                Expression::Aggregation(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    require_list("aggregation", &schema, node.range)?;
                    let field_type = if node.field == "*" {
                        Type::Any
                    } else {
                        schema
                            .out_args()
                            .find(|arg| arg.name == node.field)
                            .map(|arg| arg.ty.clone())
                            .ok_or_else(|| {
                                TypeError::unknown_argument(&schema.qualified_name(), &node.field, node.range)
                            })?
                    };
                    if node.field == "*" && node.operator != "count" {
                        return Err(TypeError::invalid_operator(&node.operator, &[field_type], node.range));
                    }
                    let overload = resolve_overload(
                        aggregation_operators(),
                        &node.operator,
                        std::slice::from_ref(&field_type),
                        self.lenient(),
                    )
                    .ok_or_else(|| TypeError::invalid_operator(&node.operator, &[field_type.clone()], node.range))?;
                    let name = if node.operator == "count" {
                        "count".to_string()
                    } else {
                        node.field.clone()
                    };
                    node.overload = Some(overload.to_types());
                    Arc::new(
                        schema
                            .filter_outputs(&[])
                            .add_arguments([ArgumentDef::new(&name, ArgDirection::Out, overload.result)])
                            .with_list(false),
                    )
                }

                Expression::Sort(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    require_list("sort", &schema, node.range)?;
                    let inner = scope.with_arguments(&schema);
                    let ty = self.check_value(&mut node.value, &inner, depth + 1).await?;
                    if !ty.is_comparable() && ty != Type::Any {
                        return Err(TypeError::invalid_value(
                            &format!("cannot sort by a value of type {}", ty),
                            node.range,
                        ));
                    }
                    schema
                }

                Expression::Index(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    require_list("index", &schema, node.range)?;
                    for index in node.indices.iter_mut() {
                        let ty = self.check_value(index, scope, depth + 1).await?;
                        if !self.assignable(&ty, &Type::Number)
                            && !self.assignable(&ty, &Type::array(Type::Number))
                        {
                            return Err(TypeError::invalid_argument_type("index", &Type::Number, &ty, node.range));
                        }
                    }
                    match node.indices.as_slice() {
                        [Value::Number(_)] => Arc::new(FunctionDef::clone(&schema).with_list(false)),
                        _ => schema,
                    }
                }

                Expression::Slice(node) => {
                    let schema = self.check_expression(&mut node.expression, scope, depth + 1).await?;
                    require_list("slice", &schema, node.range)?;
                    for (name, value) in [("base", &mut node.base), ("limit", &mut node.limit)] {
                        let ty = self.check_value(value, scope, depth + 1).await?;
                        if !self.assignable(&ty, &Type::Number) {
                            return Err(TypeError::invalid_argument_type(name, &Type::Number, &ty, node.range));
                        }
                    }
                    schema
                }

                Expression::Chain(node) => {
                    let length = node.expressions.len();
                    if length > MAX_CHAIN_LENGTH {
                        return Err(TypeError::ChainTooLong {
                            length,
                            limit: MAX_CHAIN_LENGTH,
                            range: node.range,
                        });
                    }

                    let mut local = scope.clone();
                    let mut first_type = None;
                    let mut last = None;
                    for (i, element) in node.expressions.iter_mut().enumerate() {
                        let schema = self.check_expression(element, &local, depth + 1).await?;
                        let misplaced = match schema.function_type {
                            FunctionType::Stream => i > 0,
                            FunctionType::Action => i + 1 < length,
                            FunctionType::Query => false,
                        };
                        if misplaced {
                            return Err(TypeError::invalid_function_type(
                                "chain position",
                                schema.function_type,
                                element.range(),
                            ));
                        }
                        local.add_outputs(&schema);
                        if first_type.is_none() {
                            first_type = Some(schema.function_type);
                        }
                        last = Some(schema);
                    }

                    let last = last.ok_or_else(|| TypeError::invalid_value("empty chain", node.range))?;
                    if first_type == Some(FunctionType::Stream) && last.function_type == FunctionType::Query {
                        Arc::new(last.with_function_type(FunctionType::Stream))
                    } else {
                        last
                    }
                }

                Expression::Join(node) => {
                    let lhs = self.check_expression(&mut node.lhs, scope, depth + 1).await?;
                    reject_action("join", &lhs, node.range)?;
                    let mut inner = scope.clone();
                    inner.add_outputs(&lhs);
                    let rhs = self.check_expression(&mut node.rhs, &inner, depth + 1).await?;
                    if rhs.function_type != FunctionType::Query {
                        return Err(TypeError::invalid_function_type("join", rhs.function_type, node.range));
                    }
                    let function_type = match lhs.function_type {
                        FunctionType::Stream => FunctionType::Stream,
                        _ => FunctionType::Query,
                    };
                    let mut joined = lhs
                        .with_function_type(function_type)
                        .add_arguments(rhs.out_args().cloned());
                    joined.is_list = lhs.is_list || rhs.is_list;
                    joined.is_monitorable = lhs.is_monitorable && rhs.is_monitorable;
                    Arc::new(joined)
                }
            };

            expression.set_schema(schema.clone());
            Ok(schema)
        }
        .boxed()
    }

    /// Signature of `@kind.channel` or of a builtin; classes declared in
    /// the program shadow the retriever
    async fn resolve_function(
        &self,
        selector: &mut Selector,
        channel: &str,
        function_kind: FunctionKind,
        range: Option<SourceRange>,
    ) -> TypeResult<Arc<FunctionDef>> {
        let device = match selector {
            Selector::Builtin => {
                return builtin_function(channel).ok_or_else(|| TypeError::FunctionNotFound {
                    name: channel.to_string(),
                    range,
                })
            }
            Selector::Device(device) => device,
        };
        normalize_selector(device)?;

        if let Some(def) = self
            .classes
            .get(&device.kind)
            .and_then(|class| class.get_function(channel, function_kind.function_type()))
        {
            return Ok(Arc::new(def.clone()));
        }

        if self.checker.log_schema_lookups {
            crate::log_debug!(
                "Looking up schema",
                "kind" => &device.kind,
                "channel" => channel,
                "function_kind" => function_kind.as_str()
            );
        }
        let schema = self
            .checker
            .retriever
            .get_schema(&device.kind, channel, function_kind)
            .await?;
        crate::log_success!(
            codes::success::SCHEMA_RESOLVED,
            "Schema resolved",
            "function" => schema.qualified_name()
        );
        Ok(schema)
    }

    async fn check_input_params(
        &self,
        schema: &FunctionDef,
        params: &mut [InputParam],
        scope: &Scope,
        range: Option<SourceRange>,
        depth: usize,
    ) -> TypeResult<()> {
        let function = schema.qualified_name();
        let mut seen = HashSet::new();
        for param in params.iter_mut() {
            let arg = schema
                .get_arg(&param.name)
                .filter(|arg| arg.is_input())
                .ok_or_else(|| TypeError::unknown_argument(&function, &param.name, param.range))?;
            if !seen.insert(param.name.clone()) {
                return Err(TypeError::DuplicateArgument {
                    function,
                    name: param.name.clone(),
                    range: param.range,
                });
            }
            let ty = self.check_value(&mut param.value, scope, depth + 1).await?;
            if !self.assignable(&ty, &arg.ty) {
                return Err(TypeError::invalid_argument_type(&param.name, &arg.ty, &ty, param.range));
            }
        }

        for arg in schema.in_args() {
            if seen.contains(&arg.name) {
                continue;
            }
            let required = arg.is_required()
                || arg
                    .required_if
                    .iter()
                    .any(|condition| condition_holds(condition, params));
            if required {
                return Err(TypeError::MissingRequiredArgument {
                    function,
                    name: arg.name.clone(),
                    range,
                });
            }
        }

        for group in &schema.require_either {
            if !group.iter().any(|name| seen.contains(name)) {
                return Err(TypeError::RequireEither {
                    function,
                    names: group.join(", "),
                    range,
                });
            }
        }
        Ok(())
    }

    fn check_filter<'s>(
        &'s self,
        filter: &'s mut BooleanExpression,
        schema: &'s FunctionDef,
        scope: &'s Scope,
        depth: usize,
    ) -> BoxFuture<'s, TypeResult<()>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(TypeError::DepthLimitExceeded { limit: MAX_DEPTH });
            }

            match filter {
                BooleanExpression::True | BooleanExpression::False => Ok(()),

                BooleanExpression::And(node) => {
                    for operand in node.operands.iter_mut() {
                        self.check_filter(operand, schema, scope, depth + 1).await?;
                    }
                    Ok(())
                }
                BooleanExpression::Or(node) => {
                    for operand in node.operands.iter_mut() {
                        self.check_filter(operand, schema, scope, depth + 1).await?;
                    }
                    Ok(())
                }
                BooleanExpression::Not(node) => {
                    self.check_filter(&mut node.expr, schema, scope, depth + 1).await
                }

                BooleanExpression::DontCare(node) => {
                    if schema.has_argument(&node.name) {
                        Ok(())
                    } else {
                        Err(TypeError::unknown_argument(&schema.qualified_name(), &node.name, node.range))
                    }
                }

                BooleanExpression::Atom(atom) => {
                    let param_type = schema
                        .get_arg(&atom.name)
                        .map(|arg| arg.ty.clone())
                        .or_else(|| scope.get_var(&atom.name).cloned())
                        .ok_or_else(|| {
                            TypeError::unknown_argument(&schema.qualified_name(), &atom.name, atom.range)
                        })?;
                    let inner = scope.with_arguments(schema);
                    let value_type = self.check_value(&mut atom.value, &inner, depth + 1).await?;
                    let args = [param_type, value_type];
                    let overload = resolve_overload(filter_operators(), &atom.operator, &args, self.lenient())
                        .ok_or_else(|| TypeError::invalid_operator(&atom.operator, &args, atom.range))?;
                    atom.overload = Some(overload.to_types());
                    Ok(())
                }

                BooleanExpression::Compute(node) => {
                    let inner = scope.with_arguments(schema);
                    let lhs = self.check_value(&mut node.lhs, &inner, depth + 1).await?;
                    let rhs = self.check_value(&mut node.rhs, &inner, depth + 1).await?;
                    let args = [lhs, rhs];
                    let overload = resolve_overload(filter_operators(), &node.operator, &args, self.lenient())
                        .ok_or_else(|| TypeError::invalid_operator(&node.operator, &args, node.range))?;
                    node.overload = Some(overload.to_types());
                    Ok(())
                }

                BooleanExpression::External(node) => {
                    let external = self
                        .resolve_function(&mut node.selector, &node.channel, FunctionKind::Query, node.range)
                        .await?;
                    reject_action("external filter", &external, node.range)?;
                    self.check_input_params(&external, &mut node.in_params, scope, node.range, depth + 1)
                        .await?;
                    self.check_filter(&mut node.filter, &external, scope, depth + 1).await?;
                    node.schema = Some(external);
                    Ok(())
                }
            }
        }
        .boxed()
    }

    fn check_value<'s>(
        &'s self,
        value: &'s mut Value,
        scope: &'s Scope,
        depth: usize,
    ) -> BoxFuture<'s, TypeResult<Type>> {
        async move {
            if depth > MAX_DEPTH {
                return Err(TypeError::DepthLimitExceeded { limit: MAX_DEPTH });
            }

            match value {
                Value::VarRef(var) => {
                    let ty = scope
                        .get_var(&var.name)
                        .cloned()
                        .ok_or_else(|| TypeError::UndeclaredVariable {
                            name: var.name.clone(),
                            range: None,
                        })?;
                    var.ty = Some(ty.clone());
                    Ok(ty)
                }

                Value::Computation(computation) => {
                    let mut types = Vec::with_capacity(computation.operands.len());
                    for operand in computation.operands.iter_mut() {
                        types.push(self.check_value(operand, scope, depth + 1).await?);
                    }
                    let overload = resolve_overload(scalar_operators(), &computation.op, &types, self.lenient())
                        .ok_or_else(|| TypeError::invalid_operator(&computation.op, &types, None))?;
                    computation.overload = Some(overload.to_types());
                    computation.ty = Some(overload.result.clone());
                    Ok(overload.result)
                }

                Value::ArrayField(field) => {
                    let ty = self.check_value(&mut field.value, scope, depth + 1).await?;
                    let field_type = compound_fields(&ty)
                        .and_then(|fields| fields.get(&field.field).cloned())
                        .ok_or_else(|| {
                            TypeError::invalid_value(&format!("{} has no field {}", ty, field.field), None)
                        })?;
                    let result = Type::array(field_type);
                    field.ty = Some(result.clone());
                    Ok(result)
                }

                Value::Filter(filtered) => {
                    let ty = self.check_value(&mut filtered.value, scope, depth + 1).await?;
                    let fields = compound_fields(&ty)
                        .cloned()
                        .ok_or_else(|| TypeError::invalid_value(&format!("cannot filter a value of type {}", ty), None))?;
                    let element = fields
                        .into_iter()
                        .fold(FunctionDef::new(FunctionType::Query, None, "element"), |def, (name, ty)| {
                            def.with_arg(ArgumentDef::new(&name, ArgDirection::Out, ty))
                        });
                    self.check_filter(&mut filtered.filter, &element, scope, depth + 1).await?;
                    filtered.ty = Some(ty.clone());
                    Ok(ty)
                }

                Value::Array(array) => {
                    let mut elem: Option<Type> = None;
                    for item in array.values.iter_mut() {
                        let ty = self.check_value(item, scope, depth + 1).await?;
                        if let Some(expected) = &elem {
                            if !self.assignable(&ty, expected) {
                                return Err(TypeError::invalid_value(
                                    &format!("array mixes {} and {}", expected, ty),
                                    None,
                                ));
                            }
                        } else {
                            elem = Some(ty);
                        }
                    }
                    let ty = match &array.ty {
                        Some(ty) => ty.clone(),
                        None => Type::array(elem.unwrap_or(Type::Any)),
                    };
                    array.ty = Some(ty.clone());
                    Ok(ty)
                }

                Value::Object(fields) => {
                    let mut types = BTreeMap::new();
                    for (name, field) in fields.iter_mut() {
                        types.insert(name.clone(), self.check_value(field, scope, depth + 1).await?);
                    }
                    Ok(Type::Compound(types))
                }

                other => Ok(other.get_type()),
            }
        }
        .boxed()
    }

    async fn check_permission_rule(&self, rule: &mut PermissionRule) -> TypeResult<()> {
        let principal = FunctionDef::new(FunctionType::Query, None, "principal").with_arg(ArgumentDef::new(
            "source",
            ArgDirection::Out,
            Type::entity("tt:contact"),
        ));
        let mut scope = Scope::new();
        self.check_filter(&mut rule.principal, &principal, &scope, 0).await?;
        if let Some(query) = self
            .check_permission_function(&mut rule.query, FunctionKind::Query, &scope)
            .await?
        {
            scope.add_outputs(&query);
        }
        self.check_permission_function(&mut rule.action, FunctionKind::Action, &scope)
            .await?;
        Ok(())
    }

    async fn check_permission_function(
        &self,
        function: &mut PermissionFunction,
        function_kind: FunctionKind,
        scope: &Scope,
    ) -> TypeResult<Option<Arc<FunctionDef>>> {
        let PermissionFunction::Specified(specified) = function else {
            return Ok(None);
        };
        let mut selector = Selector::device(&specified.kind);
        let schema = self
            .resolve_function(&mut selector, &specified.channel, function_kind, specified.range)
            .await?;
        let expected = match function_kind {
            FunctionKind::Action => FunctionType::Action,
            _ => FunctionType::Query,
        };
        if (schema.function_type == FunctionType::Action) != (expected == FunctionType::Action) {
            return Err(TypeError::invalid_function_type(
                "permission rule",
                schema.function_type,
                specified.range,
            ));
        }
        self.check_filter(&mut specified.filter, &schema, scope, 0).await?;
        specified.schema = Some(schema.clone());
        Ok(Some(schema))
    }

    async fn check_dialogue_state(&self, state: &mut DialogueState) -> TypeResult<()> {
        let mut history = state.update_history(std::mem::take);
        let result = self.check_history(&mut history).await;
        state.update_history(|items| *items = history);
        result
    }

    async fn check_history(&self, history: &mut [crate::ast::DialogueHistoryItem]) -> TypeResult<()> {
        for item in history.iter_mut() {
            let scope = Scope::new();
            let schema = self.check_expression(&mut item.stmt.expression, &scope, 0).await?;
            let Some(results) = item.results() else {
                continue;
            };
            if !self.assignable(&results.count.get_type(), &Type::Number) {
                return Err(TypeError::invalid_argument_type(
                    "count",
                    &Type::Number,
                    &results.count.get_type(),
                    results.range,
                ));
            }
            for row in &results.results {
                for name in row.value.keys() {
                    if !schema.has_argument(name) {
                        return Err(TypeError::unknown_argument(&schema.qualified_name(), name, row.range));
                    }
                }
            }
        }
        Ok(())
    }

    async fn check_control_command(&self, command: &mut ControlCommand) -> TypeResult<()> {
        if let ControlIntent::Answer(value) = &mut command.intent {
            self.check_value(value, &Scope::new(), 0).await?;
        }
        Ok(())
    }
}

fn reject_action(operation: &str, schema: &FunctionDef, range: Option<SourceRange>) -> TypeResult<()> {
    if schema.function_type == FunctionType::Action {
        return Err(TypeError::invalid_function_type(operation, FunctionType::Action, range));
    }
    Ok(())
}

fn require_list(operation: &str, schema: &FunctionDef, range: Option<SourceRange>) -> TypeResult<()> {
    reject_action(operation, schema, range)?;
    if !schema.is_list {
        return Err(TypeError::NotList {
            function: schema.qualified_name(),
            range,
        });
    }
    Ok(())
}

/// `id`, `all` and `name` are the only device attributes; the first two
/// move into the selector's own fields
fn normalize_selector(device: &mut DeviceSelector) -> TypeResult<()> {
    let mut kept = Vec::new();
    for attribute in std::mem::take(&mut device.attributes) {
        let name = attribute.name.clone();
        match name.as_str() {
            "id" => match &attribute.value {
                Value::String(id) => device.id = Some(id.clone()),
                Value::Entity(entity) if entity.value.is_some() => device.id = entity.value.clone(),
                _ => return Err(TypeError::invalid_selector("id must be a string", attribute.range)),
            },
            "all" => match attribute.value {
                Value::Boolean(all) => device.all = all,
                _ => return Err(TypeError::invalid_selector("all must be a boolean", attribute.range)),
            },
            "name" => match attribute.value {
                Value::String(_) | Value::Undefined { .. } | Value::VarRef(_) => kept.push(attribute),
                _ => return Err(TypeError::invalid_selector("name must be a string", attribute.range)),
            },
            other => {
                return Err(TypeError::invalid_selector(
                    &format!("unknown attribute {}", other),
                    attribute.range,
                ))
            }
        }
    }
    device.attributes = kept;
    Ok(())
}

/// `param=value` holds when the parameter is passed with that constant
fn condition_holds(condition: &str, params: &[InputParam]) -> bool {
    let Some((name, expected)) = condition.split_once('=') else {
        return false;
    };
    params.iter().any(|param| {
        param.name == name
            && match &param.value {
                Value::Enum(entry) | Value::String(entry) => entry == expected,
                Value::Boolean(b) => b.to_string() == expected,
                Value::Number(n) => format_number(*n) == expected,
                _ => false,
            }
    })
}

/// Type of `field` or `field.sub.sub` within the outputs and inputs of `schema`
fn path_type(schema: &FunctionDef, path: &str) -> Option<Type> {
    let mut segments = path.split('.');
    let mut ty = schema.get_arg(segments.next()?)?.ty.clone();
    for segment in segments {
        ty = match ty {
            Type::Compound(fields) => fields.get(segment)?.clone(),
            _ => return None,
        };
    }
    Some(ty)
}

fn compound_fields(ty: &Type) -> Option<&BTreeMap<String, Type>> {
    match ty.elem()? {
        Type::Compound(fields) => Some(fields),
        _ => None,
    }
}

/// Output name for a computed projection without an alias
fn output_name(value: &Value) -> String {
    match value {
        Value::Computation(computation) => computation.op.clone(),
        Value::VarRef(var) => var.name.clone(),
        Value::ArrayField(field) => field.field.clone(),
        _ => "result".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ConfirmationState, DialogueHistoryItem, ExpressionStatement, Invocation, LocationValue,
        ResultItem, ResultList, SortDirection,
    };
    use assert_matches::assert_matches;

    fn weather() -> FunctionDef {
        FunctionDef::new(FunctionType::Query, Some("com.weather"), "current")
            .with_arg(ArgumentDef::new("location", ArgDirection::InReq, Type::Location))
            .with_arg(ArgumentDef::new("temperature", ArgDirection::Out, Type::measure("C")))
            .with_arg(ArgumentDef::new("status", ArgDirection::Out, Type::String))
            .with_monitorable(true)
    }

    fn search() -> FunctionDef {
        FunctionDef::new(FunctionType::Query, Some("com.twitter"), "search")
            .with_arg(ArgumentDef::new("query", ArgDirection::InOpt, Type::String))
            .with_arg(ArgumentDef::new("text", ArgDirection::Out, Type::String))
            .with_arg(ArgumentDef::new(
                "hashtags",
                ArgDirection::Out,
                Type::array(Type::entity("tt:hashtag")),
            ))
            .with_arg(ArgumentDef::new("retweets", ArgDirection::Out, Type::Number))
            .with_list(true)
    }

    fn post() -> FunctionDef {
        FunctionDef::new(FunctionType::Action, Some("com.twitter"), "post")
            .with_arg(ArgumentDef::new("status", ArgDirection::InReq, Type::String))
    }

    fn send() -> FunctionDef {
        let mut def = FunctionDef::new(FunctionType::Action, Some("com.example"), "send")
            .with_arg(ArgumentDef::new(
                "mode",
                ArgDirection::InOpt,
                Type::Enum(Some(vec!["text".into(), "photo".into()])),
            ))
            .with_arg(ArgumentDef::new("message", ArgDirection::InOpt, Type::String))
            .with_arg(
                ArgumentDef::new("picture", ArgDirection::InOpt, Type::entity("tt:picture"))
                    .with_required_if(&["mode=photo"]),
            );
        def.require_either = vec![vec!["message".into(), "picture".into()]];
        def
    }

    fn checker() -> TypeChecker {
        let retriever = MemorySchemaRetriever::new()
            .with_function(weather())
            .with_function(search())
            .with_function(post())
            .with_function(send());
        TypeChecker::new(Arc::new(retriever))
    }

    fn call(kind: &str, channel: &str, params: Vec<InputParam>) -> Expression {
        Expression::invocation(Invocation::new(Selector::device(kind), channel, params))
    }

    fn current_weather() -> Expression {
        call(
            "com.weather",
            "current",
            vec![InputParam::new(
                "location",
                Value::Location(LocationValue::Relative("home".into())),
            )],
        )
    }

    fn program(expression: Expression) -> Program {
        Program::new(vec![Statement::expression(expression)])
    }

    async fn check(expression: Expression) -> TypeResult<Expression> {
        let program = checker().typecheck_program(program(expression)).await?;
        match program.statements.into_iter().next() {
            Some(Statement::Expression(stmt)) => Ok(stmt.expression),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_monitor_filter_chain() {
        let when = Expression::monitor(
            Expression::filter(
                current_weather(),
                BooleanExpression::atom("temperature", ">=", Value::measure(70.0, "F")),
            ),
            None,
        );
        let then = call(
            "com.twitter",
            "post",
            vec![InputParam::new("status", Value::var_ref("status"))],
        );
        let checked = check(Expression::chain(vec![when, then])).await.unwrap();

        assert_eq!(checked.function_type(), Some(FunctionType::Action));
        let Expression::Chain(chain) = &checked else {
            panic!("expected a chain");
        };
        assert_eq!(chain.expressions[0].function_type(), Some(FunctionType::Stream));

        let Expression::Monitor(monitor) = &chain.expressions[0] else {
            panic!("expected a monitor");
        };
        let Expression::Filter(filter) = monitor.expression.as_ref() else {
            panic!("expected a filter");
        };
        assert_matches!(
            &filter.filter,
            BooleanExpression::Atom(atom) if atom.overload == Some(vec![
                Type::measure("C"),
                Type::measure("C"),
                Type::Boolean,
            ])
        );

        let Expression::Invocation(action) = &chain.expressions[1] else {
            panic!("expected an invocation");
        };
        assert_eq!(
            action.invocation.schema.as_ref().map(|s| s.qualified_name()),
            Some("@com.twitter.post".to_string())
        );
        assert_matches!(
            &action.invocation.in_params[0].value,
            Value::VarRef(var) if var.ty == Some(Type::String)
        );
    }

    #[tokio::test]
    async fn test_parameter_errors() {
        let unknown = call(
            "com.twitter",
            "post",
            vec![
                InputParam::new("status", Value::String("hi".into())),
                InputParam::new("mood", Value::String("happy".into())),
            ],
        );
        assert_matches!(check(unknown).await, Err(TypeError::UnknownArgument { name, .. }) if name == "mood");

        let duplicate = call(
            "com.twitter",
            "post",
            vec![
                InputParam::new("status", Value::String("a".into())),
                InputParam::new("status", Value::String("b".into())),
            ],
        );
        assert_matches!(check(duplicate).await, Err(TypeError::DuplicateArgument { .. }));

        let missing = call("com.twitter", "post", vec![]);
        assert_matches!(
            check(missing).await,
            Err(TypeError::MissingRequiredArgument { name, .. }) if name == "status"
        );

        let wrong_type = call(
            "com.twitter",
            "post",
            vec![InputParam::new("status", Value::Number(3.0))],
        );
        assert_matches!(check(wrong_type).await, Err(TypeError::InvalidArgumentType { .. }));

        let undefined = call("com.twitter", "post", vec![InputParam::new("status", Value::undefined())]);
        assert!(check(undefined).await.is_ok());
    }

    #[tokio::test]
    async fn test_conditional_requirements() {
        let neither = call("com.example", "send", vec![]);
        assert_matches!(check(neither).await, Err(TypeError::RequireEither { .. }));

        let photo = call(
            "com.example",
            "send",
            vec![
                InputParam::new("mode", Value::Enum("photo".into())),
                InputParam::new("message", Value::String("look".into())),
            ],
        );
        assert_matches!(
            check(photo).await,
            Err(TypeError::MissingRequiredArgument { name, .. }) if name == "picture"
        );

        let text = call(
            "com.example",
            "send",
            vec![
                InputParam::new("mode", Value::Enum("text".into())),
                InputParam::new("message", Value::String("hello".into())),
            ],
        );
        assert!(check(text).await.is_ok());
    }

    #[tokio::test]
    async fn test_filter_errors() {
        let mismatch = Expression::filter(
            current_weather(),
            BooleanExpression::atom("status", ">=", Value::Number(20.0)),
        );
        assert_matches!(check(mismatch).await, Err(TypeError::InvalidOperator { .. }));

        let unknown = Expression::filter(
            current_weather(),
            BooleanExpression::atom("humidity", "==", Value::Number(20.0)),
        );
        assert_matches!(check(unknown).await, Err(TypeError::UnknownArgument { .. }));

        let on_action = Expression::filter(
            call("com.twitter", "post", vec![InputParam::new("status", Value::undefined())]),
            BooleanExpression::True,
        );
        assert_matches!(check(on_action).await, Err(TypeError::InvalidFunctionType { .. }));

        let contains = Expression::filter(
            call("com.twitter", "search", vec![]),
            BooleanExpression::atom(
                "hashtags",
                "contains",
                Value::entity("rust", "tt:hashtag", None),
            ),
        );
        assert!(check(contains).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_operations() {
        let not_monitorable = Expression::monitor(call("com.twitter", "search", vec![]), None);
        assert_matches!(check(not_monitorable).await, Err(TypeError::NotMonitorable { .. }));

        let not_list = Expression::aggregation(current_weather(), "temperature", "max");
        assert_matches!(check(not_list).await, Err(TypeError::NotList { .. }));

        let count = check(Expression::aggregation(call("com.twitter", "search", vec![]), "*", "count"))
            .await
            .unwrap();
        let schema = count.schema().unwrap();
        assert_eq!(schema.get_arg("count").map(|a| &a.ty), Some(&Type::Number));
        assert!(!schema.is_list);

        let sorted = Expression::index(
            Expression::sort(
                call("com.twitter", "search", vec![]),
                Value::var_ref("retweets"),
                SortDirection::Desc,
            ),
            vec![Value::Number(1.0)],
        );
        let sorted = check(sorted).await.unwrap();
        assert!(!sorted.schema().unwrap().is_list);

        let projected = check(Expression::projection(
            call("com.twitter", "search", vec![]),
            vec!["text".into()],
        ))
        .await
        .unwrap();
        let names: Vec<_> = projected.schema().unwrap().out_args().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["text"]);
    }

    #[tokio::test]
    async fn test_scope_and_selectors() {
        let undeclared = call(
            "com.twitter",
            "post",
            vec![InputParam::new("status", Value::var_ref("text"))],
        );
        assert_matches!(check(undeclared).await, Err(TypeError::UndeclaredVariable { name, .. }) if name == "text");

        let mut selector = DeviceSelector::new("com.twitter")
            .with_attribute(InputParam::new("id", Value::String("twitter-foo".into())));
        let with_id = Expression::invocation(Invocation::new(
            Selector::Device(selector.clone()),
            "search",
            vec![],
        ));
        let checked = check(with_id).await.unwrap();
        let Expression::Invocation(node) = &checked else {
            panic!("expected an invocation");
        };
        assert_matches!(
            &node.invocation.selector,
            Selector::Device(device) if device.id.as_deref() == Some("twitter-foo") && device.attributes.is_empty()
        );

        selector = selector.with_attribute(InputParam::new("color", Value::String("red".into())));
        let bad = Expression::invocation(Invocation::new(Selector::Device(selector), "search", vec![]));
        assert_matches!(check(bad).await, Err(TypeError::InvalidSelector { .. }));

        let missing = call("com.example", "missing", vec![]);
        assert_matches!(check(missing).await, Err(TypeError::Schema(SchemaError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_builtins_assignments_and_declarations() {
        let timer = Expression::function_call(
            "timer",
            vec![
                InputParam::new("base", Value::Date(crate::ast::DateValue::Now)),
                InputParam::new("interval", Value::measure(1.0, "h")),
            ],
        );
        let notify = Expression::invocation(Invocation::new(Selector::Builtin, "notify", vec![]));
        let checked = check(Expression::chain(vec![timer, notify])).await.unwrap();
        assert_eq!(checked.function_type(), Some(FunctionType::Action));

        let mut program = Program::new(vec![
            Statement::Assignment(crate::ast::Assignment {
                range: None,
                name: "popular".into(),
                value: call("com.twitter", "search", vec![]),
            }),
            Statement::expression(Expression::filter(
                Expression::function_call("popular", vec![]),
                BooleanExpression::atom("retweets", ">=", Value::Number(100.0)),
            )),
        ]);
        program.declarations.push(FunctionDeclaration::new(
            "tweet",
            vec![ArgumentDef::new("message", ArgDirection::InReq, Type::String)],
            vec![Statement::expression(call(
                "com.twitter",
                "post",
                vec![InputParam::new("status", Value::var_ref("message"))],
            ))],
        ));
        program.statements.push(Statement::expression(Expression::function_call(
            "tweet",
            vec![InputParam::new("message", Value::String("hello".into()))],
        )));

        let program = checker().typecheck_program(program).await.unwrap();
        let declared = program.declarations[0].schema.as_ref().unwrap();
        assert_eq!(declared.function_type, FunctionType::Action);
        assert!(declared.get_arg("message").unwrap().is_required());

        let unknown = Expression::function_call("nothing", vec![]);
        assert_matches!(check(unknown).await, Err(TypeError::FunctionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_chain_limits() {
        let long = Expression::chain((0..=MAX_CHAIN_LENGTH).map(|_| current_weather()).collect());
        assert_matches!(check(long).await, Err(TypeError::ChainTooLong { .. }));

        let action_first = Expression::chain(vec![
            call("com.twitter", "post", vec![InputParam::new("status", Value::undefined())]),
            current_weather(),
        ]);
        assert_matches!(check(action_first).await, Err(TypeError::InvalidFunctionType { .. }));
    }

    #[tokio::test]
    async fn test_local_class_shadows_retriever() {
        let class = ClassDef::new("com.weather").with_function(
            FunctionDef::new(FunctionType::Query, None, "current")
                .with_arg(ArgumentDef::new("wind", ArgDirection::Out, Type::measure("mps"))),
        );
        let mut program = program(Expression::invocation(Invocation::new(
            Selector::device("com.weather"),
            "current",
            vec![],
        )));
        program.classes.push(class);
        let program = checker().typecheck_program(program).await.unwrap();
        let Statement::Expression(stmt) = &program.statements[0] else {
            panic!("expected an expression statement");
        };
        assert!(stmt.expression.schema().unwrap().has_argument("wind"));
    }

    #[tokio::test]
    async fn test_permission_rule_and_dialogue() {
        let rule = PermissionRule::new(
            BooleanExpression::True,
            PermissionFunction::specified(
                "com.twitter",
                "search",
                BooleanExpression::atom("text", "=~", Value::String("rust".into())),
            ),
            PermissionFunction::Builtin,
        );
        let checked = checker().typecheck(Input::from(rule)).await.unwrap();
        let Input::PermissionRule(rule) = checked else {
            panic!("expected a permission rule");
        };
        assert_matches!(&rule.query, PermissionFunction::Specified(f) if f.schema.is_some());

        let wrong_side = PermissionRule::new(
            BooleanExpression::True,
            PermissionFunction::Builtin,
            PermissionFunction::specified("com.twitter", "search", BooleanExpression::True),
        );
        assert!(checker().typecheck(Input::from(wrong_side)).await.is_err());

        let mut row = ResultItem::default();
        row.value.insert("text".into(), Value::String("hello".into()));
        let item = DialogueHistoryItem::new(
            ExpressionStatement::new(call("com.twitter", "search", vec![])),
            Some(ResultList::new(vec![row], Value::Number(1.0), false, None)),
            ConfirmationState::Confirmed,
        )
        .unwrap();
        let state = DialogueState::new("org.thingpedia.dialogue.transaction", "execute", None, vec![item]);
        let checked = checker().typecheck(Input::from(state)).await.unwrap();
        let Input::DialogueState(state) = checked else {
            panic!("expected a dialogue state");
        };
        assert!(state.history()[0].stmt.expression.schema().is_some());
        assert!(state.current().is_some());
    }
}
