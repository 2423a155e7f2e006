//! Lexical scope of a typechecking pass

use crate::ast::FunctionDef;
use crate::types::Type;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Names visible at a point of the program.
///
/// Variables are output parameters of earlier chain elements and the
/// arguments of the enclosing declaration; functions are declarations and
/// `let` assignments, callable as `name()`. Nested scopes are clones, so
/// additions never leak outwards.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: BTreeMap<String, Type>,
    functions: BTreeMap<String, Arc<FunctionDef>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_var(&self, name: &str) -> Option<&Type> {
        self.vars.get(name)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn add_var(&mut self, name: &str, ty: Type) {
        self.vars.insert(name.to_string(), ty);
    }

    /// Output parameters of `schema`
    pub fn add_outputs(&mut self, schema: &FunctionDef) {
        for arg in schema.out_args() {
            self.add_var(&arg.name, arg.ty.clone());
        }
    }

    /// Every parameter of `schema`, inputs included
    pub fn add_arguments(&mut self, schema: &FunctionDef) {
        for arg in &schema.args {
            self.add_var(&arg.name, arg.ty.clone());
        }
    }

    /// Copy of this scope with the parameters of `schema` added
    pub fn with_arguments(&self, schema: &FunctionDef) -> Self {
        let mut scope = self.clone();
        scope.add_arguments(schema);
        scope
    }

    pub fn get_function(&self, name: &str) -> Option<&Arc<FunctionDef>> {
        self.functions.get(name)
    }

    pub fn add_function(&mut self, name: &str, schema: Arc<FunctionDef>) {
        self.functions.insert(name.to_string(), schema);
    }
}
