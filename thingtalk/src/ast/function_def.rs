//! Function signatures ("schemas") resolved by the typechecker
//!
//! A [`FunctionDef`] is attached by reference (`Arc`) to every invocation
//! site that resolves to it, so a single signature is shared read-only
//! across clones of the tree.

use crate::tokens::{LayoutToken, TokenStream};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Classification of a callable function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Stream,
    Query,
    Action,
}

impl FunctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionType::Stream => "stream",
            FunctionType::Query => "query",
            FunctionType::Action => "action",
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument direction: required input, optional input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgDirection {
    InReq,
    InOpt,
    Out,
}

impl ArgDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgDirection::InReq => "in req",
            ArgDirection::InOpt => "in opt",
            ArgDirection::Out => "out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDef {
    pub name: String,
    pub direction: ArgDirection,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub unique: bool,
    /// Conditions `param=value` under which this optional input becomes required
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_if: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

impl ArgumentDef {
    pub fn new(name: &str, direction: ArgDirection, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            direction,
            ty,
            unique: false,
            required_if: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn is_input(&self) -> bool {
        !matches!(self.direction, ArgDirection::Out)
    }

    pub fn is_required(&self) -> bool {
        matches!(self.direction, ArgDirection::InReq)
    }

    pub fn with_required_if(mut self, conditions: &[&str]) -> Self {
        self.required_if = conditions.iter().map(|c| c.to_string()).collect();
        self
    }

    /// `in req name : Type`
    pub fn to_source(&self) -> TokenStream {
        let direction = self
            .direction
            .as_str()
            .split(' ')
            .map(TokenStream::from);
        TokenStream::concat(direction.chain([
            TokenStream::from(self.name.as_str()),
            TokenStream::from(":"),
            TokenStream::from(self.ty.to_string()),
        ]))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub function_type: FunctionType,
    /// Class the function belongs to, `None` for builtins and declarations
    #[serde(default)]
    pub class: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgumentDef>,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_monitorable: bool,
    /// Groups of optional inputs; at least one of each group must be given
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_either: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, serde_json::Value>,
}

impl FunctionDef {
    pub fn new(function_type: FunctionType, class: Option<&str>, name: &str) -> Self {
        Self {
            function_type,
            class: class.map(str::to_string),
            name: name.to_string(),
            args: Vec::new(),
            is_list: false,
            is_monitorable: false,
            require_either: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, arg: ArgumentDef) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_list(mut self, is_list: bool) -> Self {
        self.is_list = is_list;
        self
    }

    pub fn with_monitorable(mut self, is_monitorable: bool) -> Self {
        self.is_monitorable = is_monitorable;
        self
    }

    pub fn get_arg(&self, name: &str) -> Option<&ArgumentDef> {
        self.args.iter().find(|arg| arg.name == name)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.get_arg(name).is_some()
    }

    pub fn in_args(&self) -> impl Iterator<Item = &ArgumentDef> {
        self.args.iter().filter(|arg| arg.is_input())
    }

    pub fn out_args(&self) -> impl Iterator<Item = &ArgumentDef> {
        self.args.iter().filter(|arg| !arg.is_input())
    }

    /// Fully qualified name, `@class.name` or bare `name`
    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(class) => format!("@{}.{}", class, self.name),
            None => self.name.clone(),
        }
    }

    /// Copy of this signature with a different classification
    pub fn with_function_type(&self, function_type: FunctionType) -> Self {
        let mut clone = self.clone();
        clone.function_type = function_type;
        clone
    }

    /// Copy of this signature keeping inputs plus the named outputs, in the given order
    pub fn filter_outputs(&self, names: &[String]) -> Self {
        let mut clone = self.clone();
        let mut args: Vec<ArgumentDef> = self.in_args().cloned().collect();
        for name in names {
            if let Some(arg) = self.out_args().find(|arg| &arg.name == name) {
                args.push(arg.clone());
            }
        }
        clone.args = args;
        clone
    }

    /// Copy of this signature with extra arguments appended, replacing same-named ones
    pub fn add_arguments(&self, extra: impl IntoIterator<Item = ArgumentDef>) -> Self {
        let mut clone = self.clone();
        for arg in extra {
            clone.args.retain(|existing| existing.name != arg.name);
            clone.args.push(arg);
        }
        clone
    }

    /// Class body declaration: `monitorable list query name(in req a : T, out b : U);`
    pub fn to_source(&self) -> TokenStream {
        let mut parts = Vec::new();
        if self.is_monitorable {
            parts.push(TokenStream::from("monitorable"));
        }
        if self.is_list {
            parts.push(TokenStream::from("list"));
        }
        parts.push(TokenStream::from(self.function_type.as_str()));
        parts.push(TokenStream::from(self.name.as_str()));
        parts.push(TokenStream::from("("));
        let args = self.args.iter().map(ArgumentDef::to_source);
        parts.push(TokenStream::join(args, TokenStream::from(",")));
        parts.push(TokenStream::from(")"));
        if !self.require_either.is_empty() {
            let groups = serde_json::to_string(&self.require_either).unwrap_or_default();
            parts.push(TokenStream::from(LayoutToken::Newline));
            parts.push(TokenStream::from(format!("#[require_either={}]", groups)));
        }
        for (key, value) in &self.annotations {
            parts.push(TokenStream::from(LayoutToken::Newline));
            parts.push(TokenStream::from(format!("#[{}={}]", key, value)));
        }
        parts.push(TokenStream::from(";"));
        TokenStream::concat(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather() -> FunctionDef {
        FunctionDef::new(FunctionType::Query, Some("com.weather"), "current")
            .with_arg(ArgumentDef::new("location", ArgDirection::InReq, Type::Location))
            .with_arg(ArgumentDef::new("temperature", ArgDirection::Out, Type::measure("C")))
            .with_arg(ArgumentDef::new("status", ArgDirection::Out, Type::String))
            .with_monitorable(true)
    }

    #[test]
    fn test_argument_queries() {
        let def = weather();
        assert_eq!(def.in_args().count(), 1);
        assert_eq!(def.out_args().count(), 2);
        assert!(def.get_arg("temperature").is_some());
        assert!(def.get_arg("humidity").is_none());
        assert_eq!(def.qualified_name(), "@com.weather.current");
    }

    #[test]
    fn test_filter_outputs_keeps_inputs() {
        let projected = weather().filter_outputs(&["status".to_string()]);
        let names: Vec<_> = projected.args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["location", "status"]);
    }

    #[test]
    fn test_declaration_source() {
        let source = weather().to_source().to_string();
        assert_eq!(
            source,
            "monitorable query current ( in req location : Location , out temperature : Measure(C) , out status : String ) ;"
        );
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "function_type": "action",
            "class": "com.twitter",
            "name": "post",
            "args": [
                { "name": "status", "direction": "in_req", "type": "String" },
                { "name": "picture", "direction": "in_opt", "type": "Entity(tt:picture)",
                  "required_if": ["kind=photo"] }
            ],
            "require_either": [["status", "picture"]]
        }"#;
        let def: FunctionDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.function_type, FunctionType::Action);
        assert_eq!(def.args[1].ty, Type::entity("tt:picture"));
        assert_eq!(def.args[1].required_if, vec!["kind=photo".to_string()]);
        assert_eq!(def.require_either.len(), 1);
    }
}
