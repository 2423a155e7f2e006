//! Schema retrieval
//!
//! The typechecker never knows where signatures live. It asks a
//! [`SchemaRetriever`], which may read a local file, a remote catalog or,
//! in tests, a handful of hand-written definitions.

use super::error::SchemaError;
use crate::ast::{ClassDef, FunctionDef, FunctionType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Which side of a class a lookup is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Query,
    Action,
    /// Queries first, then actions
    Both,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::Query => "query",
            FunctionKind::Action => "action",
            FunctionKind::Both => "both",
        }
    }

    pub(crate) fn function_type(&self) -> Option<FunctionType> {
        match self {
            FunctionKind::Query => Some(FunctionType::Query),
            FunctionKind::Action => Some(FunctionType::Action),
            FunctionKind::Both => None,
        }
    }
}

#[async_trait]
pub trait SchemaRetriever: Send + Sync {
    /// Signature of `@kind.channel`
    async fn get_schema(
        &self,
        kind: &str,
        channel: &str,
        function_kind: FunctionKind,
    ) -> Result<Arc<FunctionDef>, SchemaError>;
}

/// Signatures held in memory, keyed by class
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaRetriever {
    classes: HashMap<String, ClassDef>,
}

impl MemorySchemaRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of function definitions; each must name its class
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let functions: Vec<FunctionDef> = serde_json::from_str(json)?;
        let mut retriever = Self::new();
        for function in functions {
            if function.class.is_none() {
                return Err(SchemaError::InvalidSchema {
                    kind: function.name.clone(),
                    message: "function has no class".to_string(),
                });
            }
            retriever.add_function(function);
        }
        crate::log_debug!("Loaded schemas", "classes" => retriever.classes.len());
        Ok(retriever)
    }

    pub fn add_function(&mut self, function: FunctionDef) {
        let kind = function.class.clone().unwrap_or_default();
        let class = self
            .classes
            .remove(&kind)
            .unwrap_or_else(|| ClassDef::new(&kind));
        self.classes.insert(kind, class.with_function(function));
    }

    pub fn with_function(mut self, function: FunctionDef) -> Self {
        self.add_function(function);
        self
    }

    pub fn add_class(&mut self, class: ClassDef) {
        self.classes.insert(class.kind.clone(), class);
    }

    pub fn lookup(&self, kind: &str, channel: &str, function_kind: FunctionKind) -> Option<&FunctionDef> {
        self.classes
            .get(kind)?
            .get_function(channel, function_kind.function_type())
    }
}

#[async_trait]
impl SchemaRetriever for MemorySchemaRetriever {
    async fn get_schema(
        &self,
        kind: &str,
        channel: &str,
        function_kind: FunctionKind,
    ) -> Result<Arc<FunctionDef>, SchemaError> {
        self.lookup(kind, channel, function_kind)
            .map(|def| Arc::new(def.clone()))
            .ok_or_else(|| SchemaError::NotFound {
                kind: kind.to_string(),
                channel: channel.to_string(),
            })
    }
}

type CacheKey = (String, String, FunctionKind);

/// Memoizes another retriever; failed lookups are not cached
pub struct CachingSchemaRetriever<R> {
    inner: R,
    cache: Mutex<HashMap<CacheKey, Arc<FunctionDef>>>,
}

impl<R: SchemaRetriever> CachingSchemaRetriever<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn get_cached(&self, key: &CacheKey) -> Option<Arc<FunctionDef>> {
        self.cache.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl<R: SchemaRetriever> SchemaRetriever for CachingSchemaRetriever<R> {
    async fn get_schema(
        &self,
        kind: &str,
        channel: &str,
        function_kind: FunctionKind,
    ) -> Result<Arc<FunctionDef>, SchemaError> {
        let key = (kind.to_string(), channel.to_string(), function_kind);
        if let Some(schema) = self.get_cached(&key) {
            return Ok(schema);
        }
        let schema = self.inner.get_schema(kind, channel, function_kind).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, schema.clone());
        }
        Ok(schema)
    }
}
