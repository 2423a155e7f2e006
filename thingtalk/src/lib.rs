// Internal modules
pub mod ast;
pub mod config;
pub mod entities;
#[macro_use]
pub mod logging;
pub mod serialize;
pub mod tokens;
pub mod typecheck;
pub mod types;
pub mod utils;
pub mod visitor;

// Re-export key types for library consumers
pub use ast::{AstError, Expression, Input, Program, Statement, Value};
pub use config::{ConfigError, RuntimeConfig};
pub use entities::{AbstractEntityRetriever, EntityError, EntityRetriever, SequentialEntityAllocator};
pub use serialize::{
    nn_serialize, prettyprint, serialize, SerializeError, SerializeOptions, Serialized, SyntaxType,
};
pub use tokens::TokenStream;
pub use typecheck::{MemorySchemaRetriever, SchemaRetriever, TypeChecker, TypeError};
pub use types::Type;
pub use visitor::{Visit, Visitor};
