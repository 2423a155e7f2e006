//! Token streams produced by `to_source()`
//!
//! Every AST node renders itself as a [`TokenStream`]: a persistent,
//! structurally shared sequence of [`Token`]s. A token is a literal piece of
//! source, a layout directive consumed by the pretty printer, or a typed
//! constant whose surface form is decided later by the serializer (quoted
//! text for humans, numbered entity placeholders for the neural syntax).

pub mod token;
pub mod token_stream;

pub use token::{ConstantKind, ConstantToken, LayoutToken, Token};
pub use token_stream::{TokenIter, TokenStream};

/// Build a [`TokenStream`] from pieces convertible into one
#[macro_export]
macro_rules! tokens {
    () => {
        $crate::tokens::TokenStream::new()
    };
    ($($part:expr),+ $(,)?) => {
        $crate::tokens::TokenStream::concat(vec![$($crate::tokens::TokenStream::from($part)),+])
    };
}
