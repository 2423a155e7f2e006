//! Persistent token stream with O(1) concatenation
//!
//! A [`TokenStream`] is an immutable tree of shared nodes. Concatenating
//! streams allocates one node referencing the parts and never copies them,
//! so building the output of a deep AST costs time proportional to the
//! number of nodes. Flattening happens only when the stream is iterated.

use super::token::{ConstantToken, LayoutToken, Token};
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
enum Node {
    Token(Token),
    Concat(Vec<TokenStream>),
}

/// Immutable, cheaply clonable sequence of tokens
#[derive(Clone, Default)]
pub struct TokenStream {
    root: Option<Rc<Node>>,
}

impl TokenStream {
    /// The empty stream
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn singleton(token: Token) -> Self {
        Self {
            root: Some(Rc::new(Node::Token(token))),
        }
    }

    /// Concatenate streams; empty parts are dropped and single parts are returned as is
    pub fn concat(parts: impl IntoIterator<Item = TokenStream>) -> Self {
        let mut parts: Vec<TokenStream> = parts.into_iter().filter(|p| p.root.is_some()).collect();
        match parts.len() {
            0 => Self::new(),
            1 => parts.swap_remove(0),
            _ => Self {
                root: Some(Rc::new(Node::Concat(parts))),
            },
        }
    }

    /// Concatenate streams with `separator` between consecutive non-empty parts
    pub fn join(parts: impl IntoIterator<Item = TokenStream>, separator: TokenStream) -> Self {
        let mut out = Vec::new();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(separator.clone());
            }
            out.push(part);
        }
        Self::concat(out)
    }

    /// This stream followed by `other`
    pub fn then(self, other: impl Into<TokenStream>) -> Self {
        Self::concat([self, other.into()])
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Iterate the tokens in order without recursion
    pub fn iter(&self) -> TokenIter<'_> {
        let mut stack = Vec::new();
        if let Some(root) = &self.root {
            stack.push(Frame::Node(root));
        }
        TokenIter { stack }
    }

    /// Number of tokens, including layout tokens
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn to_vec(&self) -> Vec<Token> {
        self.iter().cloned().collect()
    }
}

/// Frees nested concatenations with an explicit stack, so dropping a stream
/// built from many `then` calls does not recurse once per level
impl Drop for TokenStream {
    fn drop(&mut self) {
        let mut pending: Vec<Rc<Node>> = self.root.take().into_iter().collect();
        while let Some(node) = pending.pop() {
            if let Ok(Node::Concat(mut parts)) = Rc::try_unwrap(node) {
                pending.extend(parts.iter_mut().filter_map(|part| part.root.take()));
            }
        }
    }
}

enum Frame<'a> {
    Node(&'a Node),
    Parts(std::slice::Iter<'a, TokenStream>),
}

/// Depth-first iterator over a [`TokenStream`]
pub struct TokenIter<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.pop()? {
                Frame::Node(Node::Token(token)) => return Some(token),
                Frame::Node(Node::Concat(parts)) => self.stack.push(Frame::Parts(parts.iter())),
                Frame::Parts(mut iter) => {
                    if let Some(part) = iter.next() {
                        self.stack.push(Frame::Parts(iter));
                        if let Some(root) = &part.root {
                            self.stack.push(Frame::Node(root));
                        }
                    }
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = TokenIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<Token> for TokenStream {
    fn from(token: Token) -> Self {
        Self::singleton(token)
    }
}

impl From<&str> for TokenStream {
    fn from(s: &str) -> Self {
        Self::singleton(Token::Literal(s.to_string()))
    }
}

impl From<String> for TokenStream {
    fn from(s: String) -> Self {
        Self::singleton(Token::Literal(s))
    }
}

impl From<&String> for TokenStream {
    fn from(s: &String) -> Self {
        Self::singleton(Token::Literal(s.clone()))
    }
}

impl From<LayoutToken> for TokenStream {
    fn from(layout: LayoutToken) -> Self {
        Self::singleton(Token::Layout(layout))
    }
}

impl From<ConstantToken> for TokenStream {
    fn from(constant: ConstantToken) -> Self {
        Self::singleton(Token::Constant(constant))
    }
}

impl FromIterator<TokenStream> for TokenStream {
    fn from_iter<I: IntoIterator<Item = TokenStream>>(iter: I) -> Self {
        Self::concat(iter)
    }
}

impl PartialEq for TokenStream {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Space-separated rendering of the non-layout tokens
impl fmt::Display for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in self.iter().filter(|t| !t.is_layout()) {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens;

    fn literals(stream: &TokenStream) -> Vec<String> {
        stream
            .iter()
            .filter_map(|t| t.as_literal().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = tokens!["a", "b"];
        let b = tokens!["c"];
        let joined = tokens![a.clone(), b, a];
        assert_eq!(literals(&joined), vec!["a", "b", "c", "a", "b"]);
        assert_eq!(joined.len(), 5);
    }

    #[test]
    fn test_empty_parts_are_dropped() {
        let stream = TokenStream::concat([TokenStream::new(), "x".into(), TokenStream::new()]);
        assert_eq!(literals(&stream), vec!["x"]);
        assert!(TokenStream::concat(Vec::new()).is_empty());
    }

    #[test]
    fn test_join() {
        let parts = vec![tokens!["a"], TokenStream::new(), tokens!["b"], tokens!["c"]];
        let stream = TokenStream::join(parts, ",".into());
        assert_eq!(stream.to_string(), "a , b , c");
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let mut stream = TokenStream::new();
        for i in 0..100_000 {
            stream = stream.then(format!("t{}", i));
        }
        assert_eq!(stream.len(), 100_000);
        assert_eq!(stream.iter().next().and_then(|t| t.as_literal()), Some("t0"));
        drop(stream);
    }

    #[test]
    fn test_drop_keeps_shared_parts() {
        let shared = tokens!["a", "b"];
        let mut stream = shared.clone();
        for i in 0..100_000 {
            stream = stream.then(format!("t{}", i));
        }
        let branch = stream.clone().then("end");
        drop(stream);
        assert_eq!(branch.len(), 100_003);
        drop(branch);
        assert_eq!(literals(&shared), vec!["a", "b"]);
    }

    #[test]
    fn test_persistence() {
        let base = tokens!["a"];
        let extended = base.clone().then("b");
        assert_eq!(literals(&base), vec!["a"]);
        assert_eq!(literals(&extended), vec!["a", "b"]);
    }
}
