//! Source location tracking for AST nodes
//!
//! Parsers attach a [`SourceRange`] to every container node they build. All
//! components of a location are optional: a parser working from a token array
//! knows the token index but not the byte offset, while a textual parser knows
//! the offset, line and column but not the token index.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single position in the source, text- or token-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Character offset from start of input (0-based)
    pub offset: Option<usize>,
    /// Line number (1-based)
    pub line: Option<u32>,
    /// Column number (1-based)
    pub column: Option<u32>,
    /// Index of the token in a tokenized input
    pub token: Option<usize>,
}

impl SourceLocation {
    /// Location in surface text
    pub fn text(offset: usize, line: u32, column: u32) -> Self {
        Self {
            offset: Some(offset),
            line: Some(line),
            column: Some(column),
            token: None,
        }
    }

    /// Location in a token array
    pub fn token(index: usize) -> Self {
        Self {
            token: Some(index),
            ..Self::default()
        }
    }

    /// A location is well formed when line and column are either both
    /// present and 1-based, or both absent
    pub fn is_well_formed(&self) -> bool {
        match (self.line, self.column) {
            (Some(line), Some(column)) => line >= 1 && column >= 1,
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column, self.token) {
            (Some(line), Some(column), _) => write!(f, "{}:{}", line, column),
            (_, _, Some(token)) => write!(f, "token {}", token),
            _ => match self.offset {
                Some(offset) => write!(f, "offset {}", offset),
                None => write!(f, "<unknown>"),
            },
        }
    }
}

/// A range of source from start (inclusive) to end (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceRange {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        debug_assert!(
            start.is_well_formed() && end.is_well_formed(),
            "Source range endpoints must be well formed"
        );
        Self { start, end }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start.is_well_formed() && self.end.is_well_formed()
    }

    /// Merge two ranges into one covering both (by offset, falling back to token index)
    pub fn merge(self, other: Self) -> Self {
        let key = |loc: &SourceLocation| loc.offset.or(loc.token);
        let start = match (key(&self.start), key(&other.start)) {
            (Some(a), Some(b)) if b < a => other.start,
            (None, Some(_)) => other.start,
            _ => self.start,
        };
        let end = match (key(&self.end), key(&other.end)) {
            (Some(a), Some(b)) if b > a => other.end,
            (None, Some(_)) => other.end,
            _ => self.end,
        };
        Self { start, end }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_well_formed() {
        assert!(SourceLocation::text(0, 1, 1).is_well_formed());
        assert!(SourceLocation::token(3).is_well_formed());
        assert!(SourceLocation::default().is_well_formed());

        let broken = SourceLocation {
            line: Some(1),
            ..SourceLocation::default()
        };
        assert!(!broken.is_well_formed());
    }

    #[test]
    fn test_range_merge() {
        let a = SourceRange::new(SourceLocation::text(4, 1, 5), SourceLocation::text(8, 1, 9));
        let b = SourceRange::new(SourceLocation::text(0, 1, 1), SourceLocation::text(6, 1, 7));
        let merged = a.merge(b);
        assert_eq!(merged.start.offset, Some(0));
        assert_eq!(merged.end.offset, Some(8));
    }

    #[test]
    fn test_display() {
        let range = SourceRange::new(SourceLocation::text(0, 2, 3), SourceLocation::token(7));
        assert_eq!(range.to_string(), "2:3-token 7");
    }
}
