//! Operator precedence used to decide parenthesization in `to_source()`

use crate::tokens;
use crate::tokens::TokenStream;

/// Binding strength of a construct, from loosest to tightest.
///
/// A child is wrapped in parentheses exactly when its priority is lower
/// than the priority its parent requires at that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyntaxPriority {
    Chain,
    Join,
    Or,
    And,
    Comp,
    Add,
    Mul,
    Exp,
    Not,
    Filter,
    /// Projections, aliases and array fields
    Projection,
    Index,
    Primary,
}

impl SyntaxPriority {
    /// The next tighter level, saturating at `Primary`
    pub fn tighter(self) -> Self {
        use SyntaxPriority::*;
        match self {
            Chain => Join,
            Join => Or,
            Or => And,
            And => Comp,
            Comp => Add,
            Add => Mul,
            Mul => Exp,
            Exp => Not,
            Not => Filter,
            Filter => Projection,
            Projection => Index,
            Index | Primary => Primary,
        }
    }
}

pub fn add_parens(required: SyntaxPriority, actual: SyntaxPriority, source: TokenStream) -> TokenStream {
    if actual < required {
        tokens!["(", source, ")"]
    } else {
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(SyntaxPriority::Chain < SyntaxPriority::Join);
        assert!(SyntaxPriority::Filter < SyntaxPriority::Projection);
        assert!(SyntaxPriority::Index < SyntaxPriority::Primary);
        assert_eq!(SyntaxPriority::Primary.tighter(), SyntaxPriority::Primary);
    }

    #[test]
    fn test_add_parens() {
        let wrapped = add_parens(SyntaxPriority::Filter, SyntaxPriority::Chain, "x".into());
        assert_eq!(wrapped.to_string(), "( x )");
        let bare = add_parens(SyntaxPriority::Filter, SyntaxPriority::Filter, "x".into());
        assert_eq!(bare.to_string(), "x");
    }
}
