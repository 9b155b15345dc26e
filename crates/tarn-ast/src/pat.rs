//! Pattern nodes.

use rowan::TextRange;

use crate::expr::Literal;
use crate::symbol::Symbol;

/// A pattern, as written on the left-hand side of an equation, a lambda
/// parameter, or a `let` binding.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    /// `_`
    Wildcard { span: TextRange },
    /// A binding occurrence of a name.
    Var { name: String, span: TextRange },
    Literal { value: Literal, span: TextRange },
    Tuple { items: Vec<Pattern>, span: TextRange },
    /// Record-style constructor pattern: `Point { x = a, y = b }`.
    Record {
        constructor: Symbol,
        fields: Vec<FieldPattern>,
        span: TextRange,
    },
    /// Positional constructor pattern: `Pair a b`. Carried through so the
    /// checker can reject it with a diagnostic; positional structural
    /// matching is not supported.
    Constructor {
        constructor: Symbol,
        args: Vec<Pattern>,
        span: TextRange,
    },
}

/// One field of a record pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPattern {
    pub name: String,
    pub pattern: Pattern,
    pub span: TextRange,
}

impl Pattern {
    pub fn span(&self) -> TextRange {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Var { span, .. }
            | Pattern::Literal { span, .. }
            | Pattern::Tuple { span, .. }
            | Pattern::Record { span, .. }
            | Pattern::Constructor { span, .. } => *span,
        }
    }

    pub fn var(name: impl Into<String>, span: TextRange) -> Pattern {
        Pattern::Var {
            name: name.into(),
            span,
        }
    }

    pub fn wildcard(span: TextRange) -> Pattern {
        Pattern::Wildcard { span }
    }
}
