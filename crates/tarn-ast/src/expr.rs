//! Expression nodes.

use std::fmt;

use rowan::TextRange;

use crate::pat::Pattern;
use crate::symbol::Symbol;
use crate::ScopeId;

/// A literal value.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "{value:?}"),
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
        }
    }
}

/// An expression. Application is curried: `f x y` arrives as
/// `Apply(Apply(f, x), y)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        span: TextRange,
    },
    /// A reference to a value. Bare until the qualification pass has run.
    Var {
        symbol: Symbol,
        span: TextRange,
    },
    Apply {
        function: Box<Expr>,
        argument: Box<Expr>,
        span: TextRange,
    },
    /// A single-parameter function. Multi-parameter surface lambdas arrive
    /// as nested `Lambda` nodes.
    Lambda {
        param: Pattern,
        body: Box<Expr>,
        scope: Option<ScopeId>,
        span: TextRange,
    },
    Let {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
        scope: Option<ScopeId>,
        span: TextRange,
    },
    /// Sibling pattern equations of one definition, consolidated into a
    /// single function by the precedence layer. Every clause has the same
    /// number of patterns.
    Clauses {
        clauses: Vec<Clause>,
        scope: Option<ScopeId>,
        span: TextRange,
    },
}

/// One binding inside a `let` expression.
#[derive(Clone, Debug, PartialEq)]
pub struct LetBinding {
    pub name: String,
    pub value: Expr,
    pub span: TextRange,
}

/// One equation of a consolidated definition: its parameter patterns and the
/// body they guard.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub patterns: Vec<Pattern>,
    pub body: Expr,
    pub scope: Option<ScopeId>,
    pub span: TextRange,
}

impl Expr {
    pub fn span(&self) -> TextRange {
        match self {
            Expr::Literal { span, .. }
            | Expr::Var { span, .. }
            | Expr::Apply { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::Let { span, .. }
            | Expr::Clauses { span, .. } => *span,
        }
    }

    pub fn int(value: i64, span: TextRange) -> Expr {
        Expr::Literal {
            value: Literal::Int(value),
            span,
        }
    }

    pub fn float(value: f64, span: TextRange) -> Expr {
        Expr::Literal {
            value: Literal::Float(value),
            span,
        }
    }

    pub fn string(value: impl Into<String>, span: TextRange) -> Expr {
        Expr::Literal {
            value: Literal::String(value.into()),
            span,
        }
    }

    pub fn boolean(value: bool, span: TextRange) -> Expr {
        Expr::Literal {
            value: Literal::Bool(value),
            span,
        }
    }

    pub fn var(symbol: Symbol, span: TextRange) -> Expr {
        Expr::Var { symbol, span }
    }

    pub fn apply(function: Expr, argument: Expr, span: TextRange) -> Expr {
        Expr::Apply {
            function: Box::new(function),
            argument: Box::new(argument),
            span,
        }
    }

    /// Apply `function` to several arguments, folding into curried form.
    pub fn call(function: Expr, arguments: Vec<Expr>, span: TextRange) -> Expr {
        arguments
            .into_iter()
            .fold(function, |acc, arg| Expr::apply(acc, arg, span))
    }

    pub fn lambda(param: Pattern, body: Expr, span: TextRange) -> Expr {
        Expr::Lambda {
            param,
            body: Box::new(body),
            scope: None,
            span,
        }
    }

    pub fn clauses(clauses: Vec<Clause>, span: TextRange) -> Expr {
        Expr::Clauses {
            clauses,
            scope: None,
            span,
        }
    }
}

impl Clause {
    pub fn new(patterns: Vec<Pattern>, body: Expr, span: TextRange) -> Clause {
        Clause {
            patterns,
            body,
            scope: None,
            span,
        }
    }
}
