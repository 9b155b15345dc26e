//! Surface type syntax.
//!
//! These nodes appear in signatures, class member declarations, data-type
//! fields and instance heads. The checker lowers them to its own type
//! representation against the current scope; they are never used for
//! inference directly.

use rowan::TextRange;

use crate::symbol::Symbol;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// A named type: `Int`, `Maybe`, `Geometry.Point`.
    Name { symbol: Symbol, span: TextRange },
    /// A type variable: `a`.
    Var { name: String, span: TextRange },
    /// Application of a named type to arguments: `Maybe a`.
    Apply {
        head: Box<TypeExpr>,
        args: Vec<TypeExpr>,
        span: TextRange,
    },
    /// `a -> b`. Right-associative in the surface syntax, so `a -> b -> c`
    /// arrives as `Fun(a, Fun(b, c))`.
    Fun {
        arg: Box<TypeExpr>,
        ret: Box<TypeExpr>,
        span: TextRange,
    },
    Tuple {
        items: Vec<TypeExpr>,
        span: TextRange,
    },
    List {
        item: Box<TypeExpr>,
        span: TextRange,
    },
    /// A constrained type: `(Num a) => a -> a`. Only appears outermost.
    Constrained {
        constraints: Vec<ClassConstraint>,
        ty: Box<TypeExpr>,
        span: TextRange,
    },
}

/// One constraint of a context: the class and the variable it constrains.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassConstraint {
    pub class: Symbol,
    pub var: String,
    pub span: TextRange,
}

impl TypeExpr {
    pub fn span(&self) -> TextRange {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Var { span, .. }
            | TypeExpr::Apply { span, .. }
            | TypeExpr::Fun { span, .. }
            | TypeExpr::Tuple { span, .. }
            | TypeExpr::List { span, .. }
            | TypeExpr::Constrained { span, .. } => *span,
        }
    }

    pub fn name(symbol: Symbol, span: TextRange) -> TypeExpr {
        TypeExpr::Name { symbol, span }
    }

    pub fn var(name: impl Into<String>, span: TextRange) -> TypeExpr {
        TypeExpr::Var {
            name: name.into(),
            span,
        }
    }

    pub fn fun(arg: TypeExpr, ret: TypeExpr, span: TextRange) -> TypeExpr {
        TypeExpr::Fun {
            arg: Box::new(arg),
            ret: Box::new(ret),
            span,
        }
    }

    pub fn apply(head: TypeExpr, args: Vec<TypeExpr>, span: TextRange) -> TypeExpr {
        TypeExpr::Apply {
            head: Box::new(head),
            args,
            span,
        }
    }

    pub fn constrained(
        constraints: Vec<ClassConstraint>,
        ty: TypeExpr,
        span: TextRange,
    ) -> TypeExpr {
        TypeExpr::Constrained {
            constraints,
            ty: Box::new(ty),
            span,
        }
    }
}
