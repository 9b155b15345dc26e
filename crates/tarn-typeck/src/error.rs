//! Typed diagnostics accumulated during checking.
//!
//! The checker never aborts on a user-facing failure: each one becomes a
//! `TypeError`, a best-effort type stands in, and checking continues. The
//! driver decides how the collected errors are presented.

use std::collections::BTreeSet;
use std::fmt;

use rowan::TextRange;
use tarn_ast::Symbol;

use crate::ty::Ty;
use crate::unify::Unify;

/// Where a type constraint came from. Reports point at the origin's span.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOrigin {
    /// An argument meeting its function's parameter type.
    Application { span: TextRange },
    /// A clause body meeting the group's shared result type.
    ClauseResult { span: TextRange },
    /// A pattern meeting the type of the value it scrutinizes.
    Pattern { span: TextRange },
    /// An inferred type meeting a declared signature.
    Annotation { name: Symbol, span: TextRange },
    /// A let binding's body meeting its uses.
    LetBinding { span: TextRange },
}

impl ConstraintOrigin {
    pub fn span(&self) -> TextRange {
        match self {
            ConstraintOrigin::Application { span }
            | ConstraintOrigin::ClauseResult { span }
            | ConstraintOrigin::Pattern { span }
            | ConstraintOrigin::Annotation { span, .. }
            | ConstraintOrigin::LetBinding { span } => *span,
        }
    }

    /// Short label text for the span the origin points at.
    pub fn describe(&self) -> String {
        match self {
            ConstraintOrigin::Application { .. } => "in this application".to_string(),
            ConstraintOrigin::ClauseResult { .. } => "in this clause".to_string(),
            ConstraintOrigin::Pattern { .. } => "in this pattern".to_string(),
            ConstraintOrigin::Annotation { name, .. } => {
                format!("body of `{name}` disagrees with its signature")
            }
            ConstraintOrigin::LetBinding { .. } => "in this binding".to_string(),
        }
    }
}

/// One error produced by the checker.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    Mismatch {
        expected: Ty,
        actual: Ty,
        origin: ConstraintOrigin,
    },
    CircularType {
        variable: Ty,
        referenced: Ty,
        origin: ConstraintOrigin,
    },
    ContextMismatch {
        ty: Ty,
        missing: BTreeSet<Symbol>,
        origin: ConstraintOrigin,
    },
    BindingConflict {
        variable: Ty,
        target: Ty,
        current: Ty,
        origin: ConstraintOrigin,
    },
    MissingParameter {
        ty: Ty,
        origin: ConstraintOrigin,
    },
    ExtraParameter {
        ty: Ty,
        origin: ConstraintOrigin,
    },
    UndefinedSymbol {
        symbol: Symbol,
        span: TextRange,
    },
    UndefinedOperator {
        name: String,
        span: TextRange,
    },
    ArityMismatch {
        name: Symbol,
        expected: usize,
        actual: usize,
        span: TextRange,
    },
    InstanceNotFound {
        class: Symbol,
        ty: Ty,
        span: TextRange,
    },
    AmbiguousInstance {
        class: Symbol,
        ty: Ty,
        modules: Vec<String>,
        span: TextRange,
    },
    MissingInstanceMember {
        class: Symbol,
        member: Symbol,
        span: TextRange,
    },
    ExtraInstanceMember {
        class: Symbol,
        member: Symbol,
        span: TextRange,
    },
    InstanceMemberSignatureMismatch {
        class: Symbol,
        member: Symbol,
        expected: Ty,
        actual: Ty,
        span: TextRange,
    },
    UnsupportedConstruct {
        construct: &'static str,
        span: TextRange,
    },
    DuplicateSignature {
        name: Symbol,
        span: TextRange,
    },
}

impl TypeError {
    /// Wrap a failed unification, pointing the report at `origin`.
    ///
    /// The mismatch chain is followed to its root cause first: a deep
    /// failure inside a function type reports the leaf pair that actually
    /// disagreed, not the whole spines.
    pub fn from_unify(outcome: &Unify, origin: ConstraintOrigin) -> Option<TypeError> {
        match outcome.root_cause() {
            Unify::Unified(_) => None,
            Unify::TypeMismatch {
                expected, actual, ..
            } => Some(TypeError::Mismatch {
                expected: expected.clone(),
                actual: actual.clone(),
                origin,
            }),
            Unify::CircularReference {
                expected,
                referenced,
            } => Some(TypeError::CircularType {
                variable: expected.clone(),
                referenced: referenced.clone(),
                origin,
            }),
            Unify::ContextMismatch {
                actual,
                expected_context,
                actual_context,
                ..
            } => Some(TypeError::ContextMismatch {
                ty: actual.clone(),
                missing: expected_context
                    .difference(actual_context)
                    .cloned()
                    .collect(),
                origin,
            }),
            Unify::FailedBinding {
                target,
                variable,
                current,
            } => Some(TypeError::BindingConflict {
                variable: variable.clone(),
                target: target.clone(),
                current: current.clone(),
                origin,
            }),
            Unify::MissingParameter(ty) => Some(TypeError::MissingParameter {
                ty: ty.clone(),
                origin,
            }),
            Unify::ExtraParameter(ty) => Some(TypeError::ExtraParameter {
                ty: ty.clone(),
                origin,
            }),
        }
    }

    pub fn span(&self) -> TextRange {
        match self {
            TypeError::Mismatch { origin, .. }
            | TypeError::CircularType { origin, .. }
            | TypeError::ContextMismatch { origin, .. }
            | TypeError::BindingConflict { origin, .. }
            | TypeError::MissingParameter { origin, .. }
            | TypeError::ExtraParameter { origin, .. } => origin.span(),
            TypeError::UndefinedSymbol { span, .. }
            | TypeError::UndefinedOperator { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::InstanceNotFound { span, .. }
            | TypeError::AmbiguousInstance { span, .. }
            | TypeError::MissingInstanceMember { span, .. }
            | TypeError::ExtraInstanceMember { span, .. }
            | TypeError::InstanceMemberSignatureMismatch { span, .. }
            | TypeError::UnsupportedConstruct { span, .. }
            | TypeError::DuplicateSignature { span, .. } => *span,
        }
    }
}

fn join_names<T: fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let names: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    names.join(", ")
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, actual, ..
            } => write!(f, "expected `{expected}`, found `{actual}`"),
            TypeError::CircularType {
                variable,
                referenced,
                ..
            } => write!(f, "circular type: `{variable}` occurs in `{referenced}`"),
            TypeError::ContextMismatch { ty, missing, .. } => {
                write!(f, "`{ty}` does not satisfy {}", join_names(missing))
            }
            TypeError::BindingConflict {
                variable,
                target,
                current,
                ..
            } => write!(
                f,
                "cannot bind `{variable}` to `{target}`: it is already bound to `{current}`"
            ),
            TypeError::MissingParameter { ty, .. } => {
                write!(f, "`{ty}` is not applied to enough type parameters")
            }
            TypeError::ExtraParameter { ty, .. } => {
                write!(f, "extra type parameter `{ty}`")
            }
            TypeError::UndefinedSymbol { symbol, .. } => {
                write!(f, "`{symbol}` is not defined")
            }
            TypeError::UndefinedOperator { name, .. } => {
                write!(f, "operator `{name}` has no fixity declaration")
            }
            TypeError::ArityMismatch {
                name,
                expected,
                actual,
                ..
            } => write!(
                f,
                "`{name}` expects {expected} type parameter{}, found {actual}",
                if *expected == 1 { "" } else { "s" }
            ),
            TypeError::InstanceNotFound { class, ty, .. } => {
                write!(f, "no instance of `{}` for `{ty}`", class.name)
            }
            TypeError::AmbiguousInstance {
                class, ty, modules, ..
            } => write!(
                f,
                "ambiguous instance of `{}` for `{ty}`: declared in {}",
                class.name,
                join_names(modules)
            ),
            TypeError::MissingInstanceMember { class, member, .. } => write!(
                f,
                "instance of `{}` is missing member `{}`",
                class.name, member.name
            ),
            TypeError::ExtraInstanceMember { class, member, .. } => write!(
                f,
                "`{}` is not a member of class `{}`",
                member.name, class.name
            ),
            TypeError::InstanceMemberSignatureMismatch {
                class,
                member,
                expected,
                actual,
                ..
            } => write!(
                f,
                "member `{}` of this `{}` instance has type `{actual}`, but the class declares `{expected}`",
                member.name, class.name
            ),
            TypeError::UnsupportedConstruct { construct, .. } => {
                write!(f, "unsupported construct: {construct}")
            }
            TypeError::DuplicateSignature { name, .. } => {
                write!(f, "duplicate signature for `{name}`")
            }
        }
    }
}

/// A non-fatal observation. Warnings never fail a check.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeWarning {
    UnusedLocal { name: String, span: TextRange },
}

impl TypeWarning {
    pub fn span(&self) -> TextRange {
        match self {
            TypeWarning::UnusedLocal { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeWarning::UnusedLocal { name, .. } => write!(f, "`{name}` is never used"),
        }
    }
}
