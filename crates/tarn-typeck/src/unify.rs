//! Structural unification.
//!
//! [`unify`] is the single entry point. Both sides are resolved through the
//! type scope first, so bound variables are unified by their targets rather
//! than their names, then every shape pair is handled by one exhaustive
//! match. Failures come back as structured [`Unify`] values; the caller
//! decides how to report them and keeps checking.

use std::collections::BTreeSet;
use std::fmt;

use tarn_ast::Symbol;

use crate::scope::TypeScope;
use crate::ty::{Ty, TyVar};

/// The outcome of making two types equal. Only `Unified` carries a usable
/// type; every other variant is a structured diagnostic.
#[derive(Clone, Debug, PartialEq)]
pub enum Unify {
    Unified(Ty),
    TypeMismatch {
        expected: Ty,
        actual: Ty,
        cause: Option<Box<Unify>>,
    },
    CircularReference {
        expected: Ty,
        referenced: Ty,
    },
    ContextMismatch {
        expected: Ty,
        actual: Ty,
        expected_context: BTreeSet<Symbol>,
        actual_context: BTreeSet<Symbol>,
    },
    FailedBinding {
        target: Ty,
        variable: Ty,
        current: Ty,
    },
    MissingParameter(Ty),
    ExtraParameter(Ty),
}

impl Unify {
    pub fn is_unified(&self) -> bool {
        matches!(self, Unify::Unified(_))
    }

    pub fn unified(self) -> Option<Ty> {
        match self {
            Unify::Unified(ty) => Some(ty),
            _ => None,
        }
    }

    /// The unified type, or `fallback` when unification failed. Checking
    /// continues on a best-effort value after a reported failure.
    pub fn unwrap_or(self, fallback: Ty) -> Ty {
        match self {
            Unify::Unified(ty) => ty,
            _ => fallback,
        }
    }

    /// Follow the `cause` chain of wrapped mismatches to the failure that
    /// started it.
    pub fn root_cause(&self) -> &Unify {
        match self {
            Unify::TypeMismatch {
                cause: Some(cause), ..
            } => cause.root_cause(),
            other => other,
        }
    }
}

fn join_classes(classes: &BTreeSet<Symbol>) -> String {
    let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    names.join(", ")
}

impl fmt::Display for Unify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unify::Unified(ty) => write!(f, "{ty}"),
            Unify::TypeMismatch {
                expected,
                actual,
                cause,
            } => {
                write!(f, "type mismatch: expected `{expected}`, found `{actual}`")?;
                if let Some(cause) = cause {
                    write!(f, ": {cause}")?;
                }
                Ok(())
            }
            Unify::CircularReference {
                expected,
                referenced,
            } => write!(
                f,
                "circular reference: `{expected}` occurs in `{referenced}`"
            ),
            Unify::ContextMismatch {
                actual,
                expected_context,
                actual_context,
                ..
            } => {
                let missing: BTreeSet<Symbol> = expected_context
                    .difference(actual_context)
                    .cloned()
                    .collect();
                write!(
                    f,
                    "context mismatch: `{actual}` does not satisfy {}",
                    join_classes(&missing)
                )
            }
            Unify::FailedBinding {
                target,
                variable,
                current,
            } => write!(
                f,
                "cannot bind `{variable}` to `{target}`: it is already bound to `{current}`"
            ),
            Unify::MissingParameter(ty) => write!(
                f,
                "missing type parameter: `{ty}` is not applied to enough parameters"
            ),
            Unify::ExtraParameter(ty) => write!(f, "extra type parameter `{ty}`"),
        }
    }
}

/// Unify `ty` against `target` in `scope`. `ty` is the type found, `target`
/// the type required; the distinction shows up in reported mismatches.
pub fn unify(ty: &Ty, target: &Ty, scope: &mut TypeScope) -> Unify {
    let ty = scope.target_of(ty);
    let target = scope.target_of(target);
    match (&ty, &target) {
        (Ty::Var(a), Ty::Var(b)) => unify_variables(a, b, scope),
        (Ty::Var(v), other) => unify_variable(v, other, scope),
        (other, Ty::Var(v)) => unify_variable(v, other, scope),

        (Ty::Fun { arg: a1, ret: r1 }, Ty::Fun { arg: a2, ret: r2 }) => {
            // arguments before results; the order is observable in reports
            let arg = match unify(a1.as_ref(), a2.as_ref(), scope) {
                Unify::Unified(arg) => arg,
                failure => return mismatch(&target, &ty, failure),
            };
            let ret = match unify(r1.as_ref(), r2.as_ref(), scope) {
                Unify::Unified(ret) => ret,
                failure => return mismatch(&target, &ty, failure),
            };
            Unify::Unified(Ty::fun(arg, ret))
        }

        (
            Ty::Sum {
                name: n1,
                params: p1,
            },
            Ty::Sum {
                name: n2,
                params: p2,
            },
        ) => {
            // arity is checked before any parameter is unified; a truncated
            // match must not leave partial bindings behind
            if n1 != n2 || p1.len() != p2.len() {
                return Unify::TypeMismatch {
                    expected: target.clone(),
                    actual: ty.clone(),
                    cause: None,
                };
            }
            let mut params = Vec::with_capacity(p1.len());
            for (x, y) in p1.iter().zip(p2) {
                match unify(x, y, scope) {
                    Unify::Unified(p) => params.push(p),
                    failure => return mismatch(&target, &ty, failure),
                }
            }
            Unify::Unified(Ty::Sum {
                name: n1.clone(),
                params,
            })
        }

        // An application on the found side: peel its applied parameter
        // against the sum's last one. A sum with nothing left to absorb
        // means the application carries a parameter too many.
        (Ty::App { head, tail }, Ty::Sum { name, params }) => {
            let Some((last, rest)) = params.split_last() else {
                return Unify::ExtraParameter(scope.resolve(tail));
            };
            let param = match unify(tail.as_ref(), last, scope) {
                Unify::Unified(param) => param,
                failure => return mismatch(&target, &ty, failure),
            };
            let sub = Ty::Sum {
                name: name.clone(),
                params: rest.to_vec(),
            };
            match unify(head.as_ref(), &sub, scope) {
                Unify::Unified(head) => Unify::Unified(Ty::app(head, param).flatten()),
                failure => failure,
            }
        }

        // An application on the required side demands one more applied
        // parameter than the found sum provides once it runs dry.
        (Ty::Sum { name, params }, Ty::App { head, tail }) => {
            let Some((last, rest)) = params.split_last() else {
                return Unify::MissingParameter(ty.clone());
            };
            let param = match unify(last, tail.as_ref(), scope) {
                Unify::Unified(param) => param,
                failure => return mismatch(&target, &ty, failure),
            };
            let sub = Ty::Sum {
                name: name.clone(),
                params: rest.to_vec(),
            };
            match unify(&sub, head.as_ref(), scope) {
                Unify::Unified(head) => Unify::Unified(Ty::app(head, param).flatten()),
                failure => failure,
            }
        }

        (
            Ty::App {
                head: h1,
                tail: t1,
            },
            Ty::App {
                head: h2,
                tail: t2,
            },
        ) => {
            let tail = match unify(t1.as_ref(), t2.as_ref(), scope) {
                Unify::Unified(tail) => tail,
                failure => return mismatch(&target, &ty, failure),
            };
            match unify(h1.as_ref(), h2.as_ref(), scope) {
                Unify::Unified(head) => Unify::Unified(Ty::app(head, tail).flatten()),
                failure => failure,
            }
        }

        (
            Ty::Instance {
                class: c1,
                binding: b1,
            },
            Ty::Instance {
                class: c2,
                binding: b2,
            },
        ) if c1 == c2 => match unify(b1.as_ref(), b2.as_ref(), scope) {
            Unify::Unified(binding) => Unify::Unified(Ty::instance(c1.clone(), binding)),
            failure => mismatch(&target, &ty, failure),
        },

        _ => Unify::TypeMismatch {
            expected: target.clone(),
            actual: ty.clone(),
            cause: None,
        },
    }
}

fn mismatch(expected: &Ty, actual: &Ty, cause: Unify) -> Unify {
    Unify::TypeMismatch {
        expected: expected.clone(),
        actual: actual.clone(),
        cause: Some(Box::new(cause)),
    }
}

fn unify_variable(var: &TyVar, other: &Ty, scope: &mut TypeScope) -> Unify {
    // the occurs check looks through bindings, or a variable could sneak
    // into itself via an already-bound sibling
    let referenced = scope.resolve(other);
    if referenced.contains(var) {
        return Unify::CircularReference {
            expected: Ty::Var(var.clone()),
            referenced,
        };
    }
    let required = scope.context_of(&Ty::Var(var.clone()));
    if !required.is_empty() {
        let available = scope.context_of(other);
        if !required.is_subset(&available) {
            return Unify::ContextMismatch {
                expected: Ty::Var(var.clone()),
                actual: other.clone(),
                expected_context: required,
                actual_context: available,
            };
        }
    }
    scope.bind(var, other)
}

fn unify_variables(a: &TyVar, b: &TyVar, scope: &mut TypeScope) -> Unify {
    if a.name == b.name {
        return Unify::Unified(scope.target_of(&Ty::Var(a.clone())));
    }
    // the union of both contexts is registered against both variables
    let mut union = scope.context_of(&Ty::Var(a.clone()));
    union.extend(scope.context_of(&Ty::Var(b.clone())));
    if !union.is_empty() {
        scope.extend_context(&Ty::Var(a.clone()), union.clone());
        scope.extend_context(&Ty::Var(b.clone()), union);
    }
    scope.bind(a, &Ty::Var(b.clone()))
}
