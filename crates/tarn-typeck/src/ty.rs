//! Type representation for the Tarn type system.
//!
//! Defines the core `Ty` enum: function types, nominal sum types, constrained
//! type variables, partially-applied constructor chains and the
//! dictionary-argument marker used during method elaboration. All values are
//! structurally immutable; every operation returns a new `Ty`.

use std::collections::BTreeSet;
use std::fmt;

use tarn_ast::Symbol;

/// A type variable: a lower-case name plus the set of class names it is
/// constrained by.
///
/// Identity is the name alone. The `context` field travels with the variable
/// for display and constraint checking but is intentionally excluded from
/// `PartialEq`, `Hash` and `Ord`: the same variable may be seen with more
/// context after unification accrues constraints on it, and it must still
/// key the same map entries.
#[derive(Clone, Debug)]
pub struct TyVar {
    pub name: String,
    pub context: BTreeSet<Symbol>,
}

impl TyVar {
    pub fn new(name: impl Into<String>) -> TyVar {
        TyVar {
            name: name.into(),
            context: BTreeSet::new(),
        }
    }

    pub fn with_context(
        name: impl Into<String>,
        context: impl IntoIterator<Item = Symbol>,
    ) -> TyVar {
        TyVar {
            name: name.into(),
            context: context.into_iter().collect(),
        }
    }
}

impl PartialEq for TyVar {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name // context intentionally excluded
    }
}

impl Eq for TyVar {}

impl std::hash::Hash for TyVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for TyVar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TyVar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// A monomorphic or polymorphic type shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ty {
    /// A single-argument function type. Multi-argument functions are curried
    /// chains of `Fun`.
    Fun { arg: Box<Ty>, ret: Box<Ty> },
    /// A nominal data type applied to its parameters. During inference the
    /// parameter list may be shorter than the declared arity while an
    /// application chain is still being reduced.
    Sum { name: Symbol, params: Vec<Ty> },
    Var(TyVar),
    /// Curried application of a not-yet-fully-applied constructor. Reduced
    /// to `Sum` by [`Ty::flatten`] once the head becomes concrete.
    App { head: Box<Ty>, tail: Box<Ty> },
    /// Dictionary-argument marker used while elaborating class methods.
    /// Never a surface type.
    Instance { class: Symbol, binding: Box<Ty> },
}

fn valid_sum_name(name: &str) -> bool {
    if name == "[]" {
        return true;
    }
    if let Some(inner) = name.strip_prefix('(').and_then(|n| n.strip_suffix(')')) {
        return !inner.is_empty() && inner.chars().all(|c| c == ',');
    }
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

impl Ty {
    pub fn fun(arg: Ty, ret: Ty) -> Ty {
        Ty::Fun {
            arg: Box::new(arg),
            ret: Box::new(ret),
        }
    }

    /// Fold several arguments into a curried function type.
    pub fn curry(args: impl IntoIterator<Item = Ty>, ret: Ty) -> Ty {
        let args: Vec<Ty> = args.into_iter().collect();
        args.into_iter()
            .rev()
            .fold(ret, |acc, arg| Ty::fun(arg, acc))
    }

    /// A nominal sum type. The name must be an upper-case identifier, a
    /// tuple constructor or the list constructor.
    pub fn sum(name: Symbol, params: Vec<Ty>) -> Ty {
        assert!(
            valid_sum_name(&name.name),
            "invalid sum type name `{}`",
            name.name
        );
        Ty::Sum { name, params }
    }

    pub fn var(name: impl Into<String>) -> Ty {
        Ty::Var(TyVar::new(name))
    }

    pub fn app(head: Ty, tail: Ty) -> Ty {
        Ty::App {
            head: Box::new(head),
            tail: Box::new(tail),
        }
    }

    pub fn instance(class: Symbol, binding: Ty) -> Ty {
        Ty::Instance {
            class,
            binding: Box::new(binding),
        }
    }

    pub fn int() -> Ty {
        Ty::sum(Symbol::new("Core", "Int"), Vec::new())
    }

    pub fn float() -> Ty {
        Ty::sum(Symbol::new("Core", "Float"), Vec::new())
    }

    pub fn string() -> Ty {
        Ty::sum(Symbol::new("Core", "String"), Vec::new())
    }

    pub fn bool() -> Ty {
        Ty::sum(Symbol::new("Core", "Bool"), Vec::new())
    }

    pub fn list(item: Ty) -> Ty {
        Ty::sum(Symbol::new("Core", "[]"), vec![item])
    }

    pub fn tuple(items: Vec<Ty>) -> Ty {
        assert!(items.len() >= 2, "tuple types need at least two items");
        let name = format!("({})", ",".repeat(items.len() - 1));
        Ty::sum(Symbol::new("Core", name), items)
    }

    /// The marker is "bound" once elaboration has discovered a concrete type
    /// for it; a bare variable means it is still open.
    pub fn is_bound_instance(&self) -> bool {
        match self {
            Ty::Instance { binding, .. } => !matches!(binding.as_ref(), Ty::Var(_)),
            _ => false,
        }
    }

    /// Normalize application chains: an `App` whose head reduces to a `Sum`
    /// absorbs its tail as one more applied parameter. Idempotent.
    pub fn flatten(&self) -> Ty {
        match self {
            Ty::Fun { arg, ret } => Ty::fun(arg.flatten(), ret.flatten()),
            Ty::Sum { name, params } => Ty::Sum {
                name: name.clone(),
                params: params.iter().map(Ty::flatten).collect(),
            },
            Ty::Var(_) => self.clone(),
            Ty::App { head, tail } => {
                let tail = tail.flatten();
                match head.flatten() {
                    Ty::Sum { name, mut params } => {
                        params.push(tail);
                        Ty::Sum { name, params }
                    }
                    head => Ty::app(head, tail),
                }
            }
            Ty::Instance { class, binding } => Ty::instance(class.clone(), binding.flatten()),
        }
    }

    /// Structural occurs check: does `var` appear anywhere inside this type?
    pub fn contains(&self, var: &TyVar) -> bool {
        match self {
            Ty::Var(v) => v == var,
            Ty::Fun { arg, ret } => arg.contains(var) || ret.contains(var),
            Ty::Sum { params, .. } => params.iter().any(|p| p.contains(var)),
            Ty::App { head, tail } => head.contains(var) || tail.contains(var),
            Ty::Instance { binding, .. } => binding.contains(var),
        }
    }

    /// Pair two types structurally without binding anything.
    ///
    /// Returns `None` on shape mismatch. On success the list starts with the
    /// pair itself, followed by component pairs in order; a variable pairs
    /// with anything and stops the descent on that branch.
    pub fn zip(&self, other: &Ty) -> Option<Vec<(Ty, Ty)>> {
        let mut pairs = Vec::new();
        if self.zip_into(other, &mut pairs) {
            Some(pairs)
        } else {
            None
        }
    }

    fn zip_into(&self, other: &Ty, pairs: &mut Vec<(Ty, Ty)>) -> bool {
        pairs.push((self.clone(), other.clone()));
        match (self, other) {
            (Ty::Var(_), _) | (_, Ty::Var(_)) => true,
            (Ty::Fun { arg: a1, ret: r1 }, Ty::Fun { arg: a2, ret: r2 }) => {
                a1.zip_into(a2, pairs) && r1.zip_into(r2, pairs)
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
                n1 == n2
                    && p1.len() == p2.len()
                    && p1.iter().zip(p2).all(|(x, y)| x.zip_into(y, pairs))
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
            ) => h1.zip_into(h2, pairs) && t1.zip_into(t2, pairs),
            (
                Ty::Instance {
                    class: c1,
                    binding: b1,
                },
                Ty::Instance {
                    class: c2,
                    binding: b2,
                },
            ) => c1 == c2 && b1.zip_into(b2, pairs),
            _ => false,
        }
    }

    /// True for types that display without surrounding parentheses.
    fn is_atom(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::Sum { name, params } => {
                params.is_empty() || name.name == "[]" || name.name.starts_with('(')
            }
            _ => false,
        }
    }
}

fn write_atomic(f: &mut fmt::Formatter<'_>, ty: &Ty) -> fmt::Result {
    if ty.is_atom() {
        write!(f, "{ty}")
    } else {
        write!(f, "({ty})")
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Fun { arg, ret } => {
                if matches!(arg.as_ref(), Ty::Fun { .. }) {
                    write!(f, "({arg}) -> {ret}")
                } else {
                    write!(f, "{arg} -> {ret}")
                }
            }
            Ty::Sum { name, params } => {
                if name.name == "[]" {
                    return match params.as_slice() {
                        [item] => write!(f, "[{item}]"),
                        _ => write!(f, "[]"),
                    };
                }
                if name.name.starts_with('(') && !params.is_empty() {
                    write!(f, "(")?;
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{param}")?;
                    }
                    return write!(f, ")");
                }
                // The builtin module prefix is noise in diagnostics.
                match name.module.as_deref() {
                    Some(module) if module != "Core" => write!(f, "{}.{}", module, name.name)?,
                    _ => write!(f, "{}", name.name)?,
                }
                for param in params {
                    write!(f, " ")?;
                    write_atomic(f, param)?;
                }
                Ok(())
            }
            Ty::Var(v) => write!(f, "{}", v.name),
            Ty::App { head, tail } => {
                write_atomic(f, head)?;
                write!(f, " ")?;
                write_atomic(f, tail)
            }
            Ty::Instance { class, binding } => {
                write!(f, "{} ", class.name)?;
                write_atomic(f, binding)
            }
        }
    }
}
