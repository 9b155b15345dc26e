//! Instance matching and dictionary bookkeeping.
//!
//! An instance declaration names a class and one head type per class
//! parameter. Whether an instance covers a use site is decided by trial
//! unification in a throwaway scope, so `Eq [a]` covers `[Int]` without
//! touching any live bindings.

use rustc_hash::FxHashMap;
use tarn_ast::Symbol;

use crate::scope::TypeScope;
use crate::ty::{Ty, TyVar};
use crate::unify::unify;

/// Do an instance's declared head types cover the queried types?
pub fn heads_match(instance_params: &[Ty], query: &[Ty]) -> bool {
    if instance_params.len() != query.len() {
        return false;
    }
    let mut scope = TypeScope::new();
    let mut renames = FxHashMap::default();
    instance_params.iter().zip(query).all(|(declared, wanted)| {
        let declared = freshen(declared, &mut scope, &mut renames);
        unify(wanted, &declared, &mut scope).is_unified()
    })
}

/// Replace every variable with a fresh one, consistently across one call.
/// Instance head variables are unconstrained, so contexts are not carried.
fn freshen(ty: &Ty, scope: &mut TypeScope, renames: &mut FxHashMap<String, Ty>) -> Ty {
    match ty {
        Ty::Var(v) => renames
            .entry(v.name.clone())
            .or_insert_with(|| scope.reserve_type())
            .clone(),
        Ty::Fun { arg, ret } => Ty::fun(
            freshen(arg, scope, renames),
            freshen(ret, scope, renames),
        ),
        Ty::Sum { name, params } => Ty::Sum {
            name: name.clone(),
            params: params
                .iter()
                .map(|p| freshen(p, scope, renames))
                .collect(),
        },
        Ty::App { head, tail } => Ty::app(
            freshen(head, scope, renames),
            freshen(tail, scope, renames),
        ),
        Ty::Instance { class, binding } => Ty::instance(
            class.clone(),
            freshen(binding, scope, renames),
        ),
    }
}

/// Every `(variable, class)` requirement in a type, left to right and outer
/// to inner, first occurrence kept. The order here is the order of the
/// dictionary parameters synthesized for the definition.
pub fn instance_map(ty: &Ty) -> Vec<(TyVar, Symbol)> {
    let mut pairs = Vec::new();
    collect_pairs(ty, &mut pairs);
    pairs
}

fn collect_pairs(ty: &Ty, pairs: &mut Vec<(TyVar, Symbol)>) {
    match ty {
        Ty::Var(v) => {
            for class in &v.context {
                let seen = pairs.iter().any(|(u, c)| u.name == v.name && c == class);
                if !seen {
                    pairs.push((v.clone(), class.clone()));
                }
            }
        }
        Ty::Fun { arg, ret } => {
            collect_pairs(arg, pairs);
            collect_pairs(ret, pairs);
        }
        Ty::Sum { params, .. } => {
            for param in params {
                collect_pairs(param, pairs);
            }
        }
        Ty::App { head, tail } => {
            collect_pairs(head, pairs);
            collect_pairs(tail, pairs);
        }
        Ty::Instance { binding, .. } => collect_pairs(binding, pairs),
    }
}

/// One dictionary parameter synthesized on an enclosing definition.
#[derive(Clone, Debug)]
pub struct DictArg {
    pub var: TyVar,
    pub class: Symbol,
    pub name: String,
}

/// Find an enclosing dictionary parameter for `class` over `var`.
///
/// Frames are searched innermost first. Variables compare by what they
/// resolve to, not by their spelling, so a method used through an alias
/// still finds the right dictionary.
pub fn find_argument(
    frames: &[Vec<DictArg>],
    class: &Symbol,
    var: &TyVar,
    scope: &TypeScope,
) -> Option<String> {
    let wanted = resolved_name(var, scope);
    for frame in frames.iter().rev() {
        for arg in frame {
            if &arg.class == class && resolved_name(&arg.var, scope) == wanted {
                return Some(arg.name.clone());
            }
        }
    }
    None
}

fn resolved_name(var: &TyVar, scope: &TypeScope) -> String {
    match scope.target_of(&Ty::Var(var.clone())) {
        Ty::Var(v) => v.name,
        other => other.to_string(),
    }
}
