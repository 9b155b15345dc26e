//! The type scope: the mutable binding store behind one inference run.
//!
//! Tracks three things. The binding map takes each type variable to its
//! current target. The context map records class constraints accrued against
//! a type through unification and imported instances, separately from the
//! variable values themselves since context can keep growing after a variable
//! is bound. The specialized set pins types whose variables are temporarily
//! non-generic, which is how a definition's own recursive occurrences stay
//! monomorphic while it is being checked.
//!
//! Created once per checker invocation, mutated in place through a unique
//! borrow, and discarded when the pass ends.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use tarn_ast::Symbol;

use crate::fresh::SymbolGenerator;
use crate::ty::{Ty, TyVar};
use crate::unify::{unify, Unify};

#[derive(Debug, Default)]
pub struct TypeScope {
    bindings: FxHashMap<String, Ty>,
    contexts: FxHashMap<Ty, BTreeSet<Symbol>>,
    specialized: FxHashSet<Ty>,
    generator: SymbolGenerator,
}

impl TypeScope {
    pub fn new() -> TypeScope {
        TypeScope::default()
    }

    /// A brand-new unconstrained type variable.
    pub fn reserve_type(&mut self) -> Ty {
        Ty::Var(TyVar::new(self.generator.reserve_type_name()))
    }

    /// A brand-new synthesized value name (dictionary arguments,
    /// consolidated-clause parameters).
    pub fn reserve_value_name(&mut self, prefix: &str) -> String {
        self.generator.reserve_value_name(prefix)
    }

    /// Bind `var` to `target`, never overwriting silently.
    ///
    /// The target is resolved first so chains never gain redundant links.
    /// Binding an already-bound variable re-derives unification against the
    /// existing binding, which may recursively re-enter `bind`; an
    /// incompatible rebinding reports `FailedBinding` and leaves the existing
    /// binding in place.
    pub fn bind(&mut self, var: &TyVar, target: &Ty) -> Unify {
        let target = self.target_of(target);
        if let Ty::Var(t) = &target {
            if t.name == var.name {
                return Unify::Unified(target);
            }
        }
        match self.bindings.get(&var.name).cloned() {
            None => {
                self.bindings.insert(var.name.clone(), target.clone());
                Unify::Unified(target)
            }
            Some(current) => match unify(&target, &current, self) {
                Unify::Unified(merged) => {
                    self.bindings.insert(var.name.clone(), merged.clone());
                    Unify::Unified(merged)
                }
                _ => Unify::FailedBinding {
                    target,
                    variable: Ty::Var(var.clone()),
                    current,
                },
            },
        }
    }

    /// Follow the binding chain to a fixed point.
    ///
    /// A variable fixed point comes back re-annotated with its accumulated
    /// context, which lives in the context map rather than on the stored
    /// variable value.
    pub fn target_of(&self, ty: &Ty) -> Ty {
        let mut current = ty.clone();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        while let Ty::Var(v) = &current {
            // a variable incorrectly bound through itself must not loop
            if !seen.insert(v.name.clone()) {
                break;
            }
            match self.bindings.get(&v.name) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        if let Ty::Var(v) = current {
            Ty::Var(self.annotated(&v))
        } else {
            current
        }
    }

    /// Deep resolution through the current bindings.
    ///
    /// Unresolved variables come back annotated with their accrued context.
    /// Application chains whose heads resolve concrete are flattened on the
    /// way out, so resolved types are canonical.
    pub fn resolve(&self, ty: &Ty) -> Ty {
        self.resolve_chain(ty, &mut FxHashSet::default())
    }

    fn resolve_chain(&self, ty: &Ty, visited: &mut FxHashSet<String>) -> Ty {
        match ty {
            Ty::Var(v) => {
                // already visited: the variable is bound through itself, so
                // return it unresolved instead of looping
                if visited.contains(&v.name) {
                    return Ty::Var(self.annotated(v));
                }
                match self.bindings.get(&v.name) {
                    Some(bound) => {
                        visited.insert(v.name.clone());
                        let bound = bound.clone();
                        self.resolve_chain(&bound, visited)
                    }
                    None => Ty::Var(self.annotated(v)),
                }
            }
            // each structural child starts a fresh chain; the visited set
            // only guards variable-to-variable links
            Ty::Fun { arg, ret } => Ty::fun(self.resolve(arg), self.resolve(ret)),
            Ty::Sum { name, params } => Ty::Sum {
                name: name.clone(),
                params: params.iter().map(|p| self.resolve(p)).collect(),
            },
            Ty::App { head, tail } => {
                let tail = self.resolve(tail);
                match self.resolve(head) {
                    Ty::Sum { name, mut params } => {
                        params.push(tail);
                        Ty::Sum { name, params }
                    }
                    head => Ty::app(head, tail),
                }
            }
            Ty::Instance { class, binding } => {
                Ty::instance(class.clone(), self.resolve(binding))
            }
        }
    }

    /// Produce a fresh instantiation of a type scheme.
    ///
    /// Generic variables are replaced by brand-new variables, memoized
    /// through `mappings` so one source variable maps to one fresh variable
    /// within a single copy. Accumulated class context is carried onto the
    /// fresh variable and registered with the scope. Specialized variables
    /// come back untouched.
    pub fn generic_copy(&mut self, ty: &Ty, mappings: &mut FxHashMap<String, Ty>) -> Ty {
        match ty {
            Ty::Var(_) => match self.target_of(ty) {
                Ty::Var(rv) => {
                    if !self.is_generic(&rv) {
                        return Ty::Var(rv);
                    }
                    if let Some(fresh) = mappings.get(&rv.name) {
                        return fresh.clone();
                    }
                    let context = rv.context.clone();
                    let fresh = Ty::Var(TyVar {
                        name: self.generator.reserve_type_name(),
                        context: context.clone(),
                    });
                    if !context.is_empty() {
                        self.extend_context(&fresh, context);
                    }
                    mappings.insert(rv.name, fresh.clone());
                    fresh
                }
                bound => self.generic_copy(&bound, mappings),
            },
            Ty::Fun { arg, ret } => Ty::fun(
                self.generic_copy(arg, mappings),
                self.generic_copy(ret, mappings),
            ),
            Ty::Sum { name, params } => Ty::Sum {
                name: name.clone(),
                params: params
                    .iter()
                    .map(|p| self.generic_copy(p, mappings))
                    .collect(),
            },
            Ty::App { head, tail } => Ty::app(
                self.generic_copy(head, mappings),
                self.generic_copy(tail, mappings),
            ),
            Ty::Instance { class, binding } => {
                Ty::instance(class.clone(), self.generic_copy(binding, mappings))
            }
        }
    }

    /// Accrue class context against a type.
    pub fn extend_context(&mut self, ty: &Ty, classes: impl IntoIterator<Item = Symbol>) {
        self.contexts.entry(ty.clone()).or_default().extend(classes);
    }

    /// A variable's own context unioned with anything accrued in the scope;
    /// for non-variables, the accrued context only.
    ///
    /// Context registered against a sum head with all-variable parameters
    /// (an instance like `Eq [a]`) counts for every sum of that name and
    /// arity, not just the exact key.
    pub fn context_of(&self, ty: &Ty) -> BTreeSet<Symbol> {
        let mut context = match ty {
            Ty::Var(v) => v.context.clone(),
            _ => BTreeSet::new(),
        };
        if let Some(accrued) = self.contexts.get(ty) {
            context.extend(accrued.iter().cloned());
        }
        if let Ty::Sum { name, params } = ty {
            for (key, classes) in &self.contexts {
                if let Ty::Sum {
                    name: key_name,
                    params: key_params,
                } = key
                {
                    if key_name == name
                        && key_params.len() == params.len()
                        && !key_params.is_empty()
                        && key_params.iter().all(|p| matches!(p, Ty::Var(_)))
                    {
                        context.extend(classes.iter().cloned());
                    }
                }
            }
        }
        context
    }

    /// Pin a type: variables occurring in it stop being generic.
    pub fn specialize(&mut self, ty: &Ty) {
        self.specialized.insert(ty.clone());
    }

    /// Release a previously pinned type.
    pub fn generalize(&mut self, ty: &Ty) {
        self.specialized.remove(ty);
    }

    /// A variable is generic iff it occurs in no specialized type, as seen
    /// through the current bindings.
    pub fn is_generic(&self, var: &TyVar) -> bool {
        !self
            .specialized
            .iter()
            .any(|pinned| self.resolve(pinned).contains(var))
    }

    fn annotated(&self, v: &TyVar) -> TyVar {
        TyVar {
            name: v.name.clone(),
            context: self.context_of(&Ty::Var(v.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_of(ty: &Ty) -> TyVar {
        match ty {
            Ty::Var(v) => v.clone(),
            other => panic!("expected a variable, got {other}"),
        }
    }

    #[test]
    fn binding_chains_resolve_to_their_fixed_point() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let b = scope.reserve_type();
        assert!(scope.bind(&var_of(&a), &b).is_unified());
        assert!(scope.bind(&var_of(&b), &Ty::int()).is_unified());

        assert_eq!(scope.target_of(&a), Ty::int());
        assert_eq!(scope.resolve(&Ty::fun(a, b)), Ty::fun(Ty::int(), Ty::int()));
    }

    #[test]
    fn sibling_occurrences_resolve_independently() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        scope.bind(&var_of(&a), &Ty::int());
        // both positions of the same variable must resolve, not just the first
        let resolved = scope.resolve(&Ty::fun(a.clone(), a));
        assert_eq!(resolved, Ty::fun(Ty::int(), Ty::int()));
    }

    #[test]
    fn target_reannotates_with_accrued_context() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let num = Symbol::new("Core", "Num");
        scope.extend_context(&a, [num.clone()]);

        match scope.target_of(&a) {
            Ty::Var(v) => assert!(v.context.contains(&num)),
            other => panic!("expected a variable, got {other}"),
        }
    }

    #[test]
    fn context_survives_binding() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let b = scope.reserve_type();
        scope.bind(&var_of(&a), &b);
        // context accrued on the representative after the bind
        let show = Symbol::new("Core", "Show");
        scope.extend_context(&b, [show.clone()]);
        assert!(scope.context_of(&scope.target_of(&a)).contains(&show));
    }

    #[test]
    fn rebinding_compatible_targets_refines() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let b = scope.reserve_type();
        scope.bind(&var_of(&a), &b);
        // a's binding is still a bare variable; rebinding to Int refines both
        assert!(scope.bind(&var_of(&a), &Ty::int()).is_unified());
        assert_eq!(scope.target_of(&a), Ty::int());
        assert_eq!(scope.target_of(&b), Ty::int());
    }

    #[test]
    fn rebinding_incompatible_targets_fails() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        scope.bind(&var_of(&a), &Ty::int());
        let outcome = scope.bind(&var_of(&a), &Ty::string());
        assert!(matches!(outcome, Unify::FailedBinding { .. }));
        // the established binding stays
        assert_eq!(scope.target_of(&a), Ty::int());
    }

    #[test]
    fn generic_copy_issues_distinct_fresh_variables_per_mapping() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let eq = Symbol::new("Core", "Eq");
        scope.extend_context(&a, [eq.clone()]);
        let scheme = Ty::fun(a.clone(), a);

        let mut first = FxHashMap::default();
        let mut second = FxHashMap::default();
        let copy_one = scope.generic_copy(&scheme, &mut first);
        let copy_two = scope.generic_copy(&scheme, &mut second);

        let (v1, v2) = match (&copy_one, &copy_two) {
            (Ty::Fun { arg: a1, .. }, Ty::Fun { arg: a2, .. }) => {
                (var_of(a1), var_of(a2))
            }
            _ => panic!("expected function copies"),
        };
        assert_ne!(v1.name, v2.name);
        assert!(v1.context.contains(&eq));
        assert!(v2.context.contains(&eq));
        // the scope itself also knows the fresh variables' context
        assert!(scope.context_of(&Ty::Var(v1)).contains(&eq));
    }

    #[test]
    fn generic_copy_shares_one_fresh_variable_within_a_copy() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        let scheme = Ty::fun(a.clone(), a);
        let mut mappings = FxHashMap::default();
        match scope.generic_copy(&scheme, &mut mappings) {
            Ty::Fun { arg, ret } => assert_eq!(arg, ret),
            other => panic!("expected a function, got {other}"),
        }
    }

    #[test]
    fn specialized_variables_are_returned_untouched() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        scope.specialize(&a);
        let mut mappings = FxHashMap::default();
        assert_eq!(scope.generic_copy(&a, &mut mappings), a);

        scope.generalize(&a);
        assert_ne!(scope.generic_copy(&a, &mut mappings), a);
    }

    #[test]
    fn specialization_reaches_through_bindings() {
        let mut scope = TypeScope::new();
        let own = scope.reserve_type();
        let param = scope.reserve_type();
        scope.specialize(&own);
        // own becomes a function over param; param is now pinned too
        scope.bind(&var_of(&own), &Ty::fun(param.clone(), param.clone()));
        assert!(!scope.is_generic(&var_of(&param)));

        scope.generalize(&own);
        assert!(scope.is_generic(&var_of(&param)));
    }

    #[test]
    fn generic_copy_follows_bound_variables() {
        let mut scope = TypeScope::new();
        let a = scope.reserve_type();
        scope.bind(&var_of(&a), &Ty::int());
        let mut mappings = FxHashMap::default();
        assert_eq!(scope.generic_copy(&a, &mut mappings), Ty::int());
    }
}
