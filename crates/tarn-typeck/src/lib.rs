//! Tarn type checker: Hindley-Milner inference with type classes.
//!
//! This crate implements the semantic core of the Tarn compiler. It walks
//! parsed modules, assigns a type to every expression, detects type errors,
//! and rewrites class-method references into explicit dictionary passing.
//! Along the way it builds the lexical scope tree later stages use for
//! closure conversion.
//!
//! - Hindley-Milner inference with let-polymorphism
//! - Structural unification with occurs check and constrained variables
//! - Type classes resolved by dictionary passing
//! - Module-aware name qualification with capture tracking
//!
//! # Architecture
//!
//! - [`ty`]: the type representation (`Ty`, `TyVar`)
//! - [`scope`]: the mutable binding store behind one inference run
//! - [`unify`]: structural unification with structured failures
//! - [`env`]: the lexical scope tree and name qualification
//! - [`resolver`]: symbol entries and the cross-module resolver boundary
//! - [`instances`]: instance matching and dictionary-argument lookup
//! - [`builtins`]: the `Core` module registry
//! - [`error`]: typed diagnostics with constraint origins
//! - [`infer`]: the four-pass inference driver
//! - [`diagnostics`]: ariadne rendering of collected diagnostics

pub mod builtins;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod fresh;
pub mod infer;
pub mod instances;
pub mod resolver;
pub mod scope;
pub mod ty;
pub mod unify;

use rowan::TextRange;
use rustc_hash::FxHashMap;
use tarn_ast::Module;

use crate::env::ScopeLayout;
use crate::error::{TypeError, TypeWarning};
use crate::infer::Inferencer;
use crate::resolver::SymbolResolver;
use crate::ty::Ty;

/// The result of checking a sequence of modules.
pub struct TypeckResult {
    /// Map from source ranges to their resolved types.
    pub types: FxHashMap<TextRange, Ty>,
    /// Errors found during checking, in discovery order.
    pub errors: Vec<TypeError>,
    /// Non-fatal observations.
    pub warnings: Vec<TypeWarning>,
    /// Locals and captures of every nested scope, for closure conversion.
    pub layouts: Vec<ScopeLayout>,
    /// The resolved type of the last definition checked. `None` when the
    /// input had no value definitions.
    pub result_type: Option<Ty>,
}

impl TypeckResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check one module against a resolver.
pub fn check_module(resolver: &dyn SymbolResolver, module: &mut Module) -> TypeckResult {
    check_modules(resolver, std::slice::from_mut(module))
}

/// Check several modules in order, sharing one type scope.
///
/// Modules must come dependency-first: a module can only import modules
/// checked before it or known to the resolver. The modules are mutated in
/// place: names are qualified, scopes attached, and method references
/// rewritten to dictionary applications.
pub fn check_modules(resolver: &dyn SymbolResolver, modules: &mut [Module]) -> TypeckResult {
    let mut inferencer = Inferencer::new(resolver);
    for module in modules.iter_mut() {
        inferencer.check_module(module);
    }
    inferencer.finish()
}
