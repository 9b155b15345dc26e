//! The lexical scope tree.
//!
//! Scopes live in an arena addressed by `ScopeId`, with parent links stored
//! as rewritable ids so a whole group of scopes can be re-parented without
//! moving them. Three roles share the arena: the root delegates to the
//! external resolver and defines nothing itself, module scopes own one
//! module's top-level entries and qualify bare names through imports, and
//! child scopes track the locals and captures closure conversion needs.

use std::collections::BTreeSet;

use rowan::TextRange;
use rustc_hash::{FxHashMap, FxHashSet};
use tarn_ast::{ScopeId, Symbol};

use crate::instances::heads_match;
use crate::resolver::{Declared, InstanceDescriptor, OperatorInfo, SymbolEntry, SymbolResolver};
use crate::ty::Ty;

/// A name bound by a lambda parameter, pattern, or let binding.
#[derive(Clone, Debug)]
pub struct LocalVar {
    pub name: String,
    pub span: TextRange,
    pub used: bool,
}

#[derive(Debug)]
pub enum ScopeKind {
    Root,
    Module {
        name: String,
        imports: Vec<String>,
        instances: Vec<InstanceDescriptor>,
    },
    Child {
        locals: Vec<LocalVar>,
        captures: Vec<String>,
    },
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    entries: FxHashMap<Symbol, SymbolEntry>,
    dependencies: Vec<Symbol>,
}

/// Materialized locals and captures for one child scope, in declaration
/// order. Handed to later stages once checking is done.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeLayout {
    pub scope: ScopeId,
    pub locals: Vec<String>,
    pub captures: Vec<String>,
}

enum Lookup {
    Local { defining: ScopeId, path: Vec<ScopeId> },
    Global(Symbol),
    Missing,
}

pub struct ScopeTree<'r> {
    scopes: Vec<Scope>,
    current: ScopeId,
    modules: FxHashMap<String, ScopeId>,
    resolver: &'r dyn SymbolResolver,
}

impl<'r> ScopeTree<'r> {
    pub fn new(resolver: &'r dyn SymbolResolver) -> ScopeTree<'r> {
        ScopeTree {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Root,
                entries: FxHashMap::default(),
                dependencies: Vec::new(),
            }],
            current: ScopeId(0),
            modules: FxHashMap::default(),
            resolver,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).parent
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    fn push(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// Open a module scope under the root and make it current.
    ///
    /// Duplicate imports keep their last position only; lookup walks imports
    /// last-declared first, so a later import shadows an earlier one.
    pub fn enter_module(&mut self, name: &str, imports: Vec<String>) -> ScopeId {
        assert!(
            matches!(self.scope(self.current).kind, ScopeKind::Root),
            "modules open directly under the root scope"
        );
        let mut seen = FxHashSet::default();
        let mut imports: Vec<String> = imports
            .into_iter()
            .rev()
            .filter(|module| seen.insert(module.clone()))
            .collect();
        imports.reverse();
        let id = self.push(Scope {
            parent: Some(self.current),
            kind: ScopeKind::Module {
                name: name.to_string(),
                imports,
                instances: Vec::new(),
            },
            entries: FxHashMap::default(),
            dependencies: Vec::new(),
        });
        self.modules.insert(name.to_string(), id);
        self.current = id;
        id
    }

    /// Open a child scope under the current scope and make it current.
    pub fn enter_scope(&mut self) -> ScopeId {
        let id = self.push(Scope {
            parent: Some(self.current),
            kind: ScopeKind::Child {
                locals: Vec::new(),
                captures: Vec::new(),
            },
            entries: FxHashMap::default(),
            dependencies: Vec::new(),
        });
        self.current = id;
        id
    }

    /// Make a previously-created scope current again.
    pub fn enter_existing(&mut self, id: ScopeId) {
        assert!(
            (id.0 as usize) < self.scopes.len(),
            "scope {id:?} does not exist"
        );
        self.current = id;
    }

    pub fn leave_scope(&mut self) {
        match self.scope(self.current).parent {
            Some(parent) => self.current = parent,
            None => panic!("cannot leave the root scope"),
        }
    }

    /// Create a new child of the current scope and re-parent every existing
    /// child of the current scope onto it, making it the sole child. Locals
    /// and captures of the moved scopes are untouched; only parent links
    /// move. The current scope stays current.
    pub fn insert_child(&mut self) -> ScopeId {
        let current = self.current;
        let id = ScopeId(self.scopes.len() as u32);
        for scope in &mut self.scopes {
            if scope.parent == Some(current) {
                scope.parent = Some(id);
            }
        }
        self.scopes.push(Scope {
            parent: Some(current),
            kind: ScopeKind::Child {
                locals: Vec::new(),
                captures: Vec::new(),
            },
            entries: FxHashMap::default(),
            dependencies: Vec::new(),
        });
        id
    }

    fn check_define(&self, symbol: &Symbol) {
        match &self.scope(self.current).kind {
            ScopeKind::Root => panic!("cannot define `{symbol}` in the root scope"),
            ScopeKind::Module { name, .. } => assert_eq!(
                symbol.module.as_deref(),
                Some(name.as_str()),
                "module-level definitions carry their module's qualification"
            ),
            ScopeKind::Child { .. } => {}
        }
    }

    fn entry_slot(&mut self, symbol: Symbol) -> &mut SymbolEntry {
        self.check_define(&symbol);
        let current = self.current;
        self.scope_mut(current).entries.entry(symbol).or_default()
    }

    pub fn define_value(&mut self, symbol: Symbol, ty: Ty) {
        self.entry_slot(symbol).value_type = Some(ty);
    }

    pub fn define_signature(&mut self, symbol: Symbol, ty: Ty) {
        self.entry_slot(symbol).signature = Some(ty);
    }

    pub fn define_operator(&mut self, symbol: Symbol, info: OperatorInfo) {
        self.entry_slot(symbol).operator = Some(info);
    }

    pub fn define_declared(&mut self, symbol: Symbol, declared: Declared) {
        self.entry_slot(symbol).declared = Some(declared);
    }

    pub fn mark_class_member(&mut self, symbol: Symbol, class: Symbol) {
        self.entry_slot(symbol).class_member = Some(class);
    }

    /// Look a symbol up: qualified names go straight to their module (in the
    /// tree if present, through the resolver otherwise), bare names walk the
    /// child chain from the current scope.
    pub fn entry(&self, symbol: &Symbol) -> Option<SymbolEntry> {
        match &symbol.module {
            Some(module) => match self.modules.get(module) {
                Some(&id) => self.scope(id).entries.get(symbol).cloned(),
                None => self.resolver.entry(symbol),
            },
            None => {
                let mut cursor = Some(self.current);
                while let Some(id) = cursor {
                    let scope = self.scope(id);
                    if let Some(entry) = scope.entries.get(symbol) {
                        return Some(entry.clone());
                    }
                    cursor = scope.parent;
                }
                None
            }
        }
    }

    fn module_defines(&self, symbol: &Symbol) -> bool {
        match symbol.module.as_ref().and_then(|m| self.modules.get(m)) {
            Some(&id) => self.scope(id).entries.contains_key(symbol),
            None => self.resolver.is_defined(symbol),
        }
    }

    /// Resolve a bare name to the form its defining scope gives it: locals
    /// stay bare, module members gain their module. The enclosing module's
    /// own entries win over imports; imports are searched in reverse
    /// declaration order.
    ///
    /// `None` means unresolved, and the caller owns the diagnostic. A hit on
    /// a local of an enclosing child scope records a capture in every scope
    /// crossed between the use and the definition, and marks the local used.
    pub fn qualify(&mut self, symbol: &Symbol) -> Option<Symbol> {
        if symbol.is_qualified() {
            return self.module_defines(symbol).then(|| symbol.clone());
        }
        match self.lookup_bare(&symbol.name) {
            Lookup::Local { defining, path } => {
                self.mark_local_used(defining, &symbol.name);
                for id in path {
                    self.capture_in(id, &symbol.name);
                }
                Some(symbol.clone())
            }
            Lookup::Global(qualified) => Some(qualified),
            Lookup::Missing => None,
        }
    }

    fn lookup_bare(&self, name: &str) -> Lookup {
        let mut path = Vec::new();
        let mut cursor = self.current;
        loop {
            let scope = self.scope(cursor);
            match &scope.kind {
                ScopeKind::Child { locals, .. } => {
                    if locals.iter().any(|l| l.name == name) {
                        return Lookup::Local {
                            defining: cursor,
                            path,
                        };
                    }
                    path.push(cursor);
                }
                ScopeKind::Module {
                    name: module,
                    imports,
                    ..
                } => {
                    let own = Symbol::new(module.clone(), name);
                    if scope.entries.contains_key(&own) {
                        return Lookup::Global(own);
                    }
                    for import in imports.iter().rev() {
                        let candidate = Symbol::new(import.clone(), name);
                        if self.module_defines(&candidate) {
                            return Lookup::Global(candidate);
                        }
                    }
                }
                ScopeKind::Root => return Lookup::Missing,
            }
            match scope.parent {
                Some(parent) => cursor = parent,
                None => return Lookup::Missing,
            }
        }
    }

    /// Declare a local in the current scope. Redeclaring the same name is a
    /// no-op; the first declaration keeps its span.
    pub fn add_local(&mut self, name: &str, span: TextRange) {
        let current = self.current;
        match &mut self.scope_mut(current).kind {
            ScopeKind::Child { locals, captures } => {
                assert!(
                    !captures.iter().any(|c| c == name),
                    "`{name}` is already captured in this scope"
                );
                if !locals.iter().any(|l| l.name == name) {
                    locals.push(LocalVar {
                        name: name.to_string(),
                        span,
                        used: false,
                    });
                }
            }
            _ => panic!("locals belong to nested scopes"),
        }
    }

    fn capture_in(&mut self, id: ScopeId, name: &str) {
        match &mut self.scope_mut(id).kind {
            ScopeKind::Child { locals, captures } => {
                assert!(
                    !locals.iter().any(|l| l.name == name),
                    "`{name}` is declared as a local in this scope"
                );
                if !captures.iter().any(|c| c == name) {
                    captures.push(name.to_string());
                }
            }
            _ => panic!("captures belong to nested scopes"),
        }
    }

    fn mark_local_used(&mut self, id: ScopeId, name: &str) {
        if let ScopeKind::Child { locals, .. } = &mut self.scope_mut(id).kind {
            if let Some(local) = locals.iter_mut().find(|l| l.name == name) {
                local.used = true;
            }
        }
    }

    pub fn locals(&self, id: ScopeId) -> &[LocalVar] {
        match &self.scope(id).kind {
            ScopeKind::Child { locals, .. } => locals,
            _ => &[],
        }
    }

    pub fn captures(&self, id: ScopeId) -> &[String] {
        match &self.scope(id).kind {
            ScopeKind::Child { captures, .. } => captures,
            _ => &[],
        }
    }

    /// Record that the enclosing definition refers to `symbol`. References
    /// resolving outside the modules of this compilation are not recorded;
    /// dependency sets order definitions against each other, not against
    /// libraries.
    pub fn add_dependency(&mut self, symbol: Symbol) {
        if self.is_external(&symbol) {
            return;
        }
        let Some(owner) = self.definition_scope() else {
            return;
        };
        let dependencies = &mut self.scope_mut(owner).dependencies;
        if !dependencies.contains(&symbol) {
            dependencies.push(symbol);
        }
    }

    pub fn dependencies(&self, id: ScopeId) -> &[Symbol] {
        &self.scope(id).dependencies
    }

    fn is_external(&self, symbol: &Symbol) -> bool {
        match &symbol.module {
            Some(module) => !self.modules.contains_key(module),
            None => false,
        }
    }

    /// The outermost child scope enclosing the current one: the scope of the
    /// definition being checked.
    fn definition_scope(&self) -> Option<ScopeId> {
        let mut cursor = self.current;
        let mut topmost = None;
        loop {
            let scope = self.scope(cursor);
            match &scope.kind {
                ScopeKind::Child { .. } => topmost = Some(cursor),
                _ => return topmost,
            }
            match scope.parent {
                Some(parent) => cursor = parent,
                None => return topmost,
            }
        }
    }

    fn enclosing_module(&self) -> Option<ScopeId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if matches!(self.scope(id).kind, ScopeKind::Module { .. }) {
                return Some(id);
            }
            cursor = self.scope(id).parent;
        }
        None
    }

    pub fn add_instance(&mut self, descriptor: InstanceDescriptor) {
        let Some(id) = self.enclosing_module() else {
            panic!("instances are declared inside a module scope");
        };
        match &mut self.scope_mut(id).kind {
            ScopeKind::Module { instances, .. } => instances.push(descriptor),
            _ => unreachable!(),
        }
    }

    /// Every instance of `class` visible from the current module whose head
    /// types cover `params`: the module's own declarations plus those of its
    /// imports.
    pub fn visible_instances(
        &self,
        class: &Symbol,
        params: &[Ty],
    ) -> BTreeSet<InstanceDescriptor> {
        let mut found = BTreeSet::new();
        let Some(id) = self.enclosing_module() else {
            return found;
        };
        let ScopeKind::Module {
            imports, instances, ..
        } = &self.scope(id).kind
        else {
            return found;
        };
        let matches = |d: &InstanceDescriptor| &d.class == class && heads_match(&d.params, params);
        found.extend(instances.iter().filter(|d| matches(d)).cloned());
        for import in imports {
            found.extend(
                self.instances_of_module(import)
                    .into_iter()
                    .filter(&matches),
            );
        }
        found
    }

    /// All instances one module declares, whether it lives in the tree or
    /// behind the resolver.
    pub fn instances_of_module(&self, module: &str) -> Vec<InstanceDescriptor> {
        match self.modules.get(module) {
            Some(&id) => match &self.scope(id).kind {
                ScopeKind::Module { instances, .. } => instances.clone(),
                _ => Vec::new(),
            },
            None => self
                .resolver
                .type_instances_by_module(module)
                .into_iter()
                .collect(),
        }
    }

    pub fn layouts(&self) -> Vec<ScopeLayout> {
        self.scopes
            .iter()
            .enumerate()
            .filter_map(|(index, scope)| match &scope.kind {
                ScopeKind::Child { locals, captures } => Some(ScopeLayout {
                    scope: ScopeId(index as u32),
                    locals: locals.iter().map(|l| l.name.clone()).collect(),
                    captures: captures.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Locals never marked used, in scope creation order. Synthetic names
    /// and names starting with `_` opt out.
    pub fn unused_locals(&self) -> Vec<(String, TextRange)> {
        let mut unused = Vec::new();
        for scope in &self.scopes {
            if let ScopeKind::Child { locals, .. } = &scope.kind {
                for local in locals {
                    let silenced = local.name.starts_with('#') || local.name.starts_with('_');
                    if !local.used && !silenced {
                        unused.push((local.name.clone(), local.span));
                    }
                }
            }
        }
        unused
    }
}
