//! The boundary to symbols defined outside the current compilation.
//!
//! Module loading and classpath search live in the driver; the checker only
//! sees this synchronous capability. `ModuleRegistry` is the in-memory
//! implementation the driver and the tests feed with prebuilt modules.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tarn_ast::{Fixity, Symbol};

use crate::instances::heads_match;
use crate::ty::Ty;

/// Everything a scope knows about one symbol. Owned by exactly one scope
/// (or by a registry standing in for foreign modules).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolEntry {
    /// The symbol's current value type, when it names a value.
    pub value_type: Option<Ty>,
    /// A declared, generalizable signature.
    pub signature: Option<Ty>,
    pub operator: Option<OperatorInfo>,
    pub declared: Option<Declared>,
    /// The class this symbol belongs to, when it is a class method.
    pub class_member: Option<Symbol>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperatorInfo {
    pub fixity: Fixity,
    pub precedence: u8,
}

/// What a symbol introduces at the type level.
#[derive(Clone, Debug, PartialEq)]
pub enum Declared {
    /// A data type: its declared parameter count and its constructors.
    DataType {
        arity: usize,
        constructors: Vec<Symbol>,
    },
    /// A data constructor: its parent type and field names in order.
    Constructor { parent: Symbol, fields: Vec<String> },
    /// A type class: the variable name its member signatures are written
    /// over, and the members every instance must provide.
    Class { var: String, members: Vec<Symbol> },
}

/// One concrete instance of a class, addressable through its dictionary
/// value symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceDescriptor {
    pub module: String,
    pub class: Symbol,
    pub params: Vec<Ty>,
    pub value: Symbol,
}

/// Synchronous symbol lookup across compilation units. The only boundary
/// where the checker calls out of itself.
pub trait SymbolResolver {
    fn entry(&self, symbol: &Symbol) -> Option<SymbolEntry>;
    fn type_instances(&self, class: &Symbol, params: &[Ty]) -> BTreeSet<InstanceDescriptor>;
    fn type_instances_by_module(&self, module: &str) -> BTreeSet<InstanceDescriptor>;
    fn is_defined(&self, symbol: &Symbol) -> bool;
}

/// An in-memory resolver backed by plain maps.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: FxHashMap<Symbol, SymbolEntry>,
    instances: Vec<InstanceDescriptor>,
}

impl ModuleRegistry {
    pub fn new() -> ModuleRegistry {
        ModuleRegistry::default()
    }

    /// Get-or-create the entry for `symbol`, for incremental building.
    pub fn entry_mut(&mut self, symbol: Symbol) -> &mut SymbolEntry {
        self.entries.entry(symbol).or_default()
    }

    pub fn define(&mut self, symbol: Symbol, entry: SymbolEntry) {
        self.entries.insert(symbol, entry);
    }

    pub fn add_instance(&mut self, descriptor: InstanceDescriptor) {
        self.instances.push(descriptor);
    }
}

impl SymbolResolver for ModuleRegistry {
    fn entry(&self, symbol: &Symbol) -> Option<SymbolEntry> {
        self.entries.get(symbol).cloned()
    }

    fn type_instances(&self, class: &Symbol, params: &[Ty]) -> BTreeSet<InstanceDescriptor> {
        self.instances
            .iter()
            .filter(|d| &d.class == class && heads_match(&d.params, params))
            .cloned()
            .collect()
    }

    fn type_instances_by_module(&self, module: &str) -> BTreeSet<InstanceDescriptor> {
        self.instances
            .iter()
            .filter(|d| d.module == module)
            .cloned()
            .collect()
    }

    fn is_defined(&self, symbol: &Symbol) -> bool {
        self.entries.contains_key(symbol)
    }
}
