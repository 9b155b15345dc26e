//! Possibly-qualified names.

use std::fmt;

/// A name, optionally qualified by the module that defines it.
///
/// The parser produces bare names (`module == None`); the checker's
/// qualification pass rewrites them to fully-qualified form by consulting the
/// lexical scope chain and the module's imports. Locally-bound names (lambda
/// parameters, pattern bindings, let bindings) stay bare.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub module: Option<String>,
    pub name: String,
}

impl Symbol {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Symbol {
        Symbol {
            module: Some(module.into()),
            name: name.into(),
        }
    }

    /// An unqualified name, as the parser produces it.
    pub fn bare(name: impl Into<String>) -> Symbol {
        Symbol {
            module: None,
            name: name.into(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.module.is_some()
    }

    /// The same name, qualified by `module`.
    pub fn qualified(&self, module: &str) -> Symbol {
        Symbol {
            module: Some(module.to_string()),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}.{}", module, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
