//! Top-level items: modules, value definitions, signatures, data types,
//! classes, instances and operator declarations.

use rowan::TextRange;

use crate::expr::Expr;
use crate::symbol::Symbol;
use crate::types::TypeExpr;
use crate::ScopeId;

/// One compilation module: a name, its imports and its items in source
/// order.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: String,
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
    pub span: TextRange,
    pub scope: Option<ScopeId>,
}

impl Module {
    pub fn new(name: impl Into<String>, span: TextRange) -> Module {
        Module {
            name: name.into(),
            imports: Vec::new(),
            items: Vec::new(),
            span,
            scope: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub module: String,
    pub span: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Value(ValueDef),
    Signature(SignatureDecl),
    Operator(OperatorDecl),
    Data(DataDef),
    Class(ClassDef),
    Instance(InstanceDef),
}

impl Item {
    pub fn span(&self) -> TextRange {
        match self {
            Item::Value(def) => def.span,
            Item::Signature(decl) => decl.span,
            Item::Operator(decl) => decl.span,
            Item::Data(def) => def.span,
            Item::Class(def) => def.span,
            Item::Instance(def) => def.span,
        }
    }
}

/// A named top-level or instance-member binding. Definitions with
/// parameters or multiple equations arrive with a `Clauses` body; a plain
/// `name = expr` binding carries the expression directly.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueDef {
    pub name: String,
    pub body: Expr,
    pub span: TextRange,
    pub scope: Option<ScopeId>,
}

impl ValueDef {
    pub fn new(name: impl Into<String>, body: Expr, span: TextRange) -> ValueDef {
        ValueDef {
            name: name.into(),
            body,
            span,
            scope: None,
        }
    }
}

/// A standalone type signature: `area :: Shape -> Float`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub span: TextRange,
}

/// Operator associativity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fixity {
    Left,
    Right,
    None,
}

/// An operator fixity declaration: `infixl 6 +`. Consumed by the excluded
/// precedence layer; recorded here so the checker can carry it on the
/// operator's symbol entry.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorDecl {
    pub fixity: Fixity,
    pub precedence: u8,
    pub name: String,
    pub span: TextRange,
}

/// A data-type definition with record-style constructors.
#[derive(Clone, Debug, PartialEq)]
pub struct DataDef {
    pub name: String,
    pub params: Vec<String>,
    pub variants: Vec<DataVariant>,
    pub span: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataVariant {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub span: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeExpr,
    pub span: TextRange,
}

/// A type-class declaration: the class variable and the member signatures
/// every instance must provide.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub var: String,
    pub members: Vec<SignatureDecl>,
    pub span: TextRange,
}

/// An instance declaration: the class, the types instantiating its
/// variable, and the member bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceDef {
    pub class: Symbol,
    pub params: Vec<TypeExpr>,
    pub members: Vec<ValueDef>,
    pub span: TextRange,
}
