//! Syntax tree shared by the Tarn compiler pipeline.
//!
//! The parsing and precedence layers produce these nodes; the type checker
//! consumes them, qualifying names and rewriting class-method calls in place.
//! Every node carries a `rowan::TextRange` span for diagnostics, and every
//! scope-introducing construct carries a `ScopeId` slot that the checker's
//! binding pass fills in.

pub mod expr;
pub mod item;
pub mod pat;
pub mod symbol;
pub mod types;

pub use expr::{Clause, Expr, LetBinding, Literal};
pub use item::{
    ClassDef, DataDef, DataVariant, FieldDef, Fixity, Import, InstanceDef, Item, Module,
    OperatorDecl, SignatureDecl, ValueDef,
};
pub use pat::{FieldPattern, Pattern};
pub use symbol::Symbol;
pub use types::{ClassConstraint, TypeExpr};

use rowan::{TextRange, TextSize};

/// Index of a lexical scope in the checker's scope arena.
///
/// Freshly parsed nodes carry no scope; the checker assigns one to each
/// scope-introducing node during its binding pass and re-enters it on later
/// passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Build a `TextRange` from raw byte offsets.
pub fn span(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::from(start), TextSize::from(end))
}
