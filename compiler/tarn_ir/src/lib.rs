//! Tarn IR - shared data types for the Tarn interpreter.
//!
//! Everything that flows between the parser, the declaration analysis and
//! the evaluator lives here:
//!
//! - [`Name`] / [`StringInterner`]: interned identifiers
//! - [`Span`] / [`Position`] / [`LineIndex`]: source locations
//! - [`NodeArena`] / [`NodeId`] / [`NodeKind`]: the flat syntax tree
//! - [`SyntaxTree`] / [`AstRoot`]: per-file parser and AST builder output
//! - [`PackageScope`] / [`Symbol`] / [`Slot`]: package-level declarations
//!
//! Syntax nodes are addressed by integer id. Symbols point back at their
//! declaring node through a [`DeclRef`] (file index + node id), never
//! through an owning reference, so the AST and the scope can refer to each
//! other without ownership cycles.

mod ast;
mod interner;
mod scope;
mod span;
mod stack;

pub use ast::{
    AstRoot, BinaryOp, Decl, DeclKind, FileImport, ImportSpec, Node, NodeArena, NodeId, NodeKind,
    Param, Reference, SyntaxTree, TypeExpr, UnaryOp,
};
pub use interner::{Name, SharedInterner, StringInterner};
pub use scope::{is_exported, DeclRef, PackageScope, Slot, Symbol, SymbolKind};
pub use span::{LineIndex, Position, Span};
pub use stack::ensure_sufficient_stack;

/// Identifier that is never bound (`var _ = f()`).
pub const BLANK_IDENT: &str = "_";

/// Name of the per-package entry function.
pub const MAIN_FUNC: &str = "main";

/// Name of the per-file initializer functions.
pub const INIT_FUNC: &str = "init";

/// Source file extension understood by the loader.
pub const SOURCE_EXT: &str = "tarn";
