//! Package scopes.
//!
//! A [`PackageScope`] maps every package-level identifier to a [`Symbol`].
//! It is filled by declaration analysis across all files of a package and
//! becomes immutable once the package is registered with the interpreter.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{Name, NodeId, Span};

/// Index of a global value in the interpreter's shared frame.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Slot(u32);

impl Slot {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Slot(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SymbolKind {
    Var,
    Const,
    Type,
    Func,
}

impl SymbolKind {
    pub const fn describe(self) -> &'static str {
        match self {
            SymbolKind::Var => "variable",
            SymbolKind::Const => "constant",
            SymbolKind::Type => "type",
            SymbolKind::Func => "function",
        }
    }

    /// Whether symbols of this kind live in a frame slot.
    pub const fn has_value(self) -> bool {
        !matches!(self, SymbolKind::Type)
    }
}

/// Non-owning back-reference from a symbol to its declaring node.
///
/// `file` indexes the package's files in parse order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeclRef {
    pub file: u32,
    pub node: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: Name,
    pub kind: SymbolKind,
    pub decl: DeclRef,
    pub span: Span,
    /// Frame slot holding the value; `None` for types.
    pub slot: Option<Slot>,
    /// Parameter count for functions.
    pub arity: Option<usize>,
    pub resolved: bool,
}

/// All package-level declarations of one import path.
#[derive(Clone, Debug)]
pub struct PackageScope {
    import_path: String,
    package: Name,
    symbols: FxHashMap<Name, Symbol>,
    order: Vec<Name>,
}

impl PackageScope {
    pub fn new(import_path: impl Into<String>, package: Name) -> Self {
        PackageScope {
            import_path: import_path.into(),
            package,
            symbols: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    /// Declared package name (the display name).
    pub fn package(&self) -> Name {
        self.package
    }

    /// Declare a symbol.
    ///
    /// On redeclaration the existing symbol is returned and the scope is
    /// left unchanged.
    pub fn declare(&mut self, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(existing) = self.symbols.get(&symbol.name) {
            return Err(existing.clone());
        }
        self.order.push(symbol.name);
        self.symbols.insert(symbol.name, symbol);
        Ok(())
    }

    #[inline]
    pub fn get(&self, name: Name) -> Option<&Symbol> {
        self.symbols.get(&name)
    }

    #[inline]
    pub fn contains(&self, name: Name) -> bool {
        self.symbols.contains_key(&name)
    }

    /// Mark a symbol resolved. Returns false for unknown names.
    pub fn mark_resolved(&mut self, name: Name) -> bool {
        match self.symbols.get_mut(&name) {
            Some(symbol) => {
                symbol.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self, name: Name) -> bool {
        self.symbols.get(&name).is_some_and(|s| s.resolved)
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|name| self.symbols.get(name))
    }

    /// Highest slot used by this scope, plus one.
    pub fn slot_end(&self) -> usize {
        self.symbols
            .values()
            .filter_map(|s| s.slot)
            .map(|s| s.index() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Whether an identifier is visible from other packages.
pub fn is_exported(ident: &str) -> bool {
    ident.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests;
