//! Global type analysis (GTA).
//!
//! Declares the package-level names of every file of a package before any
//! code is compiled, so that declarations may refer to names declared
//! later in the same file or in files parsed later.
//!
//! Phase one ([`Gta::declare_file`]) runs once per file in parse order.
//! Every declaration gets its symbol and frame slot immediately; one that
//! mentions a name not declared yet is recorded as unresolved and queued
//! on the revisit list. Phase two ([`Gta::retry`]) runs once all files
//! have been declared and re-checks the queue until nothing changes.
//! Whatever is still unresolved then is an error.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;
use tarn_eval::is_predeclared;
use tarn_ir::{
    AstRoot, Decl, DeclKind, DeclRef, Name, NodeKind, PackageScope, Reference, Slot, Span,
    StringInterner, Symbol, SymbolKind, TypeExpr, BLANK_IDENT,
};

use crate::error::LoadError;

/// Interpreter-wide source of frame slots.
#[derive(Debug, Default)]
pub(crate) struct SlotAllocator {
    next: AtomicU32,
}

impl SlotAllocator {
    pub fn reserve(&self) -> Slot {
        Slot::new(self.next.fetch_add(1, Ordering::AcqRel))
    }

    /// Number of slots handed out so far.
    pub fn high_water(&self) -> usize {
        self.next.load(Ordering::Acquire) as usize
    }
}

/// A declaration that mentioned an undeclared name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PendingDecl {
    pub file: usize,
    /// Index into the file's declaration table.
    pub decl: usize,
    pub missing: Name,
    /// Where the missing name is mentioned.
    pub span: Span,
}

/// Pending declarations keyed by the effective sub-path of their package.
pub(crate) type Revisit = BTreeMap<String, Vec<PendingDecl>>;

pub(crate) struct Gta<'a> {
    import_path: &'a str,
    interner: &'a StringInterner,
    slots: &'a SlotAllocator,
    scope: PackageScope,
    blank_slots: FxHashMap<DeclRef, Slot>,
}

impl<'a> Gta<'a> {
    pub fn new(
        import_path: &'a str,
        package: Name,
        interner: &'a StringInterner,
        slots: &'a SlotAllocator,
    ) -> Self {
        Gta {
            import_path,
            interner,
            slots,
            scope: PackageScope::new(import_path, package),
            blank_slots: FxHashMap::default(),
        }
    }

    /// Phase one for `roots[file]`.
    #[tracing::instrument(
        level = "debug",
        skip(self, roots, revisit),
        fields(file = %roots[file].file_name)
    )]
    pub fn declare_file(
        &mut self,
        roots: &[AstRoot],
        file: usize,
        sub_path: &str,
        revisit: &mut Revisit,
    ) -> Result<(), LoadError> {
        let root = &roots[file];
        for (index, decl) in root.decls.iter().enumerate() {
            let kind = match decl.kind {
                DeclKind::Var => SymbolKind::Var,
                DeclKind::Const => SymbolKind::Const,
                DeclKind::Type => SymbolKind::Type,
                DeclKind::Func => SymbolKind::Func,
                DeclKind::Init => continue,
            };
            let slot = (kind != SymbolKind::Type).then(|| self.slots.reserve());
            let decl_ref = DeclRef {
                file: u32::try_from(file).unwrap_or(u32::MAX),
                node: decl.node,
            };
            if self.interner.lookup(decl.name) == BLANK_IDENT {
                if let Some(slot) = slot {
                    self.blank_slots.insert(decl_ref, slot);
                }
                continue;
            }

            let missing = self.missing_reference(root, decl);
            let arity = match root.arena.kind(decl.node) {
                NodeKind::Func { params, .. } => Some(params.len()),
                _ => None,
            };
            let symbol = Symbol {
                name: decl.name,
                kind,
                decl: decl_ref,
                span: decl.span,
                slot,
                arity,
                resolved: missing.is_none(),
            };
            if let Err(previous) = self.scope.declare(symbol) {
                let previous_root = &roots[previous.decl.file as usize];
                return Err(LoadError::Redeclared {
                    import_path: self.import_path.to_string(),
                    name: self.interner.lookup(decl.name).to_string(),
                    first: format!(
                        "{}:{}",
                        previous_root.file_name,
                        previous_root.position(previous.span)
                    ),
                    second: format!("{}:{}", root.file_name, root.position(decl.span)),
                });
            }

            if let Some((missing, span)) = missing {
                tracing::trace!(
                    name = self.interner.lookup(decl.name),
                    missing = self.interner.lookup(missing),
                    "deferred"
                );
                revisit
                    .entry(sub_path.to_string())
                    .or_default()
                    .push(PendingDecl {
                        file,
                        decl: index,
                        missing,
                        span,
                    });
            }
        }
        Ok(())
    }

    /// Phase two: resolve the revisit list to a fixpoint.
    #[tracing::instrument(level = "debug", skip_all, fields(package = self.import_path))]
    pub fn retry(&mut self, roots: &[AstRoot], revisit: Revisit) -> Result<(), LoadError> {
        let mut pending: Vec<PendingDecl> = revisit.into_values().flatten().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(before);
            for entry in pending {
                let root = &roots[entry.file];
                let decl = &root.decls[entry.decl];
                match self.missing_reference(root, decl) {
                    None => {
                        self.scope.mark_resolved(decl.name);
                    }
                    Some((missing, span)) => unresolved.push(PendingDecl {
                        missing,
                        span,
                        ..entry
                    }),
                }
            }
            pending = unresolved;
            if pending.len() == before {
                break;
            }
        }

        match pending.first() {
            None => Ok(()),
            Some(entry) => {
                let root = &roots[entry.file];
                Err(LoadError::UnresolvedDeclaration {
                    import_path: self.import_path.to_string(),
                    name: self
                        .interner
                        .lookup(root.decls[entry.decl].name)
                        .to_string(),
                    missing: self.interner.lookup(entry.missing).to_string(),
                    file: root.file_name.clone(),
                    position: root.position(entry.span),
                })
            }
        }
    }

    pub fn finish(self) -> (PackageScope, FxHashMap<DeclRef, Slot>) {
        (self.scope, self.blank_slots)
    }

    /// First name `decl` needs that is not usable yet.
    ///
    /// Values only need the names they mention to be declared. A type
    /// declaration additionally needs the type it is defined from to be
    /// resolved itself.
    fn missing_reference(&self, root: &AstRoot, decl: &Decl) -> Option<(Name, Span)> {
        match root.arena.kind(decl.node) {
            NodeKind::Var { ty, value, .. } => ty
                .as_ref()
                .and_then(|ty| self.missing_type(root, ty, false))
                .or_else(|| {
                    let value = (*value)?;
                    root.arena
                        .references(value)
                        .into_iter()
                        .find_map(|reference| self.missing_value(root, reference))
                }),
            NodeKind::TypeDecl { underlying, .. } => self.missing_type(root, underlying, true),
            NodeKind::Func { params, result, .. } => params
                .iter()
                .find_map(|param| self.missing_type(root, &param.ty, false))
                .or_else(|| {
                    result
                        .as_ref()
                        .and_then(|ty| self.missing_type(root, ty, false))
                }),
            _ => None,
        }
    }

    fn missing_value(&self, root: &AstRoot, reference: Reference) -> Option<(Name, Span)> {
        match reference {
            Reference::Ident(name, span) => {
                let known = self.scope.contains(name)
                    || is_predeclared(self.interner.lookup(name))
                    || root.import_named(name).is_some();
                (!known).then_some((name, span))
            }
            Reference::Qualified { package, span, .. } => {
                let known = root.import_named(package).is_some() || self.scope.contains(package);
                (!known).then_some((package, span))
            }
        }
    }

    fn missing_type(
        &self,
        root: &AstRoot,
        ty: &TypeExpr,
        need_resolved: bool,
    ) -> Option<(Name, Span)> {
        if let Some(package) = ty.package {
            return root
                .import_named(package)
                .is_none()
                .then_some((package, ty.span));
        }
        if is_predeclared(self.interner.lookup(ty.name)) {
            return None;
        }
        match self.scope.get(ty.name) {
            None => Some((ty.name, ty.span)),
            Some(symbol)
                if need_resolved && symbol.kind == SymbolKind::Type && !symbol.resolved =>
            {
                Some((ty.name, ty.span))
            }
            Some(_) => None,
        }
    }
}
