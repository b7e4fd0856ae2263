//! Lightweight types.
//!
//! Tarn only checks what it needs to compile correct code: the three basic
//! types, named types over them, function signatures, and untyped
//! constants. [`resolve_package_types`] computes the type of every
//! package-level declaration once GTA has declared all of them.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tarn_ir::{
    is_exported, AstRoot, Name, NodeId, NodeKind, PackageScope, Span, StringInterner, SymbolKind,
    TypeExpr,
};

use crate::cfg::ImportTable;
use crate::code::Builtin;
use crate::errors::{CfgError, CfgErrorKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Basic {
    Int,
    Str,
    Bool,
}

impl Basic {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Basic::Int),
            "string" => Some(Basic::Str),
            "bool" => Some(Basic::Bool),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Basic::Int => "int",
            Basic::Str => "string",
            Basic::Bool => "bool",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamedTy {
    /// Import path of the declaring package.
    pub package: Arc<str>,
    pub name: Arc<str>,
    pub underlying: Basic,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Ty>,
    pub result: Option<Ty>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Basic(Basic),
    /// Constant expression not yet given a type.
    Untyped(Basic),
    Named(Arc<NamedTy>),
    Func(Arc<Signature>),
    /// Result of a call without a result.
    Void,
    /// Inference gave up (cyclic initializers); checks are skipped.
    Unknown,
}

impl Ty {
    pub const INT: Ty = Ty::Basic(Basic::Int);
    pub const STRING: Ty = Ty::Basic(Basic::Str);
    pub const BOOL: Ty = Ty::Basic(Basic::Bool);

    pub fn underlying(&self) -> Option<Basic> {
        match self {
            Ty::Basic(b) | Ty::Untyped(b) => Some(*b),
            Ty::Named(named) => Some(named.underlying),
            Ty::Func(_) | Ty::Void | Ty::Unknown => None,
        }
    }

    /// Type a value gets when stored without a declared type.
    #[must_use]
    pub fn defaulted(self) -> Ty {
        match self {
            Ty::Untyped(b) => Ty::Basic(b),
            other => other,
        }
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Ty::Untyped(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Unknown)
    }

    /// Whether a value of this type can be used as `underlying`.
    pub fn has_underlying(&self, basic: Basic) -> bool {
        self.is_unknown() || self.underlying() == Some(basic)
    }

    /// Whether a value of type `self` may be stored in a `target`.
    pub fn assignable_to(&self, target: &Ty) -> bool {
        if self == target || self.is_unknown() || target.is_unknown() {
            return true;
        }
        match self {
            Ty::Untyped(b) => target.underlying() == Some(*b),
            _ => false,
        }
    }

    /// Common type of two binary operands.
    pub fn unify(&self, other: &Ty) -> Option<Ty> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Ty::Unknown, t) | (t, Ty::Unknown) => Some(t.clone()),
            (Ty::Untyped(a), t) | (t, Ty::Untyped(a)) if t.underlying() == Some(*a) => {
                Some(t.clone())
            }
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Basic(b) => f.write_str(b.name()),
            Ty::Untyped(b) => write!(f, "untyped {}", b.name()),
            Ty::Named(named) => f.write_str(&named.name),
            Ty::Func(sig) => {
                f.write_str("func(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{param}")?;
                }
                f.write_str(")")?;
                if let Some(result) = &sig.result {
                    write!(f, " {result}")?;
                }
                Ok(())
            }
            Ty::Void => f.write_str("no value"),
            Ty::Unknown => f.write_str("invalid type"),
        }
    }
}

/// Identifiers of the universe scope.
pub fn is_predeclared(name: &str) -> bool {
    Basic::from_name(name).is_some() || Builtin::from_name(name).is_some()
}

/// Types of the package-level declarations of one package.
#[derive(Clone, Debug, Default)]
pub struct PackageTypes {
    /// Declared types.
    types: FxHashMap<Name, Ty>,
    /// Types of vars, consts and funcs.
    values: FxHashMap<Name, Ty>,
}

impl PackageTypes {
    pub fn type_of(&self, name: Name) -> Option<&Ty> {
        self.types.get(&name)
    }

    pub fn value_of(&self, name: Name) -> Option<&Ty> {
        self.values.get(&name)
    }

    pub(crate) fn declared_types(&self) -> &FxHashMap<Name, Ty> {
        &self.types
    }
}

/// What a type expression names, in the context of one file.
pub(crate) struct TypeContext<'a> {
    pub root: &'a AstRoot,
    pub scope: &'a PackageScope,
    pub local_types: &'a FxHashMap<Name, Ty>,
    pub imports: &'a ImportTable,
    pub interner: &'a StringInterner,
}

impl TypeContext<'_> {
    #[cold]
    pub fn error(&self, kind: CfgErrorKind, span: Span) -> CfgError {
        CfgError::new(kind, &self.root.file_name, self.root.position(span))
    }

    /// Resolve a type expression after all package types are known.
    pub fn resolve(&self, ty: &TypeExpr) -> Result<Ty, CfgError> {
        let name = self.interner.lookup(ty.name);
        if let Some(package) = ty.package {
            return self.resolve_imported_type(package, ty.name, ty.span);
        }
        if let Some(found) = self.local_types.get(&ty.name) {
            return Ok(found.clone());
        }
        if self.scope.contains(ty.name) {
            return Err(self.error(
                CfgErrorKind::NotAType {
                    name: name.to_string(),
                },
                ty.span,
            ));
        }
        Basic::from_name(name).map(Ty::Basic).ok_or_else(|| {
            self.error(
                CfgErrorKind::Undefined {
                    name: name.to_string(),
                },
                ty.span,
            )
        })
    }

    pub fn resolve_imported_type(
        &self,
        package: Name,
        member: Name,
        span: Span,
    ) -> Result<Ty, CfgError> {
        let exports = self.imported(package, span)?;
        let member_text = self.interner.lookup(member);
        if !is_exported(member_text) {
            return Err(self.error(
                CfgErrorKind::UnexportedMember {
                    package: self.interner.lookup(package).to_string(),
                    member: member_text.to_string(),
                },
                span,
            ));
        }
        match exports.types.type_of(member) {
            Some(ty) => Ok(ty.clone()),
            None if exports.scope.contains(member) => Err(self.error(
                CfgErrorKind::NotAType {
                    name: format!("{}.{member_text}", self.interner.lookup(package)),
                },
                span,
            )),
            None => Err(self.error(
                CfgErrorKind::UnknownMember {
                    package: self.interner.lookup(package).to_string(),
                    member: member_text.to_string(),
                },
                span,
            )),
        }
    }

    /// The package a file refers to as `package`.
    pub fn imported(
        &self,
        package: Name,
        span: Span,
    ) -> Result<&Arc<crate::cfg::PackageExports>, CfgError> {
        self.root
            .import_named(package)
            .and_then(|(_, import)| import.import_path.as_deref())
            .and_then(|path| self.imports.get(path))
            .ok_or_else(|| {
                self.error(
                    CfgErrorKind::Undefined {
                        name: self.interner.lookup(package).to_string(),
                    },
                    span,
                )
            })
    }
}

/// Compute the types of every declaration in `scope`.
///
/// Runs after GTA, so every name a declaration mentions is declared.
/// Initializers without a declared type are inferred repeatedly until no
/// further progress is made; whatever is left (initialization cycles) is
/// [`Ty::Unknown`] and reported later by the initialization order pass.
#[tracing::instrument(level = "debug", skip_all, fields(package = import_path))]
pub fn resolve_package_types(
    import_path: &str,
    roots: &[AstRoot],
    scope: &PackageScope,
    imports: &ImportTable,
    interner: &StringInterner,
) -> Result<PackageTypes, CfgError> {
    let mut resolver = TypeResolver {
        import_path: Arc::from(import_path),
        roots,
        scope,
        imports,
        interner,
        types: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };

    for symbol in scope.iter().filter(|s| s.kind == SymbolKind::Type) {
        resolver.named_type(symbol.name, symbol.span)?;
    }

    let mut values = FxHashMap::default();
    let mut pending = Vec::new();
    for symbol in scope.iter() {
        let root = &roots[symbol.decl.file as usize];
        let cx = resolver.context(root);
        match (symbol.kind, root.arena.kind(symbol.decl.node)) {
            (SymbolKind::Func, NodeKind::Func { params, result, .. }) => {
                let params = params
                    .iter()
                    .map(|p| cx.resolve(&p.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = result.as_ref().map(|r| cx.resolve(r)).transpose()?;
                values.insert(symbol.name, Ty::Func(Arc::new(Signature { params, result })));
            }
            (SymbolKind::Var | SymbolKind::Const, NodeKind::Var { ty: Some(ty), .. }) => {
                values.insert(symbol.name, cx.resolve(ty)?);
            }
            (SymbolKind::Var | SymbolKind::Const, NodeKind::Var { value: Some(value), .. }) => {
                pending.push((symbol.name, symbol.kind, symbol.decl.file, *value));
            }
            _ => {}
        }
    }

    loop {
        let before = pending.len();
        let mut still_pending = Vec::with_capacity(before);
        for (name, kind, file, value) in pending {
            let root = &roots[file as usize];
            match infer(&resolver.context(root), &values, value) {
                Some(ty) if kind == SymbolKind::Const => {
                    values.insert(name, ty);
                }
                Some(ty) => {
                    values.insert(name, ty.defaulted());
                }
                None => still_pending.push((name, kind, file, value)),
            }
        }
        pending = still_pending;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }
    for (name, ..) in pending {
        values.insert(name, Ty::Unknown);
    }

    tracing::debug!(types = resolver.types.len(), values = values.len(), "resolved types");
    Ok(PackageTypes {
        types: resolver.types,
        values,
    })
}

struct TypeResolver<'a> {
    import_path: Arc<str>,
    roots: &'a [AstRoot],
    scope: &'a PackageScope,
    imports: &'a ImportTable,
    interner: &'a StringInterner,
    types: FxHashMap<Name, Ty>,
    in_progress: FxHashSet<Name>,
}

impl<'a> TypeResolver<'a> {
    fn context<'b>(&'b self, root: &'b AstRoot) -> TypeContext<'b> {
        TypeContext {
            root,
            scope: self.scope,
            local_types: &self.types,
            imports: self.imports,
            interner: self.interner,
        }
    }

    fn named_type(&mut self, name: Name, use_span: Span) -> Result<Ty, CfgError> {
        if let Some(ty) = self.types.get(&name) {
            return Ok(ty.clone());
        }
        let Some(symbol) = self.scope.get(name) else {
            return Ok(Ty::Unknown);
        };
        let roots = self.roots;
        let root = &roots[symbol.decl.file as usize];
        let NodeKind::TypeDecl { underlying, .. } = root.arena.kind(symbol.decl.node) else {
            return Err(self.context(root).error(
                CfgErrorKind::NotAType {
                    name: self.interner.lookup(name).to_string(),
                },
                use_span,
            ));
        };
        if !self.in_progress.insert(name) {
            return Err(self.context(root).error(
                CfgErrorKind::RecursiveType {
                    name: self.interner.lookup(name).to_string(),
                },
                symbol.span,
            ));
        }

        let target = self.underlying_of(root, underlying)?;
        let Some(basic) = target.underlying() else {
            return Err(self.context(root).error(
                CfgErrorKind::NotAType {
                    name: self.interner.lookup(underlying.name).to_string(),
                },
                underlying.span,
            ));
        };
        let ty = Ty::Named(Arc::new(NamedTy {
            package: Arc::clone(&self.import_path),
            name: Arc::from(self.interner.lookup(name)),
            underlying: basic,
        }));
        self.in_progress.remove(&name);
        self.types.insert(name, ty.clone());
        Ok(ty)
    }

    fn underlying_of(&mut self, root: &AstRoot, ty: &TypeExpr) -> Result<Ty, CfgError> {
        if ty.package.is_none()
            && self
                .scope
                .get(ty.name)
                .is_some_and(|s| s.kind == SymbolKind::Type)
        {
            return self.named_type(ty.name, ty.span);
        }
        self.context(root).resolve(ty)
    }
}

/// Shallow type of a package-level initializer.
///
/// `None` means it depends on a variable whose type is not known yet.
/// Errors are left to the CFG builder, which sees the same expression.
fn infer(cx: &TypeContext<'_>, values: &FxHashMap<Name, Ty>, expr: NodeId) -> Option<Ty> {
    let arena = &cx.root.arena;
    match arena.kind(expr) {
        NodeKind::Int(_) => Some(Ty::Untyped(Basic::Int)),
        NodeKind::Str(_) => Some(Ty::Untyped(Basic::Str)),
        NodeKind::Bool(_) => Some(Ty::Untyped(Basic::Bool)),
        NodeKind::Ident(name) => match cx.scope.get(*name) {
            Some(symbol) if symbol.kind.has_value() => values.get(name).cloned(),
            _ => Some(Ty::Unknown),
        },
        NodeKind::Selector { base, member } => Some(
            cx.imported(*base, Span::DUMMY)
                .ok()
                .and_then(|exports| exports.types.value_of(*member).cloned())
                .unwrap_or(Ty::Unknown),
        ),
        NodeKind::Unary { operand, .. } => infer(cx, values, *operand),
        NodeKind::Binary { op, lhs, rhs } => {
            let lhs = infer(cx, values, *lhs)?;
            let rhs = infer(cx, values, *rhs)?;
            if op.is_comparison() {
                Some(Ty::Untyped(Basic::Bool))
            } else {
                Some(lhs.unify(&rhs).unwrap_or(Ty::Unknown))
            }
        }
        NodeKind::Call { callee, .. } => infer_call(cx, values, *callee),
        _ => Some(Ty::Unknown),
    }
}

fn infer_call(cx: &TypeContext<'_>, values: &FxHashMap<Name, Ty>, callee: NodeId) -> Option<Ty> {
    let callee_ty = match cx.root.arena.kind(callee) {
        NodeKind::Ident(name) => {
            if let Some(ty) = cx.local_types.get(name) {
                return Some(ty.clone());
            }
            if cx.scope.get(*name).is_none() {
                let text = cx.interner.lookup(*name);
                if let Some(basic) = Basic::from_name(text) {
                    return Some(Ty::Basic(basic));
                }
                return match Builtin::from_name(text) {
                    Some(Builtin::Len) => Some(Ty::INT),
                    Some(_) => Some(Ty::Void),
                    None => Some(Ty::Unknown),
                };
            }
            infer(cx, values, callee)?
        }
        NodeKind::Selector { base, member } => {
            if let Ok(ty) = cx.resolve_imported_type(*base, *member, Span::DUMMY) {
                return Some(ty);
            }
            infer(cx, values, callee)?
        }
        _ => infer(cx, values, callee)?,
    };
    match callee_ty {
        Ty::Func(sig) => Some(sig.result.clone().unwrap_or(Ty::Void)),
        _ => Some(Ty::Unknown),
    }
}

#[cfg(test)]
mod tests;
