//! CFG builder.
//!
//! Compiles one file of a package into executable [`Routine`]s once GTA has
//! declared every package-level name of the package. Produces a
//! [`FileUnit`]: the file wrapper that binds the file's imports, the
//! compiled functions, the global initializers with the package-level names
//! they reference, and the file's `init` functions in textual order.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tarn_ir::{
    ensure_sufficient_stack, is_exported, AstRoot, BinaryOp, DeclKind, DeclRef, Name, NodeId,
    NodeKind, PackageScope, Param, Position, Slot, Span, StringInterner, SymbolKind, TypeExpr,
    UnaryOp, BLANK_IDENT,
};

use crate::code::{
    Args, Builtin, Expr, ExprKind, FileContext, Place, Routine, RoutineKind, Stmt, StmtKind,
};
use crate::errors::{CfgError, CfgErrorKind};
use crate::types::{Basic, PackageTypes, Signature, Ty, TypeContext};
use crate::Value;

/// What importers see of a registered package.
#[derive(Debug)]
pub struct PackageExports {
    pub import_path: String,
    pub name: Name,
    pub scope: Arc<PackageScope>,
    pub types: Arc<PackageTypes>,
}

/// Loaded packages by import path.
pub type ImportTable = FxHashMap<String, Arc<PackageExports>>;

/// Everything the builder needs to know about the package being compiled.
pub struct PackageEnv<'a> {
    pub import_path: &'a str,
    pub scope: &'a PackageScope,
    pub types: &'a PackageTypes,
    /// Slots of `_` variables, which are not in the scope.
    pub blank_slots: &'a FxHashMap<DeclRef, Slot>,
    pub imports: &'a ImportTable,
    pub interner: &'a StringInterner,
}

/// Initializer of one package-level variable or constant.
#[derive(Debug)]
pub struct GlobalInit {
    pub name: Name,
    pub routine: Arc<Routine>,
    /// Package-level names the initializer references, in first-use order.
    pub refs: Vec<Name>,
    pub file: String,
    pub position: Position,
}

/// Executable form of one file.
#[derive(Debug)]
pub struct FileUnit {
    pub file_name: String,
    /// Binds the file's imports; runs before anything else of the file.
    pub wrapper: Arc<Routine>,
    pub functions: Vec<(Name, Slot, Arc<Routine>)>,
    pub globals: Vec<GlobalInit>,
    /// Package-level names each function body references.
    pub func_refs: FxHashMap<Name, Vec<Name>>,
    /// `func init()` bodies in textual order.
    pub init_nodes: Vec<Arc<Routine>>,
}

impl FileUnit {
    pub fn function(&self, name: Name) -> Option<&Arc<Routine>> {
        self.functions
            .iter()
            .find(|(n, ..)| *n == name)
            .map(|(_, _, routine)| routine)
    }
}

/// Build the executable form of `root`, the `file`-th file of the package.
#[tracing::instrument(level = "debug", skip_all, fields(file = %root.file_name))]
pub fn build_cfg(root: &AstRoot, file: u32, env: &PackageEnv<'_>) -> Result<FileUnit, CfgError> {
    let package_name = env.interner.lookup(env.scope.package());
    let context = Arc::new(FileContext::new(
        root.file_name.as_str(),
        root.line_index.clone(),
        root.imports
            .iter()
            .map(|i| i.import_path.clone().unwrap_or_else(|| i.spec.path.clone())),
    ));

    let wrapper = Arc::new(Routine {
        name: format!("{package_name}.<file {}>", root.file_name),
        kind: RoutineKind::Wrapper,
        context: Arc::clone(&context),
        params: 0,
        locals: 0,
        body: root
            .imports
            .iter()
            .enumerate()
            .map(|(i, import)| Stmt {
                kind: StmtKind::BindImport(u32::try_from(i).unwrap_or(u32::MAX)),
                span: import.spec.span,
            })
            .collect(),
        span: Span::DUMMY,
    });

    let mut unit = FileUnit {
        file_name: root.file_name.clone(),
        wrapper,
        functions: Vec::new(),
        globals: Vec::new(),
        func_refs: FxHashMap::default(),
        init_nodes: Vec::new(),
    };

    for decl in &root.decls {
        let mut compiler = FnCompiler::new(root, env, &context);
        let display = format!("{package_name}.{}", env.interner.lookup(decl.name));
        match (decl.kind, root.arena.kind(decl.node)) {
            (DeclKind::Var | DeclKind::Const, NodeKind::Var { name, ty, value, constant }) => {
                let slot = if env.interner.lookup(*name) == BLANK_IDENT {
                    env.blank_slots
                        .get(&DeclRef {
                            file,
                            node: decl.node,
                        })
                        .copied()
                } else {
                    env.scope.get(*name).and_then(|s| s.slot)
                };
                let Some(slot) = slot else {
                    return Err(compiler.error(
                        CfgErrorKind::Undefined {
                            name: env.interner.lookup(*name).to_string(),
                        },
                        decl.span,
                    ));
                };
                let routine = compiler.global_init(
                    display,
                    *name,
                    slot,
                    ty.as_ref(),
                    *value,
                    *constant,
                    decl.span,
                )?;
                unit.globals.push(GlobalInit {
                    name: *name,
                    routine: Arc::new(routine),
                    refs: compiler.refs,
                    file: root.file_name.clone(),
                    position: root.position(decl.span),
                });
            }
            (DeclKind::Func | DeclKind::Init, NodeKind::Func { params, result, body, .. }) => {
                let kind = if decl.kind == DeclKind::Init {
                    RoutineKind::Init
                } else {
                    RoutineKind::Function
                };
                let routine = Arc::new(compiler.function(
                    display,
                    kind,
                    params,
                    result.as_ref(),
                    *body,
                    decl.span,
                )?);
                if decl.kind == DeclKind::Init {
                    unit.init_nodes.push(routine);
                } else {
                    let slot = env.scope.get(decl.name).and_then(|s| s.slot);
                    let Some(slot) = slot else {
                        return Err(compiler.error(
                            CfgErrorKind::Undefined {
                                name: env.interner.lookup(decl.name).to_string(),
                            },
                            decl.span,
                        ));
                    };
                    unit.func_refs.insert(decl.name, compiler.refs);
                    unit.functions.push((decl.name, slot, routine));
                }
            }
            _ => {}
        }
    }

    tracing::debug!(
        functions = unit.functions.len(),
        globals = unit.globals.len(),
        inits = unit.init_nodes.len(),
        "built cfg"
    );
    Ok(unit)
}

#[derive(Clone)]
struct Local {
    index: u32,
    ty: Ty,
}

/// What an identifier or selector resolved to.
enum Resolved {
    Local(Local),
    Global {
        slot: Slot,
        name: Arc<str>,
        kind: SymbolKind,
        ty: Ty,
    },
    Imported {
        import: u32,
        slot: Slot,
        name: Arc<str>,
        kind: SymbolKind,
        ty: Ty,
    },
    Type(Ty),
    Builtin(Builtin),
}

struct FnCompiler<'a> {
    root: &'a AstRoot,
    env: &'a PackageEnv<'a>,
    types: TypeContext<'a>,
    context: &'a Arc<FileContext>,
    scopes: Vec<FxHashMap<Name, Local>>,
    next_local: u32,
    loop_depth: u32,
    result: Option<Ty>,
    name: String,
    refs: Vec<Name>,
    seen_refs: FxHashSet<Name>,
}

impl<'a> FnCompiler<'a> {
    fn new(root: &'a AstRoot, env: &'a PackageEnv<'a>, context: &'a Arc<FileContext>) -> Self {
        FnCompiler {
            root,
            env,
            types: TypeContext {
                root,
                scope: env.scope,
                local_types: env.types.declared_types(),
                imports: env.imports,
                interner: env.interner,
            },
            context,
            scopes: vec![FxHashMap::default()],
            next_local: 0,
            loop_depth: 0,
            result: None,
            name: String::new(),
            refs: Vec::new(),
            seen_refs: FxHashSet::default(),
        }
    }

    #[cold]
    fn error(&self, kind: CfgErrorKind, span: Span) -> CfgError {
        CfgError::new(kind, &self.root.file_name, self.root.position(span))
    }

    fn text(&self, name: Name) -> &'static str {
        self.env.interner.lookup(name)
    }

    fn source(&self, id: NodeId) -> String {
        describe(self.root, self.env.interner, id)
    }

    fn routine(
        &self,
        name: String,
        kind: RoutineKind,
        params: usize,
        body: Vec<Stmt>,
        span: Span,
    ) -> Routine {
        Routine {
            name,
            kind,
            context: Arc::clone(self.context),
            params,
            locals: self.next_local as usize,
            body,
            span,
        }
    }

    // === Declarations ===

    #[allow(clippy::too_many_arguments)]
    fn global_init(
        &mut self,
        display: String,
        name: Name,
        slot: Slot,
        ty: Option<&TypeExpr>,
        value: Option<NodeId>,
        constant: bool,
        span: Span,
    ) -> Result<Routine, CfgError> {
        self.name.clone_from(&display);
        let declared = ty.map(|t| self.types.resolve(t)).transpose()?;
        let (value_expr, value_ty) = match value {
            Some(value) => {
                if constant {
                    if let Some(offender) = self.non_constant(value) {
                        return Err(self.error(
                            CfgErrorKind::NotConstant { name: offender },
                            self.root.arena.span(value),
                        ));
                    }
                }
                let (expr, found) = self.value(value)?;
                (expr, Some(found))
            }
            None => {
                let ty = declared.clone().unwrap_or(Ty::Unknown);
                (zero_value(&ty, span), None)
            }
        };
        if let (Some(declared), Some(found)) = (&declared, &value_ty) {
            self.check_assignable(found, declared, "variable declaration", value_expr.span)?;
        }
        let place = Place::Global {
            slot,
            name: Arc::from(self.text(name)),
        };
        let body = vec![Stmt {
            kind: StmtKind::Assign {
                place,
                op: None,
                value: value_expr,
            },
            span,
        }];
        Ok(self.routine(display, RoutineKind::GlobalInit, 0, body, span))
    }

    fn function(
        &mut self,
        display: String,
        kind: RoutineKind,
        params: &[Param],
        result: Option<&TypeExpr>,
        body: NodeId,
        span: Span,
    ) -> Result<Routine, CfgError> {
        self.name.clone_from(&display);
        self.result = result.map(|r| self.types.resolve(r)).transpose()?;
        for param in params {
            let ty = self.types.resolve(&param.ty)?;
            self.declare_local(param.name, ty, param.span)?;
        }
        let NodeKind::Block(stmts) = self.root.arena.kind(body) else {
            return Err(self.error(
                CfgErrorKind::NotUsed {
                    what: self.source(body),
                },
                self.root.arena.span(body),
            ));
        };
        let mut out = Vec::new();
        self.scopes.push(FxHashMap::default());
        for &stmt in stmts {
            self.stmt(stmt, &mut out)?;
        }
        self.scopes.pop();

        if self.result.is_some() && !self.terminates(body) {
            let end = self.root.arena.span(body);
            return Err(self.error(
                CfgErrorKind::MissingReturn {
                    func: display,
                },
                Span::new(end.end.saturating_sub(1), end.end),
            ));
        }
        Ok(self.routine(display, kind, params.len(), out, span))
    }

    // === Scopes ===

    fn declare_local(&mut self, name: Name, ty: Ty, span: Span) -> Result<u32, CfgError> {
        let index = self.next_local;
        self.next_local += 1;
        if self.text(name) == BLANK_IDENT {
            return Ok(index);
        }
        let scope = self.scopes.last_mut();
        let Some(scope) = scope else {
            return Ok(index);
        };
        if scope.contains_key(&name) {
            return Err(self.error(
                CfgErrorKind::Redeclared {
                    name: self.text(name).to_string(),
                },
                span,
            ));
        }
        scope.insert(name, Local { index, ty });
        Ok(index)
    }

    fn lookup_local(&self, name: Name) -> Option<&Local> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&name))
    }

    fn record_ref(&mut self, name: Name) {
        if self.seen_refs.insert(name) {
            self.refs.push(name);
        }
    }

    fn resolve_ident(&mut self, name: Name, span: Span) -> Result<Resolved, CfgError> {
        if let Some(local) = self.lookup_local(name) {
            return Ok(Resolved::Local(local.clone()));
        }
        let text = self.text(name);
        if text == BLANK_IDENT {
            return Err(self.error(
                CfgErrorKind::NotAValue {
                    name: BLANK_IDENT.to_string(),
                },
                span,
            ));
        }
        if let Some(symbol) = self.env.scope.get(name) {
            if symbol.kind == SymbolKind::Type {
                let ty = self.env.types.type_of(name).cloned().unwrap_or(Ty::Unknown);
                return Ok(Resolved::Type(ty));
            }
            let (kind, slot) = (symbol.kind, symbol.slot);
            let Some(slot) = slot else {
                return Err(self.error(CfgErrorKind::Undefined { name: text.to_string() }, span));
            };
            self.record_ref(name);
            let ty = self.env.types.value_of(name).cloned().unwrap_or(Ty::Unknown);
            return Ok(Resolved::Global {
                slot,
                name: Arc::from(text),
                kind,
                ty,
            });
        }
        if self.root.import_named(name).is_some() {
            return Err(self.error(
                CfgErrorKind::PackageWithoutSelector {
                    name: text.to_string(),
                },
                span,
            ));
        }
        if let Some(basic) = Basic::from_name(text) {
            return Ok(Resolved::Type(Ty::Basic(basic)));
        }
        if let Some(builtin) = Builtin::from_name(text) {
            return Ok(Resolved::Builtin(builtin));
        }
        Err(self.error(CfgErrorKind::Undefined { name: text.to_string() }, span))
    }

    fn resolve_selector(
        &mut self,
        base: Name,
        member: Name,
        span: Span,
    ) -> Result<Resolved, CfgError> {
        let base_text = self.text(base);
        let member_text = self.text(member);
        if self.lookup_local(base).is_some() || self.env.scope.contains(base) {
            return Err(self.error(
                CfgErrorKind::Undefined {
                    name: format!("{base_text}.{member_text}"),
                },
                span,
            ));
        }
        let Some((index, _)) = self.root.import_named(base) else {
            return Err(self.error(CfgErrorKind::Undefined { name: base_text.to_string() }, span));
        };
        let exports = self.types.imported(base, span)?;
        if !is_exported(member_text) {
            return Err(self.error(
                CfgErrorKind::UnexportedMember {
                    package: base_text.to_string(),
                    member: member_text.to_string(),
                },
                span,
            ));
        }
        let Some(symbol) = exports.scope.get(member) else {
            return Err(self.error(
                CfgErrorKind::UnknownMember {
                    package: base_text.to_string(),
                    member: member_text.to_string(),
                },
                span,
            ));
        };
        if symbol.kind == SymbolKind::Type {
            let ty = exports.types.type_of(member).cloned().unwrap_or(Ty::Unknown);
            return Ok(Resolved::Type(ty));
        }
        let Some(slot) = symbol.slot else {
            return Err(self.error(
                CfgErrorKind::UnknownMember {
                    package: base_text.to_string(),
                    member: member_text.to_string(),
                },
                span,
            ));
        };
        Ok(Resolved::Imported {
            import: u32::try_from(index).unwrap_or(u32::MAX),
            slot,
            name: Arc::from(format!("{base_text}.{member_text}")),
            kind: symbol.kind,
            ty: exports.types.value_of(member).cloned().unwrap_or(Ty::Unknown),
        })
    }

    // === Statements ===

    fn stmt(&mut self, id: NodeId, out: &mut Vec<Stmt>) -> Result<(), CfgError> {
        ensure_sufficient_stack(|| self.stmt_inner(id, out))
    }

    fn block(&mut self, id: NodeId) -> Result<Vec<Stmt>, CfgError> {
        let mut out = Vec::new();
        self.scopes.push(FxHashMap::default());
        let result = self.stmt(id, &mut out);
        self.scopes.pop();
        result.map(|()| out)
    }

    fn stmt_inner(&mut self, id: NodeId, out: &mut Vec<Stmt>) -> Result<(), CfgError> {
        let root = self.root;
        let span = root.arena.span(id);
        match root.arena.kind(id) {
            NodeKind::Block(stmts) => {
                self.scopes.push(FxHashMap::default());
                for &stmt in stmts {
                    if let Err(e) = self.stmt(stmt, out) {
                        self.scopes.pop();
                        return Err(e);
                    }
                }
                self.scopes.pop();
            }
            NodeKind::LocalVar { name, ty, value } => {
                let declared = ty.as_ref().map(|t| self.types.resolve(t)).transpose()?;
                let (value, ty) = match value {
                    Some(value) => {
                        let (expr, found) = self.value(*value)?;
                        if let Some(declared) = &declared {
                            self.check_assignable(
                                &found,
                                declared,
                                "variable declaration",
                                expr.span,
                            )?;
                            (expr, declared.clone())
                        } else {
                            (expr, found.defaulted())
                        }
                    }
                    None => {
                        let ty = declared.unwrap_or(Ty::Unknown);
                        (zero_value(&ty, span), ty)
                    }
                };
                let place = if self.text(*name) == BLANK_IDENT {
                    Place::Discard
                } else {
                    Place::Local(self.declare_local(*name, ty, span)?)
                };
                out.push(Stmt {
                    kind: StmtKind::Assign {
                        place,
                        op: None,
                        value,
                    },
                    span,
                });
            }
            NodeKind::Assign { target, op, value } => {
                let (place, target_ty) = self.place(*target)?;
                let (value, found) = self.value(*value)?;
                if let Some(op) = op {
                    self.binary_type(*op, &target_ty, &found, span)?;
                } else if !matches!(place, Place::Discard) {
                    self.check_assignable(&found, &target_ty, "assignment", value.span)?;
                }
                out.push(Stmt {
                    kind: StmtKind::Assign {
                        place,
                        op: *op,
                        value,
                    },
                    span,
                });
            }
            NodeKind::If {
                init,
                cond,
                then_branch,
                else_branch,
            } => {
                self.scopes.push(FxHashMap::default());
                let result = self.if_stmt(*init, *cond, *then_branch, *else_branch, span, out);
                self.scopes.pop();
                result?;
            }
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.scopes.push(FxHashMap::default());
                let result = self.for_stmt(*init, *cond, *post, *body, span, out);
                self.scopes.pop();
                result?;
            }
            NodeKind::Return(value) => {
                let value = match (value, self.result.clone()) {
                    (None, None) => None,
                    (Some(value), Some(expected)) => {
                        let (expr, found) = self.value(*value)?;
                        self.check_assignable(&found, &expected, "return statement", expr.span)?;
                        Some(expr)
                    }
                    (Some(_), None) => {
                        return Err(self.error(
                            CfgErrorKind::ReturnCount {
                                func: self.name.clone(),
                                message: "too many return values",
                            },
                            span,
                        ));
                    }
                    (None, Some(_)) => {
                        return Err(self.error(
                            CfgErrorKind::ReturnCount {
                                func: self.name.clone(),
                                message: "not enough return values",
                            },
                            span,
                        ));
                    }
                };
                out.push(Stmt {
                    kind: StmtKind::Return(value),
                    span,
                });
            }
            NodeKind::Break | NodeKind::Continue => {
                let is_break = matches!(root.arena.kind(id), NodeKind::Break);
                if self.loop_depth == 0 {
                    return Err(self.error(
                        CfgErrorKind::BranchOutsideLoop {
                            keyword: if is_break { "break" } else { "continue" },
                        },
                        span,
                    ));
                }
                out.push(Stmt {
                    kind: if is_break {
                        StmtKind::Break
                    } else {
                        StmtKind::Continue
                    },
                    span,
                });
            }
            NodeKind::ExprStmt(expr) => {
                if !matches!(root.arena.kind(*expr), NodeKind::Call { .. }) {
                    return Err(self.error(
                        CfgErrorKind::NotUsed {
                            what: self.source(*expr),
                        },
                        span,
                    ));
                }
                let (expr, _) = self.expr(*expr)?;
                out.push(Stmt {
                    kind: StmtKind::Expr(expr),
                    span,
                });
            }
            _ => {
                return Err(self.error(
                    CfgErrorKind::NotUsed {
                        what: self.source(id),
                    },
                    span,
                ));
            }
        }
        Ok(())
    }

    fn if_stmt(
        &mut self,
        init: Option<NodeId>,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
        span: Span,
        out: &mut Vec<Stmt>,
    ) -> Result<(), CfgError> {
        if let Some(init) = init {
            self.stmt(init, out)?;
        }
        let cond = self.condition(cond)?;
        let then_branch = self.block(then_branch)?;
        let else_branch = match else_branch {
            Some(branch) => self.block(branch)?,
            None => Vec::new(),
        };
        out.push(Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            span,
        });
        Ok(())
    }

    fn for_stmt(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
        body: NodeId,
        span: Span,
        out: &mut Vec<Stmt>,
    ) -> Result<(), CfgError> {
        if let Some(init) = init {
            self.stmt(init, out)?;
        }
        let cond = cond.map(|c| self.condition(c)).transpose()?;
        let mut post_stmts = Vec::new();
        if let Some(post) = post {
            self.stmt(post, &mut post_stmts)?;
        }
        self.loop_depth += 1;
        let body = self.block(body);
        self.loop_depth -= 1;
        out.push(Stmt {
            kind: StmtKind::Loop {
                cond,
                body: body?,
                post: post_stmts,
            },
            span,
        });
        Ok(())
    }

    fn condition(&mut self, id: NodeId) -> Result<Expr, CfgError> {
        let (expr, ty) = self.value(id)?;
        if !ty.has_underlying(Basic::Bool) {
            return Err(self.error(
                CfgErrorKind::NonBooleanCondition {
                    found: ty.to_string(),
                },
                expr.span,
            ));
        }
        Ok(expr)
    }

    fn place(&mut self, target: NodeId) -> Result<(Place, Ty), CfgError> {
        let span = self.root.arena.span(target);
        let resolved = match self.root.arena.kind(target) {
            NodeKind::Ident(name) if self.text(*name) == BLANK_IDENT => {
                return Ok((Place::Discard, Ty::Unknown));
            }
            NodeKind::Ident(name) => self.resolve_ident(*name, span)?,
            NodeKind::Selector { base, member } => self.resolve_selector(*base, *member, span)?,
            _ => {
                return Err(self.error(
                    CfgErrorKind::NotAssignable {
                        name: self.source(target),
                        what: "value",
                    },
                    span,
                ));
            }
        };
        let not_assignable = |what| CfgErrorKind::NotAssignable {
            name: describe(self.root, self.env.interner, target),
            what,
        };
        match resolved {
            Resolved::Local(local) => Ok((Place::Local(local.index), local.ty)),
            Resolved::Global {
                slot,
                name,
                kind: SymbolKind::Var,
                ty,
            } => Ok((Place::Global { slot, name }, ty)),
            Resolved::Imported {
                import,
                slot,
                name,
                kind: SymbolKind::Var,
                ty,
            } => Ok((Place::Imported { import, slot, name }, ty)),
            Resolved::Global { kind, .. } | Resolved::Imported { kind, .. } => {
                Err(self.error(not_assignable(kind.describe()), span))
            }
            Resolved::Type(_) => Err(self.error(not_assignable("type"), span)),
            Resolved::Builtin(_) => Err(self.error(not_assignable("built-in function"), span)),
        }
    }

    // === Expressions ===

    /// Compile an expression used as a value.
    fn value(&mut self, id: NodeId) -> Result<(Expr, Ty), CfgError> {
        let (expr, ty) = self.expr(id)?;
        if ty == Ty::Void {
            return Err(self.error(
                CfgErrorKind::NoValue {
                    call: self.source(id),
                },
                expr.span,
            ));
        }
        Ok((expr, ty))
    }

    fn expr(&mut self, id: NodeId) -> Result<(Expr, Ty), CfgError> {
        ensure_sufficient_stack(|| self.expr_inner(id))
    }

    fn expr_inner(&mut self, id: NodeId) -> Result<(Expr, Ty), CfgError> {
        let root = self.root;
        let span = root.arena.span(id);
        let at = |kind| Expr { kind, span };
        match root.arena.kind(id) {
            NodeKind::Int(n) => Ok((at(ExprKind::Const(Value::Int(*n))), Ty::Untyped(Basic::Int))),
            NodeKind::Str(s) => Ok((
                at(ExprKind::Const(Value::string(s.as_str()))),
                Ty::Untyped(Basic::Str),
            )),
            NodeKind::Bool(b) => Ok((
                at(ExprKind::Const(Value::Bool(*b))),
                Ty::Untyped(Basic::Bool),
            )),
            NodeKind::Ident(name) => {
                let resolved = self.resolve_ident(*name, span)?;
                self.load(resolved, id, span)
            }
            NodeKind::Selector { base, member } => {
                let resolved = self.resolve_selector(*base, *member, span)?;
                self.load(resolved, id, span)
            }
            NodeKind::Unary { op, operand } => {
                let (operand, ty) = self.value(*operand)?;
                let basic = match op {
                    UnaryOp::Neg => Basic::Int,
                    UnaryOp::Not => Basic::Bool,
                };
                if !ty.has_underlying(basic) {
                    return Err(self.error(
                        CfgErrorKind::InvalidOperation {
                            op: op.symbol(),
                            ty: ty.to_string(),
                        },
                        span,
                    ));
                }
                Ok((
                    at(ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    }),
                    ty,
                ))
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let (lhs, lhs_ty) = self.value(*lhs)?;
                let (rhs, rhs_ty) = self.value(*rhs)?;
                let ty = self.binary_type(*op, &lhs_ty, &rhs_ty, span)?;
                Ok((
                    at(ExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }),
                    ty,
                ))
            }
            NodeKind::Call { callee, args } => self.call(*callee, args, span),
            _ => Err(self.error(
                CfgErrorKind::NotAValue {
                    name: self.source(id),
                },
                span,
            )),
        }
    }

    fn load(&mut self, resolved: Resolved, id: NodeId, span: Span) -> Result<(Expr, Ty), CfgError> {
        let at = |kind| Expr { kind, span };
        match resolved {
            Resolved::Local(local) => Ok((at(ExprKind::Local(local.index)), local.ty)),
            Resolved::Global { slot, name, ty, .. } => {
                Ok((at(ExprKind::Global { slot, name }), ty))
            }
            Resolved::Imported {
                import,
                slot,
                name,
                ty,
                ..
            } => Ok((at(ExprKind::Imported { import, slot, name }), ty)),
            Resolved::Type(_) => Err(self.error(
                CfgErrorKind::NotAValue {
                    name: self.source(id),
                },
                span,
            )),
            Resolved::Builtin(builtin) => Err(self.error(
                CfgErrorKind::NotAValue {
                    name: builtin.name().to_string(),
                },
                span,
            )),
        }
    }

    fn call(
        &mut self,
        callee: NodeId,
        args: &[NodeId],
        span: Span,
    ) -> Result<(Expr, Ty), CfgError> {
        let callee_span = self.root.arena.span(callee);
        let resolved = match self.root.arena.kind(callee) {
            NodeKind::Ident(name) => Some(self.resolve_ident(*name, callee_span)?),
            NodeKind::Selector { base, member } => {
                Some(self.resolve_selector(*base, *member, callee_span)?)
            }
            _ => None,
        };

        match resolved {
            Some(Resolved::Builtin(builtin)) => return self.builtin_call(builtin, args, span),
            Some(Resolved::Type(target)) => return self.conversion(callee, target, args, span),
            _ => {}
        }

        let (callee_expr, callee_ty) = match resolved {
            Some(resolved) => self.load(resolved, callee, callee_span)?,
            None => self.value(callee)?,
        };
        let mut compiled: Args = Vec::with_capacity(args.len());
        let result = match &callee_ty {
            Ty::Func(sig) => {
                let sig: Arc<Signature> = Arc::clone(sig);
                if sig.params.len() != args.len() {
                    return Err(self.error(
                        CfgErrorKind::ArgumentCount {
                            callee: self.source(callee),
                            expected: sig.params.len(),
                            got: args.len(),
                        },
                        span,
                    ));
                }
                for (arg, param) in args.iter().zip(&sig.params) {
                    let (expr, found) = self.value(*arg)?;
                    let context = format!("argument to {}", self.source(callee));
                    self.check_assignable(&found, param, &context, expr.span)?;
                    compiled.push(expr);
                }
                sig.result.clone().unwrap_or(Ty::Void)
            }
            Ty::Unknown => {
                for arg in args {
                    compiled.push(self.value(*arg)?.0);
                }
                Ty::Unknown
            }
            other => {
                return Err(self.error(
                    CfgErrorKind::NotCallable {
                        what: format!("{} (value of type {other})", self.source(callee)),
                    },
                    span,
                ));
            }
        };
        Ok((
            Expr {
                kind: ExprKind::Call {
                    callee: Box::new(callee_expr),
                    args: compiled,
                },
                span,
            },
            result,
        ))
    }

    fn builtin_call(
        &mut self,
        builtin: Builtin,
        args: &[NodeId],
        span: Span,
    ) -> Result<(Expr, Ty), CfgError> {
        let expect_args = |this: &Self, want: usize| {
            if args.len() == want {
                Ok(())
            } else {
                Err(this.error(
                    CfgErrorKind::ArgumentCount {
                        callee: builtin.name().to_string(),
                        expected: want,
                        got: args.len(),
                    },
                    span,
                ))
            }
        };
        let mut compiled: Args = Vec::with_capacity(args.len());
        let result = match builtin {
            Builtin::Println | Builtin::Print => {
                for arg in args {
                    compiled.push(self.value(*arg)?.0);
                }
                Ty::Void
            }
            Builtin::Panic => {
                expect_args(self, 1)?;
                compiled.push(self.value(args[0])?.0);
                Ty::Void
            }
            Builtin::Len => {
                expect_args(self, 1)?;
                let (expr, ty) = self.value(args[0])?;
                if !ty.has_underlying(Basic::Str) {
                    return Err(self.error(
                        CfgErrorKind::TypeMismatch {
                            context: "argument to len".to_string(),
                            expected: "string".to_string(),
                            found: ty.to_string(),
                        },
                        expr.span,
                    ));
                }
                compiled.push(expr);
                Ty::INT
            }
        };
        Ok((
            Expr {
                kind: ExprKind::Builtin {
                    builtin,
                    args: compiled,
                },
                span,
            },
            result,
        ))
    }

    /// `T(x)`: values keep their representation across conversions.
    fn conversion(
        &mut self,
        callee: NodeId,
        target: Ty,
        args: &[NodeId],
        span: Span,
    ) -> Result<(Expr, Ty), CfgError> {
        if args.len() != 1 {
            return Err(self.error(
                CfgErrorKind::ArgumentCount {
                    callee: self.source(callee),
                    expected: 1,
                    got: args.len(),
                },
                span,
            ));
        }
        let (mut expr, found) = self.value(args[0])?;
        let convertible = found.is_unknown()
            || target.is_unknown()
            || (found.underlying().is_some() && found.underlying() == target.underlying());
        if !convertible {
            return Err(self.error(
                CfgErrorKind::TypeMismatch {
                    context: "conversion".to_string(),
                    expected: target.to_string(),
                    found: found.to_string(),
                },
                span,
            ));
        }
        expr.span = span;
        Ok((expr, target))
    }

    fn binary_type(&self, op: BinaryOp, lhs: &Ty, rhs: &Ty, span: Span) -> Result<Ty, CfgError> {
        let Some(ty) = lhs.unify(rhs) else {
            return Err(self.error(
                CfgErrorKind::MismatchedTypes {
                    op: op.symbol(),
                    left: lhs.to_string(),
                    right: rhs.to_string(),
                },
                span,
            ));
        };
        let supported = match op {
            BinaryOp::And | BinaryOp::Or => ty.has_underlying(Basic::Bool),
            BinaryOp::Eq | BinaryOp::NotEq => ty.is_unknown() || ty.underlying().is_some(),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::Add => {
                ty.has_underlying(Basic::Int) || ty.has_underlying(Basic::Str)
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                ty.has_underlying(Basic::Int)
            }
        };
        if !supported {
            return Err(self.error(
                CfgErrorKind::InvalidOperation {
                    op: op.symbol(),
                    ty: ty.to_string(),
                },
                span,
            ));
        }
        if op.is_comparison() {
            Ok(Ty::Untyped(Basic::Bool))
        } else {
            Ok(ty)
        }
    }

    fn check_assignable(
        &self,
        found: &Ty,
        expected: &Ty,
        context: &str,
        span: Span,
    ) -> Result<(), CfgError> {
        if found.assignable_to(expected) {
            Ok(())
        } else {
            Err(self.error(
                CfgErrorKind::TypeMismatch {
                    context: context.to_string(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                },
                span,
            ))
        }
    }

    // === Analysis ===

    /// First sub-expression that is not a compile-time constant.
    fn non_constant(&self, id: NodeId) -> Option<String> {
        let arena = &self.root.arena;
        match arena.kind(id) {
            NodeKind::Int(_) | NodeKind::Str(_) | NodeKind::Bool(_) => None,
            NodeKind::Ident(name) => match self.env.scope.get(*name) {
                Some(symbol) if symbol.kind == SymbolKind::Const => None,
                _ => Some(self.text(*name).to_string()),
            },
            NodeKind::Selector { base, member } => {
                let is_const = self
                    .types
                    .imported(*base, Span::DUMMY)
                    .ok()
                    .and_then(|exports| exports.scope.get(*member))
                    .is_some_and(|s| s.kind == SymbolKind::Const);
                if is_const {
                    None
                } else {
                    Some(self.source(id))
                }
            }
            NodeKind::Unary { operand, .. } => self.non_constant(*operand),
            NodeKind::Binary { lhs, rhs, .. } => {
                self.non_constant(*lhs).or_else(|| self.non_constant(*rhs))
            }
            NodeKind::Call { callee, args } => {
                let callee_is_type_or_len = match arena.kind(*callee) {
                    NodeKind::Ident(name) => {
                        let text = self.text(*name);
                        match self.env.scope.get(*name) {
                            Some(symbol) => symbol.kind == SymbolKind::Type,
                            None => Basic::from_name(text).is_some() || text == "len",
                        }
                    }
                    NodeKind::Selector { base, member } => self
                        .types
                        .imported(*base, Span::DUMMY)
                        .ok()
                        .and_then(|exports| exports.scope.get(*member))
                        .is_some_and(|s| s.kind == SymbolKind::Type),
                    _ => false,
                };
                if !callee_is_type_or_len {
                    return Some(self.source(id));
                }
                args.iter().find_map(|arg| self.non_constant(*arg))
            }
            _ => Some(self.source(id)),
        }
    }

    /// Whether a statement always ends execution of the function.
    fn terminates(&self, id: NodeId) -> bool {
        let arena = &self.root.arena;
        match arena.kind(id) {
            NodeKind::Return(_) => true,
            NodeKind::Block(stmts) => stmts.last().is_some_and(|s| self.terminates(*s)),
            NodeKind::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => self.terminates(*then_branch) && self.terminates(*else_branch),
            NodeKind::For {
                cond: None, body, ..
            } => !self.breaks_out(*body),
            NodeKind::ExprStmt(expr) => match arena.kind(*expr) {
                NodeKind::Call { callee, .. } => matches!(
                    arena.kind(*callee),
                    NodeKind::Ident(name)
                        if self.text(*name) == "panic"
                            && self.lookup_local(*name).is_none()
                            && !self.env.scope.contains(*name)
                ),
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether `id` contains a `break` for the enclosing loop.
    fn breaks_out(&self, id: NodeId) -> bool {
        let arena = &self.root.arena;
        match arena.kind(id) {
            NodeKind::Break => true,
            NodeKind::Block(stmts) => stmts.iter().any(|s| self.breaks_out(*s)),
            NodeKind::If {
                then_branch,
                else_branch,
                ..
            } => self.breaks_out(*then_branch) || else_branch.is_some_and(|e| self.breaks_out(e)),
            _ => false,
        }
    }
}

/// Zero value of a declared type.
fn zero_value(ty: &Ty, span: Span) -> Expr {
    let value = match ty.underlying() {
        Some(Basic::Int) => Value::Int(0),
        Some(Basic::Str) => Value::string(""),
        Some(Basic::Bool) => Value::Bool(false),
        None => Value::Void,
    };
    Expr {
        kind: ExprKind::Const(value),
        span,
    }
}

/// Short source-like rendering of an expression for messages.
fn describe(root: &AstRoot, interner: &StringInterner, id: NodeId) -> String {
    match root.arena.kind(id) {
        NodeKind::Int(n) => n.to_string(),
        NodeKind::Str(s) => format!("{s:?}"),
        NodeKind::Bool(b) => b.to_string(),
        NodeKind::Ident(name) => interner.lookup(*name).to_string(),
        NodeKind::Selector { base, member } => {
            format!("{}.{}", interner.lookup(*base), interner.lookup(*member))
        }
        NodeKind::Unary { op, operand } => {
            format!("{}{}", op.symbol(), describe(root, interner, *operand))
        }
        NodeKind::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            describe(root, interner, *lhs),
            op.symbol(),
            describe(root, interner, *rhs)
        ),
        NodeKind::Call { callee, args } => {
            let args: Vec<_> = args.iter().map(|a| describe(root, interner, *a)).collect();
            format!("{}({})", describe(root, interner, *callee), args.join(", "))
        }
        _ => "statement".to_string(),
    }
}

#[cfg(test)]
mod tests;
