//! Diagnostic hook called with every AST the driver builds.
//!
//! Hooks observe; they never influence loading. A failing hook is logged
//! and the pipeline carries on.

use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tarn_ir::{
    ensure_sufficient_stack, AstRoot, NodeArena, NodeId, NodeKind, StringInterner, TypeExpr,
};

pub type HookError = Box<dyn Error + Send + Sync>;

pub trait AstHook: Send + Sync {
    fn on_ast(
        &self,
        root: &AstRoot,
        file_name: &str,
        interner: &StringInterner,
    ) -> Result<(), HookError>;
}

/// Writes an indented dump of every AST to `<dir>/<file stem>.ast`.
#[derive(Clone, Debug)]
pub struct AstDumpHook {
    dir: PathBuf,
}

impl AstDumpHook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AstDumpHook { dir: dir.into() }
    }

    fn target(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
        self.dir.join(format!("{stem}.ast"))
    }
}

impl AstHook for AstDumpHook {
    fn on_ast(
        &self,
        root: &AstRoot,
        file_name: &str,
        interner: &StringInterner,
    ) -> Result<(), HookError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.target(file_name), dump_ast(root, interner))?;
        Ok(())
    }
}

/// Indented textual form of a file's AST.
pub fn dump_ast(root: &AstRoot, interner: &StringInterner) -> String {
    let mut dumper = Dumper {
        arena: &root.arena,
        interner,
        out: String::new(),
    };
    dumper.line(
        0,
        format_args!(
            "file {} package {}",
            root.file_name,
            interner.lookup(root.package)
        ),
    );
    for import in &root.imports {
        let local = import
            .local_name
            .or(import.spec.alias)
            .map_or("", |name| interner.lookup(name));
        dumper.line(1, format_args!("import {:?} as {local}", import.spec.path));
    }
    for decl in &root.decls {
        dumper.node(decl.node, 1);
    }
    dumper.out
}

struct Dumper<'a> {
    arena: &'a NodeArena,
    interner: &'a StringInterner,
    out: String,
}

impl Dumper<'_> {
    fn line(&mut self, depth: usize, args: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{:indent$}{args}", "", indent = depth * 2);
    }

    fn name(&self, name: tarn_ir::Name) -> &'static str {
        self.interner.lookup(name)
    }

    fn ty(&self, ty: &TypeExpr) -> String {
        match ty.package {
            Some(package) => format!("{}.{}", self.name(package), self.name(ty.name)),
            None => self.name(ty.name).to_string(),
        }
    }

    fn opt(&mut self, id: Option<NodeId>, depth: usize) {
        if let Some(id) = id {
            self.node(id, depth);
        }
    }

    fn node(&mut self, id: NodeId, depth: usize) {
        ensure_sufficient_stack(|| self.node_inner(id, depth));
    }

    fn node_inner(&mut self, id: NodeId, depth: usize) {
        let child = depth + 1;
        let arena = self.arena;
        match arena.kind(id) {
            NodeKind::Var {
                name,
                ty,
                value,
                constant,
            } => {
                let keyword = if *constant { "const" } else { "var" };
                let ty = ty.as_ref().map(|t| format!(" {}", self.ty(t))).unwrap_or_default();
                self.line(depth, format_args!("{keyword} {}{ty}", self.name(*name)));
                self.opt(*value, child);
            }
            NodeKind::TypeDecl { name, underlying } => {
                let underlying = self.ty(underlying);
                self.line(depth, format_args!("type {} {underlying}", self.name(*name)));
            }
            NodeKind::Func {
                name,
                params,
                result,
                body,
            } => {
                let params = params
                    .iter()
                    .map(|p| format!("{} {}", self.name(p.name), self.ty(&p.ty)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let result = result
                    .as_ref()
                    .map(|t| format!(" {}", self.ty(t)))
                    .unwrap_or_default();
                self.line(depth, format_args!("func {}({params}){result}", self.name(*name)));
                self.node(*body, child);
            }
            NodeKind::Block(stmts) => {
                self.line(depth, format_args!("block"));
                for stmt in stmts {
                    self.node(*stmt, child);
                }
            }
            NodeKind::LocalVar { name, ty, value } => {
                let ty = ty.as_ref().map(|t| format!(" {}", self.ty(t))).unwrap_or_default();
                self.line(depth, format_args!("local {}{ty}", self.name(*name)));
                self.opt(*value, child);
            }
            NodeKind::Assign { target, op, value } => {
                let op = op.map_or("", |op| op.symbol());
                self.line(depth, format_args!("assign {op}="));
                self.node(*target, child);
                self.node(*value, child);
            }
            NodeKind::If {
                init,
                cond,
                then_branch,
                else_branch,
            } => {
                self.line(depth, format_args!("if"));
                self.opt(*init, child);
                self.node(*cond, child);
                self.node(*then_branch, child);
                self.opt(*else_branch, child);
            }
            NodeKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.line(depth, format_args!("for"));
                self.opt(*init, child);
                self.opt(*cond, child);
                self.opt(*post, child);
                self.node(*body, child);
            }
            NodeKind::Return(value) => {
                self.line(depth, format_args!("return"));
                self.opt(*value, child);
            }
            NodeKind::Break => self.line(depth, format_args!("break")),
            NodeKind::Continue => self.line(depth, format_args!("continue")),
            NodeKind::ExprStmt(expr) => self.node(*expr, depth),
            NodeKind::Int(n) => self.line(depth, format_args!("int {n}")),
            NodeKind::Str(s) => self.line(depth, format_args!("string {s:?}")),
            NodeKind::Bool(b) => self.line(depth, format_args!("bool {b}")),
            NodeKind::Ident(name) => self.line(depth, format_args!("ident {}", self.name(*name))),
            NodeKind::Selector { base, member } => self.line(
                depth,
                format_args!("selector {}.{}", self.name(*base), self.name(*member)),
            ),
            NodeKind::Unary { op, operand } => {
                self.line(depth, format_args!("unary {}", op.symbol()));
                self.node(*operand, child);
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.line(depth, format_args!("binary {}", op.symbol()));
                self.node(*lhs, child);
                self.node(*rhs, child);
            }
            NodeKind::Call { callee, args } => {
                self.line(depth, format_args!("call"));
                self.node(*callee, child);
                for arg in args {
                    self.node(*arg, child);
                }
            }
        }
    }
}
