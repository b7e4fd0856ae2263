//! Executable code produced by the CFG builder.
//!
//! A [`Routine`] is a compiled function body, global initializer, init
//! function or file wrapper. Names are already resolved: locals are
//! indices into the routine's local array, package-level values are frame
//! [`Slot`]s, and members of imported packages are slots guarded by the
//! file's import bindings in its [`FileContext`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tarn_ir::{BinaryOp, LineIndex, Position, Slot, Span, UnaryOp};

use crate::Value;

/// Per-file state shared by every routine compiled from one file.
#[derive(Debug)]
pub struct FileContext {
    pub file_name: Arc<str>,
    line_index: LineIndex,
    /// One entry per import spec; set once the file wrapper has run.
    imports: Vec<ImportBinding>,
}

#[derive(Debug)]
struct ImportBinding {
    path: String,
    bound: AtomicBool,
}

impl FileContext {
    pub fn new(
        file_name: impl Into<Arc<str>>,
        line_index: LineIndex,
        import_paths: impl IntoIterator<Item = String>,
    ) -> Self {
        FileContext {
            file_name: file_name.into(),
            line_index,
            imports: import_paths
                .into_iter()
                .map(|path| ImportBinding {
                    path,
                    bound: AtomicBool::new(false),
                })
                .collect(),
        }
    }

    pub fn position(&self, span: Span) -> Position {
        self.line_index.span_start(span)
    }

    pub fn bind(&self, index: u32) {
        if let Some(import) = self.imports.get(index as usize) {
            import.bound.store(true, Ordering::Release);
        }
    }

    pub fn is_bound(&self, index: u32) -> bool {
        self.imports
            .get(index as usize)
            .is_some_and(|i| i.bound.load(Ordering::Acquire))
    }

    pub fn import_path(&self, index: u32) -> &str {
        self.imports
            .get(index as usize)
            .map_or("", |i| i.path.as_str())
    }

    pub fn import_count(&self) -> usize {
        self.imports.len()
    }
}

/// What a routine is, for error messages and tracing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RoutineKind {
    Function,
    GlobalInit,
    Init,
    Wrapper,
    /// The synthesized routine running every global initializer in order.
    Globals,
}

#[derive(Debug)]
pub struct Routine {
    pub name: String,
    pub kind: RoutineKind,
    pub context: Arc<FileContext>,
    pub params: usize,
    /// Local slots, parameters included.
    pub locals: usize,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Builtin functions of the universe scope.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Builtin {
    Println,
    Print,
    Len,
    Panic,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "println" => Some(Builtin::Println),
            "print" => Some(Builtin::Print),
            "len" => Some(Builtin::Len),
            "panic" => Some(Builtin::Panic),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Println => "println",
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Panic => "panic",
        }
    }
}

pub type Args = Vec<Expr>;

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExprKind {
    Const(Value),
    Local(u32),
    Global {
        slot: Slot,
        name: Arc<str>,
    },
    /// Member of an imported package, valid once `import` is bound.
    Imported {
        import: u32,
        slot: Slot,
        name: Arc<str>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Args,
    },
    Builtin {
        builtin: Builtin,
        args: Args,
    },
}

/// Assignment target.
#[derive(Debug, Clone)]
pub enum Place {
    Local(u32),
    Global { slot: Slot, name: Arc<str> },
    Imported { import: u32, slot: Slot, name: Arc<str> },
    /// `_ = expr`
    Discard,
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        place: Place,
        op: Option<BinaryOp>,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Loop {
        cond: Option<Expr>,
        body: Vec<Stmt>,
        post: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    /// Mark import `index` of the routine's file as bound.
    BindImport(u32),
    /// Run another routine with its own locals.
    Invoke(Arc<Routine>),
}
