//! Flat syntax tree.
//!
//! All nodes of one file live in a [`NodeArena`] and refer to each other
//! by [`NodeId`]. The parser produces a [`SyntaxTree`]; the AST builder
//! validates it and turns it into an [`AstRoot`] with a top-level
//! declaration table.

use std::fmt;

use crate::{LineIndex, Name, Span};

/// Index into a file's node arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Binary operators, loosest binding last.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Binding power; higher binds tighter.
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 5,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Named type reference, optionally qualified by an import alias.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TypeExpr {
    pub package: Option<Name>,
    pub name: Name,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    // Top-level declarations.
    Var {
        name: Name,
        ty: Option<TypeExpr>,
        value: Option<NodeId>,
        constant: bool,
    },
    TypeDecl {
        name: Name,
        underlying: TypeExpr,
    },
    Func {
        name: Name,
        params: Vec<Param>,
        result: Option<TypeExpr>,
        body: NodeId,
    },

    // Statements.
    Block(Vec<NodeId>),
    LocalVar {
        name: Name,
        ty: Option<TypeExpr>,
        value: Option<NodeId>,
    },
    Assign {
        target: NodeId,
        op: Option<BinaryOp>,
        value: NodeId,
    },
    If {
        init: Option<NodeId>,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
        body: NodeId,
    },
    Return(Option<NodeId>),
    Break,
    Continue,
    ExprStmt(NodeId),

    // Expressions.
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(Name),
    Selector {
        base: Name,
        member: Name,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// A name referenced from an expression, as seen by declaration analysis.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reference {
    Ident(Name, Span),
    Qualified {
        package: Name,
        member: Name,
        span: Span,
    },
}

/// Owner of every node of one file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    /// Allocate a node.
    ///
    /// # Panics
    /// Panics if a single file holds more than `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = u32::try_from(self.nodes.len())
            .unwrap_or_else(|_| panic!("node arena overflow"));
        self.nodes.push(Node { kind, span });
        NodeId(id)
    }

    /// Get a node. Ids always come from this arena.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.get(id).kind
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.get(id).span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names an expression reads, in source order.
    ///
    /// Only expressions are walked; statement bodies are the evaluator's
    /// concern, not declaration analysis'.
    pub fn references(&self, expr: NodeId) -> Vec<Reference> {
        let mut out = Vec::new();
        self.collect_references(expr, &mut out);
        out
    }

    fn collect_references(&self, id: NodeId, out: &mut Vec<Reference>) {
        let node = self.get(id);
        match &node.kind {
            NodeKind::Ident(name) => out.push(Reference::Ident(*name, node.span)),
            NodeKind::Selector { base, member } => out.push(Reference::Qualified {
                package: *base,
                member: *member,
                span: node.span,
            }),
            NodeKind::Unary { operand, .. } => self.collect_references(*operand, out),
            NodeKind::Binary { lhs, rhs, .. } => {
                self.collect_references(*lhs, out);
                self.collect_references(*rhs, out);
            }
            NodeKind::Call { callee, args } => {
                self.collect_references(*callee, out);
                for arg in args {
                    self.collect_references(*arg, out);
                }
            }
            _ => {}
        }
    }
}

/// One `import` spec as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSpec {
    pub alias: Option<Name>,
    pub path: String,
    pub span: Span,
}

/// Parser output for one file.
#[derive(Clone, Debug)]
pub struct SyntaxTree {
    pub file_name: String,
    pub package: Option<(Name, Span)>,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<NodeId>,
    pub arena: NodeArena,
    pub line_index: LineIndex,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DeclKind {
    Var,
    Const,
    Type,
    Func,
    /// `func init()`; runs at load and is never registered.
    Init,
}

/// Top-level declaration table entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decl {
    pub name: Name,
    pub kind: DeclKind,
    pub node: NodeId,
    pub span: Span,
}

/// An import of one file, bound once the imported package is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileImport {
    pub spec: ImportSpec,
    /// Import path the loader resolved the spec to.
    pub import_path: Option<String>,
    /// Name the file refers to the package by (alias or package name).
    pub local_name: Option<Name>,
}

/// AST builder output for one file.
#[derive(Clone, Debug)]
pub struct AstRoot {
    pub file_name: String,
    pub package: Name,
    pub imports: Vec<FileImport>,
    pub decls: Vec<Decl>,
    pub arena: NodeArena,
    pub line_index: LineIndex,
}

impl AstRoot {
    /// Record the package an import spec resolved to.
    pub fn bind_import(&mut self, index: usize, import_path: String, local_name: Name) {
        if let Some(import) = self.imports.get_mut(index) {
            import.import_path = Some(import_path);
            import.local_name = Some(local_name);
        }
    }

    /// Find a bound import by the name the file uses for it.
    pub fn import_named(&self, name: Name) -> Option<(usize, &FileImport)> {
        self.imports
            .iter()
            .enumerate()
            .find(|(_, import)| import.local_name == Some(name))
    }

    pub fn position(&self, span: Span) -> crate::Position {
        self.line_index.span_start(span)
    }
}
