//! Parser and AST builder errors.

use std::fmt;

use tarn_ir::Position;

/// Syntax error in one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub file: String,
    pub position: Position,
    pub message: String,
}

impl ParseError {
    #[cold]
    pub fn new(file: &str, position: Position, message: impl Into<String>) -> Self {
        ParseError {
            file: file.to_string(),
            position,
            message: message.into(),
        }
    }

    #[cold]
    pub fn expected(file: &str, position: Position, expected: &str, found: &str) -> Self {
        Self::new(file, position, format!("expected {expected}, found {found}"))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// What the AST builder rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AstErrorKind {
    MissingPackageClause,
    BlankPackageName,
    DuplicateImport { path: String },
    DuplicateImportName { name: String },
    InitNotFunction,
    BadEntrySignature { name: String },
    ConstWithoutValue { name: String },
}

impl fmt::Display for AstErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstErrorKind::MissingPackageClause => write!(f, "missing package clause"),
            AstErrorKind::BlankPackageName => write!(f, "invalid package name _"),
            AstErrorKind::DuplicateImport { path } => write!(f, "{path:?} imported twice"),
            AstErrorKind::DuplicateImportName { name } => {
                write!(f, "{name} redeclared in this block by import")
            }
            AstErrorKind::InitNotFunction => write!(f, "cannot declare init - must be func"),
            AstErrorKind::BadEntrySignature { name } => {
                write!(f, "func {name} must have no arguments and no return values")
            }
            AstErrorKind::ConstWithoutValue { name } => {
                write!(f, "missing init expr for const declaration {name}")
            }
        }
    }
}

/// Structural error found while building the AST of one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AstError {
    pub kind: AstErrorKind,
    pub file: String,
    pub position: Position,
}

impl AstError {
    #[cold]
    pub fn new(kind: AstErrorKind, file: &str, position: Position) -> Self {
        AstError {
            kind,
            file: file.to_string(),
            position,
        }
    }
}

impl fmt::Display for AstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.position, self.kind)
    }
}

impl std::error::Error for AstError {}
