//! CFG builder and evaluator errors.
//!
//! Both carry the file and the 1-based position they refer to. Factory
//! functions are the public API for creating them.

use std::fmt;

use tarn_ir::Position;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CfgErrorKind {
    Undefined { name: String },
    NotAType { name: String },
    NotAValue { name: String },
    NotCallable { what: String },
    ArgumentCount { callee: String, expected: usize, got: usize },
    TypeMismatch { context: String, expected: String, found: String },
    InvalidOperation { op: &'static str, ty: String },
    MismatchedTypes { op: &'static str, left: String, right: String },
    PackageWithoutSelector { name: String },
    NonBooleanCondition { found: String },
    NotAssignable { name: String, what: &'static str },
    NotConstant { name: String },
    BranchOutsideLoop { keyword: &'static str },
    MissingReturn { func: String },
    ReturnCount { func: String, message: &'static str },
    NoValue { call: String },
    NotUsed { what: String },
    UnexportedMember { package: String, member: String },
    UnknownMember { package: String, member: String },
    Redeclared { name: String },
    RecursiveType { name: String },
    InitializationCycle { names: Vec<String> },
}

impl fmt::Display for CfgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfgErrorKind::Undefined { name } => write!(f, "undefined: {name}"),
            CfgErrorKind::NotAType { name } => write!(f, "{name} is not a type"),
            CfgErrorKind::NotAValue { name } => write!(f, "{name} is not an expression"),
            CfgErrorKind::NotCallable { what } => {
                write!(f, "invalid operation: cannot call non-function {what}")
            }
            CfgErrorKind::ArgumentCount {
                callee,
                expected,
                got,
            } => {
                let which = if got < expected { "not enough" } else { "too many" };
                write!(
                    f,
                    "{which} arguments in call to {callee}: have {got}, want {expected}"
                )
            }
            CfgErrorKind::TypeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "cannot use value of type {found} as {expected} value in {context}"
            ),
            CfgErrorKind::InvalidOperation { op, ty } => {
                write!(f, "invalid operation: operator {op} not defined on {ty}")
            }
            CfgErrorKind::MismatchedTypes { op, left, right } => {
                write!(f, "invalid operation: mismatched types {left} and {right} for {op}")
            }
            CfgErrorKind::PackageWithoutSelector { name } => {
                write!(f, "use of package {name} without selector")
            }
            CfgErrorKind::NonBooleanCondition { found } => {
                write!(f, "non-boolean condition of type {found}")
            }
            CfgErrorKind::NotAssignable { name, what } => {
                write!(f, "cannot assign to {name} ({what})")
            }
            CfgErrorKind::NotConstant { name } => write!(f, "{name} is not constant"),
            CfgErrorKind::BranchOutsideLoop { keyword } => {
                write!(f, "{keyword} is not in a loop")
            }
            CfgErrorKind::MissingReturn { func } => write!(f, "missing return in {func}"),
            CfgErrorKind::ReturnCount { func, message } => write!(f, "{message} in {func}"),
            CfgErrorKind::NoValue { call } => write!(f, "{call} (no value) used as value"),
            CfgErrorKind::NotUsed { what } => write!(f, "{what} is not used"),
            CfgErrorKind::UnexportedMember { package, member } => {
                write!(f, "name {member} not exported by package {package}")
            }
            CfgErrorKind::UnknownMember { package, member } => {
                write!(f, "undefined: {package}.{member}")
            }
            CfgErrorKind::Redeclared { name } => write!(f, "{name} redeclared in this block"),
            CfgErrorKind::RecursiveType { name } => write!(f, "invalid recursive type {name}"),
            CfgErrorKind::InitializationCycle { names } => {
                write!(f, "initialization cycle: {}", names.join(" -> "))
            }
        }
    }
}

/// Error found while building executable code for a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CfgError {
    pub kind: CfgErrorKind,
    pub file: String,
    pub position: Position,
}

impl CfgError {
    #[cold]
    pub fn new(kind: CfgErrorKind, file: &str, position: Position) -> Self {
        CfgError {
            kind,
            file: file.to_string(),
            position,
        }
    }
}

impl fmt::Display for CfgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.position, self.kind)
    }
}

impl std::error::Error for CfgError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecErrorKind {
    DivisionByZero,
    Panic { message: String },
    CallDepthExceeded { limit: usize },
    Uninitialized { name: String },
    ImportNotBound { path: String },
    NotCallable { found: &'static str },
    TypeMismatch { op: &'static str, left: &'static str, right: &'static str },
    SlotOutOfRange { name: String },
}

impl fmt::Display for ExecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecErrorKind::DivisionByZero => write!(f, "integer divide by zero"),
            ExecErrorKind::Panic { message } => write!(f, "panic: {message}"),
            ExecErrorKind::CallDepthExceeded { limit } => {
                write!(f, "maximum call depth of {limit} exceeded")
            }
            ExecErrorKind::Uninitialized { name } => {
                write!(f, "{name} read before initialization")
            }
            ExecErrorKind::ImportNotBound { path } => {
                write!(f, "package {path:?} used before its file was initialized")
            }
            ExecErrorKind::NotCallable { found } => write!(f, "cannot call value of type {found}"),
            ExecErrorKind::TypeMismatch { op, left, right } => {
                write!(f, "mismatched types {left} and {right} for operator {op}")
            }
            ExecErrorKind::SlotOutOfRange { name } => {
                write!(f, "{name} has no frame slot; the frame was not grown")
            }
        }
    }
}

/// Runtime failure, located in the routine that raised it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecError {
    pub kind: ExecErrorKind,
    pub file: String,
    pub position: Position,
    pub routine: String,
}

impl ExecError {
    #[cold]
    pub fn new(kind: ExecErrorKind, file: &str, position: Position, routine: &str) -> Self {
        ExecError {
            kind,
            file: file.to_string(),
            position,
            routine: routine.to_string(),
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: in {}: {}",
            self.file, self.position, self.routine, self.kind
        )
    }
}

impl std::error::Error for ExecError {}
