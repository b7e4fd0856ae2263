//! Loader errors.
//!
//! Collaborator errors keep their own file and line:col; the loader adds
//! the import path that was being loaded when they happened.

use std::io;
use std::path::PathBuf;

use tarn_eval::{CfgError, ExecError};
use tarn_ir::Position;
use tarn_parse::{AstError, ParseError};
use thiserror::Error;

/// Directory lookup failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("cannot find package {import_path:?} in any of:{}", format_searched(.searched))]
    NotFound {
        import_path: String,
        searched: Vec<PathBuf>,
    },
    #[error("cannot find package {import_path:?}: no package roots or tool root configured")]
    EnvironmentNotConfigured { import_path: String },
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|path| format!("\n\t{}", path.display()))
        .collect()
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("import cycle not allowed\n\timports {import_path}")]
    ImportCycle { import_path: String },

    #[error("{import_path}: cannot read {}: {source}", .path.display())]
    Io {
        import_path: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no source files for {import_path} in {}", .dir.display())]
    NoSourceFiles { import_path: String, dir: PathBuf },

    #[error("{import_path}: {source}")]
    Parse {
        import_path: String,
        #[source]
        source: ParseError,
    },

    #[error("{import_path}: {source}")]
    Ast {
        import_path: String,
        #[source]
        source: AstError,
    },

    #[error("found packages {first} and {second} in {}", .dir.display())]
    PackageNameConflict {
        first: String,
        second: String,
        dir: PathBuf,
    },

    #[error("{import_path}: {name} redeclared at {second}\n\tprevious declaration at {first}")]
    Redeclared {
        import_path: String,
        name: String,
        first: String,
        second: String,
    },

    #[error("{import_path}: {file}:{position}: cannot resolve {name}: undefined: {missing}")]
    UnresolvedDeclaration {
        import_path: String,
        name: String,
        missing: String,
        file: String,
        position: Position,
    },

    #[error("{import_path}: {source}")]
    Cfg {
        import_path: String,
        #[source]
        source: CfgError,
    },

    #[error("inconsistent knowledge about {import_path}: {detail}")]
    RegistrationInconsistency { import_path: String, detail: String },

    #[error("{import_path}: {source}")]
    Execution {
        import_path: String,
        #[source]
        source: ExecError,
    },
}

impl LoadError {
    #[cold]
    pub(crate) fn io(import_path: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        LoadError::Io {
            import_path: import_path.to_string(),
            path: path.into(),
            source,
        }
    }

    #[cold]
    pub(crate) fn inconsistent(import_path: &str, detail: impl Into<String>) -> Self {
        LoadError::RegistrationInconsistency {
            import_path: import_path.to_string(),
            detail: detail.into(),
        }
    }

    /// Import path the error is about, when it names one.
    pub fn import_path(&self) -> Option<&str> {
        match self {
            LoadError::Location(
                LocationError::NotFound { import_path, .. }
                | LocationError::EnvironmentNotConfigured { import_path },
            )
            | LoadError::ImportCycle { import_path }
            | LoadError::Io { import_path, .. }
            | LoadError::NoSourceFiles { import_path, .. }
            | LoadError::Parse { import_path, .. }
            | LoadError::Ast { import_path, .. }
            | LoadError::Redeclared { import_path, .. }
            | LoadError::UnresolvedDeclaration { import_path, .. }
            | LoadError::Cfg { import_path, .. }
            | LoadError::RegistrationInconsistency { import_path, .. }
            | LoadError::Execution { import_path, .. } => Some(import_path),
            LoadError::PackageNameConflict { .. } => None,
        }
    }
}
