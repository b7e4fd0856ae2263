//! The interpreter instance: one registry, one global frame, one slot
//! allocator, shared by every package it loads.

mod builder;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tarn_eval::{ExecEnv, Frame, SharedPrintHandler, Value};
use tarn_ir::{SharedInterner, StringInterner};

pub use builder::InterpreterBuilder;

use crate::discovery::DirectoryDiscovery;
use crate::error::LoadError;
use crate::fs::FileSystem;
use crate::gta::SlotAllocator;
use crate::hook::AstHook;
use crate::locate::{is_relative, registry_key, ENTRY_CONTEXT};
use crate::options::Options;
use crate::registry::Registry;

/// One request to load a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRequest {
    /// Directory (relative to the source root) or marker the path is
    /// resolved against. [`ENTRY_CONTEXT`] requests are entry points.
    pub context: String,
    pub import_path: String,
    /// Leave out `_test` files and reject mixed package names.
    pub skip_test: bool,
}

impl ImportRequest {
    pub fn new(context: impl Into<String>, import_path: impl Into<String>) -> Self {
        ImportRequest {
            context: context.into(),
            import_path: import_path.into(),
            skip_test: true,
        }
    }

    /// Include `_test` files.
    #[must_use]
    pub fn with_tests(mut self) -> Self {
        self.skip_test = false;
        self
    }
}

/// Loads, compiles and initializes packages.
///
/// Every package is loaded at most once per interpreter; later requests
/// for the same canonical path return the recorded package name.
pub struct Interpreter {
    pub(crate) options: Options,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) discovery: Arc<dyn DirectoryDiscovery>,
    pub(crate) hook: Option<Arc<dyn AstHook>>,
    pub(crate) interner: SharedInterner,
    pub(crate) registry: Registry,
    pub(crate) frame: Frame,
    pub(crate) slots: SlotAllocator,
    pub(crate) print: SharedPrintHandler,
    pub(crate) source_root: PathBuf,
}

impl Interpreter {
    /// An interpreter over the real file system, configured from the
    /// environment.
    pub fn new() -> Self {
        InterpreterBuilder::new().options(Options::from_env()).build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Load the package named by `request` and return its package name.
    ///
    /// A package already loaded is not read again. On an entry request for
    /// package `main`, `main()` runs after the package's init functions.
    pub fn import_src(&self, request: &ImportRequest) -> Result<String, LoadError> {
        self.load(request).map(|package| package.name)
    }

    /// Run the program in `path`, relative to the source root unless
    /// absolute.
    pub fn eval_path(&self, path: impl AsRef<Path>) -> Result<String, LoadError> {
        let path = path.as_ref().to_string_lossy().replace('\\', "/");
        let path = if path.starts_with('/') || is_relative(&path) {
            path
        } else {
            format!("./{path}")
        };
        self.import_src(&ImportRequest::new(ENTRY_CONTEXT, path))
    }

    /// Load and initialize a library package without running any `main`.
    pub fn import(&self, import_path: &str) -> Result<String, LoadError> {
        self.import_src(&ImportRequest::new("", import_path))
    }

    /// Current value of a package-level variable or function.
    ///
    /// `import_path` is resolved the way an entry request would resolve it.
    pub fn lookup_global(&self, import_path: &str, name: &str) -> Option<Value> {
        let key = registry_key(ENTRY_CONTEXT, import_path);
        let exports = self.registry.exports(&key)?;
        let name = self.interner.get(name)?;
        let symbol = exports.scope.get(name)?;
        self.frame.load(symbol.slot?)
    }

    /// Declared name of a loaded package.
    pub fn package_name(&self, import_path: &str) -> Option<String> {
        self.registry
            .package_name(&registry_key(ENTRY_CONTEXT, import_path))
    }

    /// Output captured by a buffering print handler.
    pub fn output(&self) -> String {
        self.print.output()
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn exec_env(&self) -> ExecEnv {
        ExecEnv {
            print: Arc::clone(&self.print),
            max_call_depth: self.options.max_call_depth,
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
