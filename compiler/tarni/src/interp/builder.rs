//! `InterpreterBuilder` for creating Interpreter instances with various configurations.

use std::path::PathBuf;
use std::sync::Arc;

use tarn_eval::{stdout_handler, Frame, SharedPrintHandler};
use tarn_ir::SharedInterner;

use super::Interpreter;
use crate::discovery::{ChainDiscovery, DirectoryDiscovery};
use crate::fs::{FileSystem, OsFileSystem};
use crate::gta::SlotAllocator;
use crate::hook::AstHook;
use crate::options::{BuildContext, Options};
use crate::registry::Registry;

/// Builder for [`Interpreter`].
///
/// Unset collaborators default to the real file system, discovery derived
/// from the options, and printing to stdout.
#[derive(Default)]
pub struct InterpreterBuilder {
    options: Options,
    fs: Option<Arc<dyn FileSystem>>,
    discovery: Option<Arc<dyn DirectoryDiscovery>>,
    hook: Option<Arc<dyn AstHook>>,
    print: Option<SharedPrintHandler>,
    interner: Option<SharedInterner>,
    source_root: Option<PathBuf>,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Override only the build context of the current options.
    #[must_use]
    pub fn build_context(mut self, build: BuildContext) -> Self {
        self.options.build = build;
        self
    }

    #[must_use]
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Replace the discovery strategies built from the options.
    #[must_use]
    pub fn discovery(mut self, discovery: Arc<dyn DirectoryDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Observe every parsed file.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn AstHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    #[must_use]
    pub fn print_handler(mut self, print: SharedPrintHandler) -> Self {
        self.print = Some(print);
        self
    }

    /// Share an interner with the caller.
    #[must_use]
    pub fn interner(mut self, interner: SharedInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    /// Directory that relative import paths and `eval_path` resolve
    /// against. Defaults to the working directory.
    #[must_use]
    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn build(self) -> Interpreter {
        let discovery = self
            .discovery
            .unwrap_or_else(|| Arc::new(ChainDiscovery::from_options(&self.options)));
        Interpreter {
            fs: self.fs.unwrap_or_else(|| Arc::new(OsFileSystem)),
            discovery,
            hook: self.hook,
            interner: self.interner.unwrap_or_default(),
            registry: Registry::new(),
            frame: Frame::new(),
            slots: SlotAllocator::default(),
            print: self.print.unwrap_or_else(stdout_handler),
            source_root: self.source_root.unwrap_or_else(|| PathBuf::from(".")),
            options: self.options,
        }
    }
}
