//! Tarni - package loader and interpreter context for Tarn.
//!
//! Importing a package runs a fixed pipeline:
//!
//! 1. **Locate**: canonical registry key and source directory
//!    ([`DirectoryDiscovery`] for non-relative paths).
//! 2. **Parse**: eligible files of the directory, loading each file's
//!    imports recursively before the file is kept.
//! 3. **GTA**: package-level declarations, retried until no forward
//!    reference is left.
//! 4. **CFG**: one compiled unit per file plus the ordered global
//!    initializer.
//! 5. **Register**: exports become visible to importers, function values
//!    land in the shared frame.
//! 6. **Run**: file wrappers, globals, `init` functions, then `main` for
//!    entry programs.
//!
//! ```text
//! Interpreter::import_src
//!   └─ load ──► Locator ──► Driver ──(imports)──► load …
//!                              │
//!                              ▼
//!                       Gta ─► build_cfg ─► Registry ─► Plan::run
//! ```

mod discovery;
mod driver;
mod error;
mod filter;
mod fs;
mod gta;
mod hook;
mod interp;
mod loader;
mod locate;
mod options;
mod registry;
mod sequencer;

#[cfg(test)]
mod test_support;

use std::sync::Once;

pub use discovery::{ChainDiscovery, DirectoryDiscovery, PackageIndex, ToolRootSearch};
pub use error::{LoadError, LocationError};
pub use filter::{constraints_satisfied, eligible, ConstraintError};
pub use fs::{normalize, DirEntry, FileSystem, MemoryFileSystem, OsFileSystem};
pub use hook::{dump_ast, AstDumpHook, AstHook, HookError};
pub use interp::{ImportRequest, Interpreter, InterpreterBuilder};
pub use locate::{effective_sub_path, is_relative, ENTRY_CONTEXT};
pub use options::{BuildContext, Options, KNOWN_ARCH, KNOWN_OS};

pub use tarn_eval::{buffer_handler, silent_handler, stdout_handler, SharedPrintHandler, Value};
pub use tarn_ir::SharedInterner;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=tarni=debug`, or
/// `RUST_LOG=tarni=trace,tarn_eval=debug` to follow execution too.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true),
                )
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
