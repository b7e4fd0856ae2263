//! Interpreters over an in-memory tree for unit tests.

use std::sync::Arc;

use tarn_eval::buffer_handler;

use crate::discovery::PackageIndex;
use crate::fs::MemoryFileSystem;
use crate::interp::Interpreter;
use crate::options::BuildContext;

pub(crate) fn linux() -> BuildContext {
    BuildContext {
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        tags: Vec::new(),
    }
}

/// Interpreter rooted at `/src`, with `<root>/src/<path>` discovery under
/// `/lib`, capturing printed output.
pub(crate) fn interpreter(files: &[(&str, &str)]) -> Interpreter {
    let fs = MemoryFileSystem::new();
    for (path, contents) in files {
        fs.add_file(path, *contents);
    }
    Interpreter::builder()
        .build_context(linux())
        .file_system(Arc::new(fs))
        .discovery(Arc::new(PackageIndex::default().with_root("/lib")))
        .print_handler(buffer_handler())
        .source_root("/src")
        .build()
}
