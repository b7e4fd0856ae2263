//! Shared test utilities for loading tests.
//!
//! [`Tree`] lays out an in-memory source tree and builds an interpreter
//! over it that captures printed output and counts file reads.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tarni::{
    buffer_handler, BuildContext, DirEntry, FileSystem, Interpreter, LoadError, MemoryFileSystem,
    PackageIndex,
};

/// Source root of every [`Tree`].
pub const SOURCE_ROOT: &str = "/work";

/// Package root searched as `<root>/src/<import path>`.
pub const LIBRARY_ROOT: &str = "/libs";

/// Wraps a filesystem and counts reads per path, optionally slowing
/// every read down.
pub struct CountingFs<F> {
    inner: F,
    reads: Mutex<FxHashMap<PathBuf, usize>>,
    read_delay: Mutex<Duration>,
}

impl<F: FileSystem> CountingFs<F> {
    pub fn new(inner: F) -> Self {
        CountingFs {
            inner,
            reads: Mutex::new(FxHashMap::default()),
            read_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    pub fn reads(&self, path: impl AsRef<Path>) -> usize {
        self.reads.lock().get(path.as_ref()).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().values().sum()
    }
}

impl<F: FileSystem> FileSystem for CountingFs<F> {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.list(dir)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        *self.reads.lock().entry(path.to_path_buf()).or_default() += 1;
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.inner.read(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }
}

pub fn linux() -> BuildContext {
    BuildContext {
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        tags: Vec::new(),
    }
}

/// An in-memory source tree. Files are listed in the order they are
/// added; paths are relative to [`SOURCE_ROOT`] unless absolute.
pub struct Tree {
    fs: Arc<CountingFs<MemoryFileSystem>>,
    build: BuildContext,
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            fs: Arc::new(CountingFs::new(MemoryFileSystem::new())),
            build: linux(),
        }
    }

    #[must_use]
    pub fn file(self, path: &str, contents: &str) -> Self {
        self.fs.inner.add_file(Self::absolute(path), contents);
        self
    }

    #[must_use]
    pub fn build_context(mut self, build: BuildContext) -> Self {
        self.build = build;
        self
    }

    pub fn absolute(path: &str) -> PathBuf {
        if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            Path::new(SOURCE_ROOT).join(path)
        }
    }

    pub fn fs(&self) -> &CountingFs<MemoryFileSystem> {
        &self.fs
    }

    pub fn interpreter(&self) -> Interpreter {
        Interpreter::builder()
            .build_context(self.build.clone())
            .file_system(Arc::clone(&self.fs) as Arc<dyn FileSystem>)
            .discovery(Arc::new(PackageIndex::default().with_root(LIBRARY_ROOT)))
            .print_handler(buffer_handler())
            .source_root(SOURCE_ROOT)
            .build()
    }
}

/// Run `path` as a program and return its output.
pub fn run(interp: &Interpreter, path: &str) -> Result<String, LoadError> {
    interp.eval_path(path)?;
    Ok(interp.output())
}

/// The error of a request expected to fail.
pub fn expect_err<T: std::fmt::Debug>(result: Result<T, LoadError>) -> LoadError {
    match result {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(err) => err,
    }
}
