//! Source locator.
//!
//! Turns an import request into either the display name of an already
//! registered package or the directory holding its sources. Relative
//! import paths (`./x`, `../x`) are resolved against the importing
//! package's directory; everything else goes through the configured
//! [`DirectoryDiscovery`].
//!
//! Relative paths are registered under a canonical key (`./a/b`) so that
//! different spellings of the same directory share one registry entry and
//! are caught by the same cycle check.

use std::path::{Component, Path, PathBuf};

use crate::discovery::DirectoryDiscovery;
use crate::error::LoadError;
use crate::fs::{normalize, FileSystem};
use crate::registry::{Begin, Registry};

/// Context of a top-level evaluation. Relative imports made from it
/// resolve against the source root, and only packages loaded from it can
/// run `main`.
pub const ENTRY_CONTEXT: &str = "main";

pub fn is_relative(import_path: &str) -> bool {
    import_path == "."
        || import_path == ".."
        || import_path.starts_with("./")
        || import_path.starts_with("../")
}

/// Join `root` and `path`, collapsing the longest run of trailing `root`
/// segments that `path` repeats at its start.
///
/// `effective_sub_path("a/b", "b/c")` is `a/b/c`. Empty and `.` segments
/// are dropped; an empty root or the entry context yields `path` alone.
pub fn effective_sub_path(root: &str, path: &str) -> String {
    let path_segments = segments(path);
    if root.is_empty() || root == ENTRY_CONTEXT {
        return path_segments.join("/");
    }
    let root_segments = segments(root);
    let max = root_segments.len().min(path_segments.len());
    let overlap = (1..=max)
        .rev()
        .find(|&k| root_segments[root_segments.len() - k..] == path_segments[..k])
        .unwrap_or(0);
    root_segments
        .iter()
        .chain(&path_segments[overlap..])
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Registry key of `import_path` requested from `context`.
pub(crate) fn registry_key(context: &str, import_path: &str) -> String {
    if !is_relative(import_path) {
        return if import_path.starts_with('/') {
            path_key(&normalize(Path::new(import_path)))
        } else {
            import_path.to_string()
        };
    }
    let base = if context == ENTRY_CONTEXT { "" } else { context };
    path_key(&normalize(&Path::new(base).join(import_path)))
}

/// Import context of packages stored in `dir`: the directory relative to
/// the source root, or the absolute directory when it lies outside.
pub(crate) fn package_context(source_root: &Path, dir: &Path) -> String {
    let dir = normalize(dir);
    match dir.strip_prefix(normalize(source_root)) {
        Ok(rel) if !dir.is_absolute() || source_root.is_absolute() => path_key(rel),
        _ => path_key(&dir),
    }
}

fn path_key(path: &Path) -> String {
    let text = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if path.has_root() {
        format!("/{text}")
    } else if text.is_empty() {
        ".".to_string()
    } else if text == ".." || text.starts_with("../") {
        text
    } else {
        format!("./{text}")
    }
}

/// Where a request leads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Located {
    Registered { key: String, name: String },
    Directory { key: String, dir: PathBuf },
}

pub(crate) struct Locator<'a> {
    pub registry: &'a Registry,
    pub discovery: &'a dyn DirectoryDiscovery,
    pub fs: &'a dyn FileSystem,
    pub source_root: &'a Path,
}

impl Locator<'_> {
    /// Resolve a request. Marks the path in progress before any
    /// directory lookup, so a failed lookup is never retried. The caller
    /// settles the entry of a returned directory once it is loaded.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn resolve(&self, context: &str, import_path: &str) -> Result<Located, LoadError> {
        let key = registry_key(context, import_path);
        match self.registry.begin(&key)? {
            Begin::Registered(name) => {
                tracing::trace!(%key, %name, "already registered");
                return Ok(Located::Registered { key, name });
            }
            Begin::Started => {}
        }
        let dir = if is_relative(import_path) {
            normalize(&self.source_root.join(&key))
        } else if import_path.starts_with('/') {
            PathBuf::from(&key)
        } else {
            match self.discovery.find(import_path, self.fs) {
                Ok(dir) => dir,
                Err(err) => {
                    self.registry.settle(&key);
                    return Err(err.into());
                }
            }
        };
        tracing::debug!(%key, dir = %dir.display(), "located package");
        Ok(Located::Directory { key, dir })
    }
}
