//! Directory discovery for non-relative import paths.
//!
//! Strategies are pluggable through [`DirectoryDiscovery`]. The default
//! chain consults the explicit package index and package roots first and
//! falls back to searching the tree around the tool root. There is no
//! built-in platform path: with nothing configured, discovery fails with
//! [`LocationError::EnvironmentNotConfigured`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::LocationError;
use crate::fs::FileSystem;
use crate::options::Options;

/// Name of the directory the tool-root search climbs to.
const TOOL_DIR: &str = "tarn";

pub trait DirectoryDiscovery: Send + Sync {
    /// Directory holding the sources of `import_path`.
    fn find(&self, import_path: &str, fs: &dyn FileSystem) -> Result<PathBuf, LocationError>;
}

/// Explicit entries plus `<root>/src/<import path>` lookups.
#[derive(Clone, Debug, Default)]
pub struct PackageIndex {
    entries: FxHashMap<String, PathBuf>,
    roots: Vec<PathBuf>,
}

impl PackageIndex {
    pub fn new(entries: FxHashMap<String, PathBuf>, roots: Vec<PathBuf>) -> Self {
        PackageIndex { entries, roots }
    }

    #[must_use]
    pub fn with_entry(mut self, import_path: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.entries.insert(import_path.into(), dir.into());
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }
}

impl DirectoryDiscovery for PackageIndex {
    fn find(&self, import_path: &str, fs: &dyn FileSystem) -> Result<PathBuf, LocationError> {
        if self.entries.is_empty() && self.roots.is_empty() {
            return Err(LocationError::EnvironmentNotConfigured {
                import_path: import_path.to_string(),
            });
        }
        let mut searched = Vec::new();
        if let Some(dir) = self.entries.get(import_path) {
            if fs.is_dir(dir) {
                return Ok(dir.clone());
            }
            searched.push(dir.clone());
        }
        for root in &self.roots {
            let candidate = root.join("src").join(import_path);
            if fs.is_dir(&candidate) {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
        Err(LocationError::NotFound {
            import_path: import_path.to_string(),
            searched,
        })
    }
}

/// Search the tree of the nearest `tarn` directory above the tool root.
#[derive(Clone, Debug, Default)]
pub struct ToolRootSearch {
    tool_root: Option<PathBuf>,
}

impl ToolRootSearch {
    pub fn new(tool_root: Option<PathBuf>) -> Self {
        ToolRootSearch { tool_root }
    }

    /// First ancestor of `start` (itself included) named `tarn`, ignoring
    /// case.
    fn tool_dir(start: &Path) -> Option<&Path> {
        start.ancestors().find(|dir| {
            dir.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(TOOL_DIR))
        })
    }
}

impl DirectoryDiscovery for ToolRootSearch {
    fn find(&self, import_path: &str, fs: &dyn FileSystem) -> Result<PathBuf, LocationError> {
        let Some(tool_root) = &self.tool_root else {
            return Err(LocationError::EnvironmentNotConfigured {
                import_path: import_path.to_string(),
            });
        };
        let not_found = |searched: &Path| LocationError::NotFound {
            import_path: import_path.to_string(),
            searched: vec![searched.to_path_buf()],
        };
        let Some(base) = Self::tool_dir(tool_root) else {
            return Err(not_found(tool_root));
        };
        let wanted: Vec<&str> = import_path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if wanted.is_empty() {
            return Err(not_found(base));
        }
        search_tree(base, &wanted, fs).ok_or_else(|| not_found(base))
    }
}

/// Depth-first search below `dir` for a directory whose trailing path
/// segments equal `wanted`.
fn search_tree(dir: &Path, wanted: &[&str], fs: &dyn FileSystem) -> Option<PathBuf> {
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs.list(&dir) else {
            continue;
        };
        let mut children = Vec::new();
        for entry in entries.into_iter().filter(|e| e.is_dir) {
            let child = dir.join(&entry.name);
            if ends_with_segments(&child, wanted) {
                return Some(child);
            }
            children.push(child);
        }
        stack.extend(children.into_iter().rev());
    }
    None
}

fn ends_with_segments(path: &Path, wanted: &[&str]) -> bool {
    let mut components = path.components().rev();
    wanted.iter().rev().all(|segment| {
        components
            .next()
            .is_some_and(|c| c.as_os_str().to_str() == Some(segment))
    })
}

/// Strategies consulted in order; the first hit wins.
#[derive(Clone, Default)]
pub struct ChainDiscovery {
    strategies: Vec<Arc<dyn DirectoryDiscovery>>,
}

impl ChainDiscovery {
    pub fn new(strategies: Vec<Arc<dyn DirectoryDiscovery>>) -> Self {
        ChainDiscovery { strategies }
    }

    /// Package index and roots first, then the tool-root search.
    pub fn from_options(options: &Options) -> Self {
        Self::new(vec![
            Arc::new(PackageIndex::new(
                options.package_index.clone(),
                options.package_roots.clone(),
            )),
            Arc::new(ToolRootSearch::new(options.tool_root.clone())),
        ])
    }
}

impl DirectoryDiscovery for ChainDiscovery {
    fn find(&self, import_path: &str, fs: &dyn FileSystem) -> Result<PathBuf, LocationError> {
        let mut searched = Vec::new();
        let mut configured = false;
        for strategy in &self.strategies {
            match strategy.find(import_path, fs) {
                Ok(dir) => return Ok(dir),
                Err(LocationError::NotFound { searched: s, .. }) => {
                    configured = true;
                    searched.extend(s);
                }
                Err(LocationError::EnvironmentNotConfigured { .. }) => {}
            }
        }
        if configured {
            Err(LocationError::NotFound {
                import_path: import_path.to_string(),
                searched,
            })
        } else {
            Err(LocationError::EnvironmentNotConfigured {
                import_path: import_path.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for ChainDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainDiscovery({} strategies)", self.strategies.len())
    }
}
