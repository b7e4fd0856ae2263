//! Filesystem access for the loader.
//!
//! The loader only lists directories, reads files and asks whether a path
//! is a directory, so that is all [`FileSystem`] offers. Tests swap in
//! [`MemoryFileSystem`] to control listing order and count reads.

use std::io;
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

/// One directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait FileSystem: Send + Sync {
    /// Entries of `dir`, in the order files should be encountered.
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn is_dir(&self, path: &Path) -> bool;
}

/// The host filesystem. Listings are sorted by name.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// In-memory filesystem. Directories exist implicitly through the files
/// below them; listings follow the order files were added.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<Vec<(PathBuf, Vec<u8>)>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// Add or replace a file. A replaced file keeps its listing position.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let contents = contents.into();
        let mut files = self.files.write();
        match files.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = contents,
            None => files.push((path, contents)),
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = normalize(dir);
        let files = self.files.read();
        let mut entries: Vec<DirEntry> = Vec::new();
        for (path, _) in files.iter() {
            let Ok(rest) = path.strip_prefix(&dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let is_dir = components.next().is_some();
            if !entries.iter().any(|e| e.name == name) {
                entries.push(DirEntry { name, is_dir });
            }
        }
        if entries.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such directory", dir.display()),
            ));
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path);
        self.files
            .read()
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, contents)| contents.clone())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: no such file", path.display()),
                )
            })
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.files
            .read()
            .iter()
            .any(|(p, _)| *p != path && p.starts_with(&path))
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into
/// the preceding component. Leading `..` of relative paths are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            Component::CurDir => {}
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests;
