//! File parser driver.
//!
//! Reads the eligible files of one package directory in listing order and
//! turns each into an [`AstRoot`] whose imports are already loaded and
//! bound. Imports are loaded through a callback so the driver itself never
//! touches the registry.

use std::io;
use std::path::Path;

use tarn_ir::{AstRoot, ImportSpec, Name, StringInterner};

use crate::error::LoadError;
use crate::filter;
use crate::fs::FileSystem;
use crate::hook::AstHook;
use crate::options::BuildContext;

/// A loaded dependency as the importing file sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PackageRef {
    /// Registry key.
    pub key: String,
    /// Declared package name.
    pub name: String,
}

/// The files of one package, in encounter order.
#[derive(Debug)]
pub(crate) struct ParsedPackage {
    pub name: Name,
    pub roots: Vec<AstRoot>,
}

pub(crate) struct Driver<'a> {
    pub fs: &'a dyn FileSystem,
    pub build: &'a BuildContext,
    pub hook: Option<&'a dyn AstHook>,
    pub interner: &'a StringInterner,
}

impl Driver<'_> {
    /// Parse every eligible file of `dir`.
    ///
    /// The first file kept decides the package name. With `skip_test`
    /// set, a file declaring another package is an error; otherwise it is
    /// kept and declared into the first file's package.
    #[tracing::instrument(level = "debug", skip(self, import), fields(dir = %dir.display()))]
    pub fn parse_dir(
        &self,
        dir: &Path,
        import_path: &str,
        skip_test: bool,
        mut import: impl FnMut(&ImportSpec) -> Result<PackageRef, LoadError>,
    ) -> Result<ParsedPackage, LoadError> {
        let entries = self
            .fs
            .list(dir)
            .map_err(|e| LoadError::io(import_path, dir, e))?;

        let mut package: Option<Name> = None;
        let mut roots = Vec::new();
        for entry in entries {
            if entry.is_dir || !filter::eligible(&entry.name, self.build, skip_test) {
                tracing::trace!(name = %entry.name, "skipping entry");
                continue;
            }
            let path = dir.join(&entry.name);
            let bytes = self
                .fs
                .read(&path)
                .map_err(|e| LoadError::io(import_path, &path, e))?;
            let text = String::from_utf8(bytes).map_err(|e| {
                LoadError::io(import_path, &path, io::Error::new(io::ErrorKind::InvalidData, e))
            })?;
            let file_name = path.display().to_string();

            match filter::constraints_satisfied(&text, self.build) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(file = %file_name, "excluded by build constraints");
                    continue;
                }
                Err(error) => {
                    tracing::warn!(
                        file = %file_name,
                        %error,
                        "invalid build constraint, skipping file"
                    );
                    continue;
                }
            }

            let tree = tarn_parse::parse(&text, &file_name, self.interner).map_err(|source| {
                LoadError::Parse {
                    import_path: import_path.to_string(),
                    source,
                }
            })?;
            let mut root =
                tarn_parse::build_ast(tree, self.interner).map_err(|source| LoadError::Ast {
                    import_path: import_path.to_string(),
                    source,
                })?;

            for index in 0..root.imports.len() {
                let spec = root.imports[index].spec.clone();
                let dependency = import(&spec)?;
                let local = spec
                    .alias
                    .unwrap_or_else(|| self.interner.intern(&dependency.name));
                root.bind_import(index, dependency.key, local);
            }

            if let Some(hook) = self.hook {
                if let Err(error) = hook.on_ast(&root, &file_name, self.interner) {
                    tracing::warn!(file = %file_name, %error, "AST hook failed");
                }
            }

            match package {
                None => package = Some(root.package),
                Some(first) if first != root.package => {
                    let first = self.interner.lookup(first);
                    let second = self.interner.lookup(root.package);
                    if skip_test {
                        return Err(LoadError::PackageNameConflict {
                            first: first.to_string(),
                            second: second.to_string(),
                            dir: dir.to_path_buf(),
                        });
                    }
                    tracing::debug!(
                        file = %file_name,
                        package = second,
                        into = first,
                        "declaring file of another package into the first"
                    );
                }
                Some(_) => {}
            }
            roots.push(root);
        }

        match package {
            Some(name) => Ok(ParsedPackage { name, roots }),
            None => Err(LoadError::NoSourceFiles {
                import_path: import_path.to_string(),
                dir: dir.to_path_buf(),
            }),
        }
    }
}
