//! The package pipeline: locate, parse, GTA, CFG, register, run.
//!
//! [`Interpreter::load`] is re-entered for every import a file makes,
//! before that file's own package gets past parsing. A package therefore
//! only reaches GTA once all of its dependencies are registered and
//! initialized.

use std::path::Path;
use std::sync::Arc;

use tarn_eval::{
    build_cfg, gen_global_vars, resolve_package_types, CfgError, FileUnit, ImportTable,
    PackageEnv, PackageExports, Value,
};
use tarn_ir::{AstRoot, MAIN_FUNC};

use crate::driver::{Driver, PackageRef};
use crate::error::LoadError;
use crate::gta::{Gta, Revisit};
use crate::interp::{ImportRequest, Interpreter};
use crate::locate::{effective_sub_path, package_context, Located, Locator, ENTRY_CONTEXT};
use crate::sequencer::Plan;

impl Interpreter {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(context = %request.context, path = %request.import_path)
    )]
    pub(crate) fn load(&self, request: &ImportRequest) -> Result<PackageRef, LoadError> {
        let locator = Locator {
            registry: &self.registry,
            discovery: self.discovery.as_ref(),
            fs: self.fs.as_ref(),
            source_root: &self.source_root,
        };
        let (key, dir) = match locator.resolve(&request.context, &request.import_path)? {
            Located::Registered { key, name } => return Ok(PackageRef { key, name }),
            Located::Directory { key, dir } => (key, dir),
        };
        let name = {
            let _settle = self.registry.settle_on_drop(&key);
            self.load_directory(request, &key, &dir)?
        };
        Ok(PackageRef { key, name })
    }

    /// Everything after locating: parse, declare, compile, register, run.
    fn load_directory(
        &self,
        request: &ImportRequest,
        key: &str,
        dir: &Path,
    ) -> Result<String, LoadError> {
        let child_context = package_context(&self.source_root, dir);
        let driver = Driver {
            fs: self.fs.as_ref(),
            build: &self.options.build,
            hook: self.hook.as_deref(),
            interner: &self.interner,
        };
        let parsed = driver.parse_dir(dir, key, request.skip_test, |spec| {
            self.load(&ImportRequest {
                context: child_context.clone(),
                import_path: spec.path.clone(),
                skip_test: true,
            })
        })?;
        let name = self.interner.lookup(parsed.name).to_string();
        let roots = parsed.roots;

        let sub_path = effective_sub_path(&request.context, &request.import_path);
        let mut gta = Gta::new(key, parsed.name, &self.interner, &self.slots);
        let mut revisit = Revisit::new();
        for file in 0..roots.len() {
            gta.declare_file(&roots, file, &sub_path, &mut revisit)?;
        }
        gta.retry(&roots, revisit)?;
        let (scope, blank_slots) = gta.finish();

        let cfg_error = |source: CfgError| LoadError::Cfg {
            import_path: key.to_string(),
            source,
        };
        let imports = self.import_table(&roots);
        let types = resolve_package_types(key, &roots, &scope, &imports, &self.interner)
            .map_err(cfg_error)?;
        let env = PackageEnv {
            import_path: key,
            scope: &scope,
            types: &types,
            blank_slots: &blank_slots,
            imports: &imports,
            interner: &self.interner,
        };
        let units = roots
            .iter()
            .enumerate()
            .map(|(i, root)| build_cfg(root, u32::try_from(i).unwrap_or(u32::MAX), &env))
            .collect::<Result<Vec<FileUnit>, _>>()
            .map_err(cfg_error)?;
        let globals = gen_global_vars(&name, &units, &self.interner).map_err(cfg_error)?;

        let exports = Arc::new(PackageExports {
            import_path: key.to_string(),
            name: parsed.name,
            scope: Arc::new(scope),
            types: Arc::new(types),
        });
        let functions = units.iter().flat_map(|unit| {
            unit.functions
                .iter()
                .map(|(_, slot, routine)| (*slot, Value::Func(Arc::clone(routine))))
        });
        self.registry.register(
            key,
            exports,
            &name,
            &self.frame,
            self.slots.high_water(),
            functions,
        )?;
        tracing::debug!(%key, package = %name, files = units.len(), "registered");

        let runs_entry =
            request.context == ENTRY_CONTEXT && name == MAIN_FUNC && request.skip_test;
        let main = self.interner.intern(MAIN_FUNC);
        let entry = if runs_entry {
            units.iter().find_map(|unit| unit.function(main))
        } else {
            None
        };
        Plan {
            units: &units,
            globals: &globals,
            entry,
        }
        .run(key, &self.frame, &self.exec_env())?;

        Ok(name)
    }

    /// Exports of every package the files of `roots` import.
    fn import_table(&self, roots: &[AstRoot]) -> ImportTable {
        let mut table = ImportTable::default();
        for import in roots.iter().flat_map(|root| &root.imports) {
            let Some(path) = &import.import_path else {
                continue;
            };
            if table.contains_key(path) {
                continue;
            }
            if let Some(exports) = self.registry.exports(path) {
                table.insert(path.clone(), exports);
            }
        }
        table
    }
}
