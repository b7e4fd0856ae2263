//! Package assembly for unit tests.
//!
//! A stripped-down loader: parses sources, declares every top-level name
//! with a fresh slot, then runs the type, CFG and init-order passes.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tarn_ir::{
    AstRoot, DeclKind, DeclRef, NodeKind, PackageScope, Slot, StringInterner, Symbol, SymbolKind,
    BLANK_IDENT, MAIN_FUNC,
};

use crate::{
    buffer_handler, build_cfg, call, execute, gen_global_vars, resolve_package_types, CfgError,
    ExecEnv, ExecError, FileUnit, Frame, ImportTable, PackageEnv, PackageExports, Routine,
    SharedPrintHandler, Value,
};

pub(crate) struct Loaded {
    pub exports: Arc<PackageExports>,
    pub units: Vec<FileUnit>,
    pub globals: Arc<Routine>,
}

pub(crate) struct Harness {
    pub interner: StringInterner,
    pub imports: ImportTable,
    pub frame: Frame,
    pub print: SharedPrintHandler,
    pub max_call_depth: usize,
    next_slot: u32,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            interner: StringInterner::new(),
            imports: ImportTable::default(),
            frame: Frame::new(),
            print: buffer_handler(),
            max_call_depth: 256,
            next_slot: 0,
        }
    }

    pub fn env(&self) -> ExecEnv {
        ExecEnv {
            print: Arc::clone(&self.print),
            max_call_depth: self.max_call_depth,
        }
    }

    fn parse(&self, index: usize, source: &str) -> AstRoot {
        let file_name = format!("file{index}.tarn");
        let tree = tarn_parse::parse(source, &file_name, &self.interner)
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let mut root = tarn_parse::build_ast(tree, &self.interner)
            .unwrap_or_else(|e| panic!("ast failed: {e}"));
        for index in 0..root.imports.len() {
            let spec = root.imports[index].spec.clone();
            let Some(exports) = self.imports.get(&spec.path) else {
                panic!("import {:?} not loaded", spec.path);
            };
            let local = spec.alias.unwrap_or(exports.name);
            root.bind_import(index, spec.path, local);
        }
        root
    }

    /// Declare, type and compile a package without running anything.
    pub fn load(&mut self, import_path: &str, sources: &[&str]) -> Result<Loaded, CfgError> {
        let roots: Vec<AstRoot> = sources
            .iter()
            .enumerate()
            .map(|(i, source)| self.parse(i, source))
            .collect();
        let mut scope = PackageScope::new(import_path, roots[0].package);
        let mut blank_slots = FxHashMap::default();
        for (file, root) in roots.iter().enumerate() {
            for decl in &root.decls {
                let kind = match decl.kind {
                    DeclKind::Var => SymbolKind::Var,
                    DeclKind::Const => SymbolKind::Const,
                    DeclKind::Type => SymbolKind::Type,
                    DeclKind::Func => SymbolKind::Func,
                    DeclKind::Init => continue,
                };
                let slot = (kind != SymbolKind::Type).then(|| {
                    let slot = Slot::new(self.next_slot);
                    self.next_slot += 1;
                    slot
                });
                let decl_ref = DeclRef {
                    file: u32::try_from(file).unwrap_or(u32::MAX),
                    node: decl.node,
                };
                if self.interner.lookup(decl.name) == BLANK_IDENT {
                    if let Some(slot) = slot {
                        blank_slots.insert(decl_ref, slot);
                    }
                    continue;
                }
                let arity = match root.arena.kind(decl.node) {
                    NodeKind::Func { params, .. } => Some(params.len()),
                    _ => None,
                };
                let symbol = Symbol {
                    name: decl.name,
                    kind,
                    decl: decl_ref,
                    span: decl.span,
                    slot,
                    arity,
                    resolved: true,
                };
                if let Err(old) = scope.declare(symbol) {
                    panic!("{} redeclared", self.interner.lookup(old.name));
                }
            }
        }

        let types =
            resolve_package_types(import_path, &roots, &scope, &self.imports, &self.interner)?;
        let env = PackageEnv {
            import_path,
            scope: &scope,
            types: &types,
            blank_slots: &blank_slots,
            imports: &self.imports,
            interner: &self.interner,
        };
        let units = roots
            .iter()
            .enumerate()
            .map(|(i, root)| build_cfg(root, u32::try_from(i).unwrap_or(u32::MAX), &env))
            .collect::<Result<Vec<_>, _>>()?;
        let globals = gen_global_vars(import_path, &units, &self.interner)?;
        self.frame.grow(self.next_slot as usize);
        Ok(Loaded {
            exports: Arc::new(PackageExports {
                import_path: import_path.to_string(),
                name: roots[0].package,
                scope: Arc::new(scope),
                types: Arc::new(types),
            }),
            units,
            globals,
        })
    }

    /// Install functions, make the package importable, then run its
    /// wrappers, global initializers and init functions.
    pub fn register(&mut self, loaded: &Loaded) -> Result<(), ExecError> {
        let functions = loaded.units.iter().flat_map(|u| {
            u.functions
                .iter()
                .map(|(_, slot, routine)| (*slot, Value::Func(Arc::clone(routine))))
        });
        self.frame.install(self.next_slot as usize, functions);
        self.imports.insert(
            loaded.exports.import_path.clone(),
            Arc::clone(&loaded.exports),
        );
        let env = self.env();
        for unit in &loaded.units {
            execute(&unit.wrapper, &self.frame, &env)?;
        }
        execute(&loaded.globals, &self.frame, &env)?;
        for unit in &loaded.units {
            for init in &unit.init_nodes {
                execute(init, &self.frame, &env)?;
            }
        }
        Ok(())
    }

    pub fn load_and_register(&mut self, import_path: &str, sources: &[&str]) -> Loaded {
        let loaded = self
            .load(import_path, sources)
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        self.register(&loaded)
            .unwrap_or_else(|e| panic!("register failed: {e}"));
        loaded
    }

    /// Load `sources` as package main and run `main`.
    pub fn run_main(&mut self, sources: &[&str]) -> Result<String, ExecError> {
        let loaded = self
            .load("main", sources)
            .unwrap_or_else(|e| panic!("load failed: {e}"));
        self.register(&loaded)?;
        let main = self.interner.intern(MAIN_FUNC);
        let routine = loaded
            .units
            .iter()
            .find_map(|u| u.function(main))
            .unwrap_or_else(|| panic!("no main"));
        call(routine, Vec::new(), &self.frame, &self.env())?;
        Ok(self.print.output())
    }
}

/// Error text of a package that must fail to compile.
pub(crate) fn compile_error(sources: &[&str]) -> String {
    match Harness::new().load("main", sources) {
        Ok(_) => panic!("expected a compile error"),
        Err(e) => e.to_string(),
    }
}
