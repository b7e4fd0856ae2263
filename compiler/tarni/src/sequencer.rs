//! Execution sequencer.
//!
//! Runs a freshly registered package in four steps:
//!
//! 1. every file wrapper, in parse order, against a private frame (they
//!    only bind imports);
//! 2. the synthesized global initializer routine against the shared frame;
//! 3. for the entry package, `main` is appended to the init list;
//! 4. every init node in file order, then `main`.

use std::sync::Arc;

use tarn_eval::{execute, ExecEnv, FileUnit, Frame, Routine};

use crate::error::LoadError;

pub(crate) struct Plan<'a> {
    pub units: &'a [FileUnit],
    pub globals: &'a Arc<Routine>,
    /// `main`, when this load runs the entry point.
    pub entry: Option<&'a Arc<Routine>>,
}

impl Plan<'_> {
    /// Routines of step 4, in order.
    pub fn init_list(&self) -> Vec<&Arc<Routine>> {
        self.units
            .iter()
            .flat_map(|unit| &unit.init_nodes)
            .chain(self.entry)
            .collect()
    }

    #[tracing::instrument(level = "debug", skip_all, fields(package = import_path))]
    pub fn run(&self, import_path: &str, frame: &Frame, env: &ExecEnv) -> Result<(), LoadError> {
        let wrap = |source| LoadError::Execution {
            import_path: import_path.to_string(),
            source,
        };

        let private = Frame::new();
        for unit in self.units {
            execute(&unit.wrapper, &private, env).map_err(wrap)?;
        }
        execute(self.globals, frame, env).map_err(wrap)?;
        for routine in self.init_list() {
            tracing::trace!(routine = %routine.name, "running");
            execute(routine, frame, env).map_err(wrap)?;
        }
        Ok(())
    }
}
