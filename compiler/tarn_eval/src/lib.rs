//! Tarn Eval - CFG builder and evaluator for the Tarn interpreter.
//!
//! # Architecture
//!
//! - [`resolve_package_types`]: types of every package-level declaration
//! - [`build_cfg`]: compiles one file into [`Routine`]s with resolved names
//! - [`gen_global_vars`]: orders a package's global initializers
//! - [`execute`] / [`call`]: runs routines against the shared [`Frame`]
//! - [`PrintHandlerImpl`]: where `print` and `println` output goes
//!
//! Package-level values of every loaded package live in one [`Frame`],
//! addressed by [`tarn_ir::Slot`]. Routines never hold references into
//! the frame; they load and store by slot.

mod cfg;
mod code;
mod errors;
mod exec;
mod frame;
mod init_order;
mod print_handler;
mod types;
mod value;

#[cfg(test)]
mod test_support;

pub use cfg::{build_cfg, FileUnit, GlobalInit, ImportTable, PackageEnv, PackageExports};
pub use code::{Builtin, FileContext, Routine, RoutineKind};
pub use errors::{CfgError, CfgErrorKind, ExecError, ExecErrorKind};
pub use exec::{call, execute, ExecEnv, DEFAULT_MAX_CALL_DEPTH};
pub use frame::Frame;
pub use init_order::gen_global_vars;
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler, StdoutPrintHandler,
};
pub use types::{is_predeclared, resolve_package_types, Basic, PackageTypes, Signature, Ty};
pub use value::Value;
