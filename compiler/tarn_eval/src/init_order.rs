//! Package-level variable initialization order.
//!
//! Variables are initialized in declaration order across the package's
//! files, except that a variable is never initialized before the variables
//! its initializer depends on. A dependency is a reference to another
//! package-level variable or constant, either directly or through the
//! bodies of the functions the initializer references.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tarn_ir::{LineIndex, Name, Span, StringInterner, BLANK_IDENT};

use crate::cfg::{FileUnit, GlobalInit};
use crate::code::{FileContext, Routine, RoutineKind, Stmt, StmtKind};
use crate::errors::{CfgError, CfgErrorKind};

/// Build the routine that runs every global initializer of a package in
/// dependency order.
#[tracing::instrument(level = "debug", skip(units, interner))]
pub fn gen_global_vars(
    package: &str,
    units: &[FileUnit],
    interner: &StringInterner,
) -> Result<Arc<Routine>, CfgError> {
    let globals: Vec<&GlobalInit> = units.iter().flat_map(|u| &u.globals).collect();
    let index: FxHashMap<Name, usize> = globals
        .iter()
        .enumerate()
        .filter(|(_, g)| interner.lookup(g.name) != BLANK_IDENT)
        .map(|(i, g)| (g.name, i))
        .collect();
    let funcs: FxHashMap<Name, &Vec<Name>> = units
        .iter()
        .flat_map(|u| u.func_refs.iter().map(|(name, refs)| (*name, refs)))
        .collect();

    let deps: Vec<Vec<usize>> = globals
        .iter()
        .map(|g| dependencies(&g.refs, &index, &funcs))
        .collect();

    let mut done = vec![false; globals.len()];
    let mut order = Vec::with_capacity(globals.len());
    while order.len() < globals.len() {
        let ready = (0..globals.len())
            .find(|&i| !done[i] && deps[i].iter().all(|&d| done[d] && d != i));
        let Some(next) = ready else {
            return Err(cycle_error(&globals, &deps, &done, interner));
        };
        done[next] = true;
        order.push(next);
    }

    let body = order
        .iter()
        .map(|&i| Stmt {
            kind: StmtKind::Invoke(Arc::clone(&globals[i].routine)),
            span: Span::DUMMY,
        })
        .collect();
    let context = units.first().map_or_else(
        || Arc::new(FileContext::new("", LineIndex::default(), Vec::new())),
        |u| Arc::clone(&u.wrapper.context),
    );
    tracing::debug!(globals = order.len(), "ordered global initializers");
    Ok(Arc::new(Routine {
        name: format!("{package}.<globals>"),
        kind: RoutineKind::Globals,
        context,
        params: 0,
        locals: 0,
        body,
        span: Span::DUMMY,
    }))
}

/// Globals an initializer depends on, following function bodies.
fn dependencies(
    refs: &[Name],
    index: &FxHashMap<Name, usize>,
    funcs: &FxHashMap<Name, &Vec<Name>>,
) -> Vec<usize> {
    let mut out = Vec::new();
    let mut seen_funcs = FxHashSet::default();
    let mut stack: Vec<Name> = refs.iter().rev().copied().collect();
    while let Some(name) = stack.pop() {
        if let Some(&global) = index.get(&name) {
            if !out.contains(&global) {
                out.push(global);
            }
        } else if let Some(body_refs) = funcs.get(&name) {
            if seen_funcs.insert(name) {
                stack.extend(body_refs.iter().rev().copied());
            }
        }
    }
    out
}

/// Report the first cycle reachable from the earliest uninitialized global.
#[cold]
fn cycle_error(
    globals: &[&GlobalInit],
    deps: &[Vec<usize>],
    done: &[bool],
    interner: &StringInterner,
) -> CfgError {
    let start = done.iter().position(|d| !d).unwrap_or(0);
    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&d| !done[d]) else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            path.drain(..pos);
            path.push(next);
            break;
        }
        path.push(next);
        current = next;
    }
    let names = path
        .iter()
        .map(|&i| interner.lookup(globals[i].name).to_string())
        .collect();
    let first = globals[path[0]];
    CfgError::new(
        CfgErrorKind::InitializationCycle { names },
        &first.file,
        first.position,
    )
}
