//! Import registry.
//!
//! One entry per canonical import path, created when loading starts and
//! completed exactly once when the package is registered. The in-progress
//! mark is never cleared: a path that failed to load keeps reporting an
//! import cycle, and a registered path is never loaded again.
//!
//! Every entry is owned by the thread that started loading it until that
//! load settles. A request from the owning thread is a cycle, since loads
//! recurse on one thread. A request from any other thread blocks until
//! the owner settles the entry, unless the owner is itself waiting on the
//! requester, which is a cycle spanning threads.
//!
//! The lock is only held for the duration of one call and never across
//! the recursive loading of another package.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tarn_eval::{Frame, PackageExports, Value};
use tarn_ir::Slot;

use crate::error::LoadError;

/// Outcome of asking to start loading a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Begin {
    /// Already loaded; carries the display name.
    Registered(String),
    /// Marked in progress; the caller must load it now.
    Started,
}

#[derive(Debug, Default)]
struct Entry {
    /// Thread loading this path; `None` once the load settled.
    owner: Option<ThreadId>,
    name: Option<String>,
    exports: Option<Arc<PackageExports>>,
}

#[derive(Debug, Default)]
struct State {
    entries: FxHashMap<String, Entry>,
    /// Path each blocked thread is waiting for.
    waiting: FxHashMap<ThreadId, String>,
}

impl State {
    /// Whether `waiter` blocking on `key` would close a loop of threads
    /// waiting on each other.
    fn would_deadlock(&self, waiter: ThreadId, key: &str) -> bool {
        let mut key = key;
        for _ in 0..=self.waiting.len() {
            let Some(owner) = self.entries.get(key).and_then(|entry| entry.owner) else {
                return false;
            };
            if owner == waiter {
                return true;
            }
            match self.waiting.get(&owner) {
                Some(next) => key = next,
                None => return false,
            }
        }
        false
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<State>,
    settled: Condvar,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `key` and mark it in progress if it is neither loaded nor
    /// being loaded. Blocks while another thread is loading it.
    pub fn begin(&self, key: &str) -> Result<Begin, LoadError> {
        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            let Some(entry) = state.entries.get(key) else {
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        owner: Some(current),
                        ..Entry::default()
                    },
                );
                return Ok(Begin::Started);
            };
            match entry.owner {
                Some(owner) if owner != current => {
                    if state.would_deadlock(current, key) {
                        return Err(LoadError::ImportCycle {
                            import_path: key.to_string(),
                        });
                    }
                    tracing::debug!(%key, "waiting for another thread's load");
                    state.waiting.insert(current, key.to_string());
                    self.settled.wait(&mut state);
                    state.waiting.remove(&current);
                }
                _ => {
                    return match (&entry.exports, &entry.name) {
                        (Some(_), Some(name)) => Ok(Begin::Registered(name.clone())),
                        (Some(_), None) => Err(LoadError::inconsistent(
                            key,
                            "symbol table registered without a package name",
                        )),
                        (None, _) => Err(LoadError::ImportCycle {
                            import_path: key.to_string(),
                        }),
                    };
                }
            }
        }
    }

    /// Release the calling thread's hold on `key`, whatever the outcome of
    /// its load, and wake every thread waiting for it.
    pub fn settle(&self, key: &str) {
        if let Some(entry) = self.state.lock().entries.get_mut(key) {
            entry.owner = None;
        }
        self.settled.notify_all();
    }

    /// Settle `key` when the returned guard drops.
    pub fn settle_on_drop<'a>(&'a self, key: &'a str) -> Settle<'a> {
        Settle {
            registry: self,
            key,
        }
    }

    /// Install a package's exports, then grow `frame` to `slot_end` and
    /// store the package's function values, with the frame lock nested
    /// inside the registry lock.
    pub fn register(
        &self,
        key: &str,
        exports: Arc<PackageExports>,
        display_name: &str,
        frame: &Frame,
        slot_end: usize,
        functions: impl IntoIterator<Item = (Slot, Value)>,
    ) -> Result<(), LoadError> {
        let mut state = self.state.lock();
        let entry = state.entries.entry(key.to_string()).or_default();
        if entry.exports.is_some() || entry.name.is_some() {
            return Err(LoadError::inconsistent(key, "package registered twice"));
        }
        entry.exports = Some(exports);
        entry.name = Some(display_name.to_string());
        frame.install(slot_end, functions);
        Ok(())
    }

    pub fn exports(&self, key: &str) -> Option<Arc<PackageExports>> {
        self.state
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.exports.clone())
    }

    pub fn package_name(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.name.clone())
    }

    #[cfg(test)]
    pub(crate) fn is_in_progress(&self, key: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.exports.is_none())
    }

    #[cfg(test)]
    pub(crate) fn insert_exports_only(&self, key: &str, exports: Arc<PackageExports>) {
        self.state
            .lock()
            .entries
            .entry(key.to_string())
            .or_default()
            .exports = Some(exports);
    }
}

/// Settles one registry entry on drop, including when a load unwinds.
#[must_use = "the entry settles as soon as the guard drops"]
pub(crate) struct Settle<'a> {
    registry: &'a Registry,
    key: &'a str,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.registry.settle(self.key);
    }
}
