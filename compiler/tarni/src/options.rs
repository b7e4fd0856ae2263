//! Loader configuration.
//!
//! Everything the loader needs to know about its environment is passed in
//! explicitly through [`Options`]; nothing else reads process state.
//! [`Options::from_env`] is the one place that looks at environment
//! variables.

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use tarn_eval::DEFAULT_MAX_CALL_DEPTH;

/// Operating systems recognized in `_<os>` file name suffixes.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux", "netbsd",
    "openbsd", "plan9", "solaris", "wasip1", "windows",
];

/// Architectures recognized in `_<arch>` file name suffixes.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
    "ppc64le", "riscv64", "s390x", "wasm",
];

/// Target description used to select files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildContext {
    pub os: String,
    pub arch: String,
    /// Extra tags satisfied by build constraints.
    pub tags: Vec<String>,
}

impl BuildContext {
    /// Context of the machine the interpreter runs on.
    pub fn host() -> Self {
        BuildContext {
            os: host_os().to_string(),
            arch: host_arch().to_string(),
            tags: Vec::new(),
        }
    }

    /// Whether a build-constraint tag holds.
    pub fn matches_tag(&self, tag: &str) -> bool {
        tag == self.os
            || tag == self.arch
            || (tag == "unix" && is_unix(&self.os))
            || self.tags.iter().any(|t| t == tag)
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::host()
    }
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

fn is_unix(os: &str) -> bool {
    matches!(
        os,
        "aix"
            | "android"
            | "darwin"
            | "dragonfly"
            | "freebsd"
            | "illumos"
            | "ios"
            | "linux"
            | "netbsd"
            | "openbsd"
            | "solaris"
    )
}

/// Interpreter configuration.
#[derive(Clone, Debug)]
pub struct Options {
    /// Roots searched as `<root>/src/<import path>`, in order.
    pub package_roots: Vec<PathBuf>,
    /// Starting point of the tool-root search.
    pub tool_root: Option<PathBuf>,
    /// Explicit import path to directory entries, consulted first.
    pub package_index: FxHashMap<String, PathBuf>,
    pub build: BuildContext,
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            package_roots: Vec::new(),
            tool_root: None,
            package_index: FxHashMap::default(),
            build: BuildContext::host(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Options {
    /// Read configuration from the process environment.
    ///
    /// - `TARN_PATH`: package roots, `:`-separated
    /// - `TARN_TOOLROOT`: start of the tool-root search
    /// - `TARN_OS`, `TARN_ARCH`: override the host build context
    /// - `TARN_TAGS`: extra build tags, comma- or space-separated
    /// - `TARN_MAX_CALL_DEPTH`: evaluator recursion limit
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`Options::from_env`] over an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Options::default();
        if let Some(path) = lookup("TARN_PATH") {
            options.package_roots = path
                .split(':')
                .filter(|root| !root.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        options.tool_root = lookup("TARN_TOOLROOT")
            .filter(|root| !root.is_empty())
            .map(PathBuf::from);
        if let Some(os) = lookup("TARN_OS").filter(|s| !s.is_empty()) {
            options.build.os = os;
        }
        if let Some(arch) = lookup("TARN_ARCH").filter(|s| !s.is_empty()) {
            options.build.arch = arch;
        }
        if let Some(tags) = lookup("TARN_TAGS") {
            options.build.tags = tags
                .split([',', ' '])
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
        }
        match lookup("TARN_MAX_CALL_DEPTH").map(|s| s.trim().parse::<usize>()) {
            Some(Ok(depth)) if depth > 0 => options.max_call_depth = depth,
            Some(_) => tracing::warn!("ignoring invalid TARN_MAX_CALL_DEPTH"),
            None => {}
        }
        options
    }

    /// Whether any way of finding non-relative packages is configured.
    pub fn has_search_locations(&self) -> bool {
        !self.package_roots.is_empty() || !self.package_index.is_empty() || self.tool_root.is_some()
    }
}
