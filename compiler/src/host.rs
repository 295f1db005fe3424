//! Pluggable module resolution and source loading.
//!
//! The compiler itself knows nothing about the filesystem: it asks a
//! [`Host`] to resolve an import specifier relative to the module doing the
//! importing, then to load the resolved name's source text. The CLI wires
//! up a filesystem-backed host; tests can substitute an in-memory one.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Resolves module specifiers and loads their source text.
///
/// Implementors decide what a specifier like `"./util"` or `"std:string"`
/// means; the compiler only ever deals in the resolved names this trait
/// hands back.
pub trait Host {
    /// Resolves `specifier` (as written in an `import` statement) relative
    /// to `referrer` (the resolved name of the importing module, or `None`
    /// for the entry module) into a canonical module name.
    ///
    /// # Errors
    ///
    /// Returns an error if the specifier cannot be resolved.
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> anyhow::Result<String>;

    /// Loads the source text for an already-resolved module name.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved name has no backing source.
    fn load(&self, resolved: &str) -> anyhow::Result<String>;
}

/// Filesystem-backed [`Host`]: relative specifiers (`./foo`, `../foo`)
/// resolve against the referrer's directory, everything else is taken as
/// already-canonical. `std:` specifiers load from `stdlib_dir`; everything
/// else loads from `root`, both with a `.ember` extension appended.
pub struct FsHost {
    root: PathBuf,
    stdlib_dir: PathBuf,
}

impl FsHost {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, stdlib_dir: impl Into<PathBuf>) -> Self {
        FsHost {
            root: root.into(),
            stdlib_dir: stdlib_dir.into(),
        }
    }

    fn path_for(&self, resolved: &str) -> PathBuf {
        if let Some(name) = resolved.strip_prefix("std:") {
            self.stdlib_dir.join(format!("{name}.ember"))
        } else {
            self.root.join(format!("{resolved}.ember"))
        }
    }
}

impl Host for FsHost {
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> anyhow::Result<String> {
        if specifier.starts_with("std:") {
            return Ok(specifier.to_string());
        }
        if !specifier.starts_with('.') {
            return Ok(specifier.to_string());
        }
        let base = referrer
            .and_then(|r| Path::new(r).parent())
            .unwrap_or_else(|| Path::new(""));
        Ok(normalize(&base.join(specifier)))
    }

    fn load(&self, resolved: &str) -> anyhow::Result<String> {
        let path = self.path_for(resolved);
        std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to load module {resolved:?} from {path:?}: {e}"))
    }
}

/// Lexically collapses `.`/`..` components without touching the filesystem,
/// then joins what remains with `/` regardless of host path separator so
/// resolved module names are stable across platforms.
fn normalize(path: &Path) -> String {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(seg) => parts.push(seg.to_os_string()),
        }
    }
    parts
        .iter()
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// In-memory [`Host`] for tests: a fixed map of resolved name to source
/// text, with relative specifiers resolved the same way [`FsHost`] does.
pub struct MemoryHost {
    modules: HashMap<String, String>,
}

impl MemoryHost {
    #[must_use]
    pub fn new(modules: HashMap<String, String>) -> Self {
        MemoryHost { modules }
    }
}

impl Host for MemoryHost {
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> anyhow::Result<String> {
        if specifier.starts_with("std:") || !specifier.starts_with('.') {
            return Ok(specifier.to_string());
        }
        let base = referrer
            .and_then(|r| Path::new(r).parent())
            .unwrap_or_else(|| Path::new(""));
        Ok(normalize(&base.join(specifier)))
    }

    fn load(&self, resolved: &str) -> anyhow::Result<String> {
        self.modules
            .get(resolved)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("module not found: {resolved:?}"))
    }
}
