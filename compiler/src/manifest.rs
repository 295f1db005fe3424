//! Stdlib manifest: which module names are importable, and how a virtual
//! stdlib specifier remaps to the module backing a given target.
//!
//! Deserialized from a JSON document shaped like:
//!
//! ```json
//! {
//!   "modules": {
//!     "std:string": { "virtual": { "host": "std:string-host", "wasi": "std:string-wasi" } },
//!     "std:math": {}
//!   },
//!   "internal": ["__array_new", "__array_get", "__array_set", "__array_len", "unreachable", "hash"]
//! }
//! ```

use rustc_hash::FxHashMap;
use serde::Deserialize;

const EMBEDDED_MANIFEST: &str = include_str!("../resources/stdlib_manifest.json");

/// Host target a virtual stdlib module resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Host,
    Wasi,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct VirtualMapping {
    pub host: Option<String>,
    pub wasi: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModuleEntry {
    #[serde(default, rename = "virtual")]
    pub virtual_mapping: Option<VirtualMapping>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StdlibManifest {
    #[serde(default)]
    pub modules: FxHashMap<String, ModuleEntry>,
    #[serde(default)]
    pub internal: Vec<String>,
}

impl StdlibManifest {
    /// Parses a manifest from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON or doesn't match the
    /// manifest shape.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The manifest this compiler ships with, covering the intrinsic names
    /// of §4.5.8 and a small set of stdlib modules.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded manifest itself is malformed,
    /// which would be a packaging bug rather than a user-facing condition.
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_json(EMBEDDED_MANIFEST)
    }

    /// True when `name` is a publicly importable stdlib module.
    #[must_use]
    pub fn is_public(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// True when `name` is one of the compiler's own intrinsic-only names
    /// (§4.5.8), reachable only through prelude injection rather than a
    /// user `import`.
    #[must_use]
    pub fn is_internal(&self, name: &str) -> bool {
        self.internal.iter().any(|n| n == name)
    }

    /// Remaps a virtual stdlib specifier (e.g. `std:string`) to the
    /// concrete module backing `target`, falling back to the specifier
    /// itself when no mapping is declared.
    #[must_use]
    pub fn remap(&self, name: &str, target: Target) -> String {
        let Some(entry) = self.modules.get(name) else {
            return name.to_string();
        };
        let Some(mapping) = &entry.virtual_mapping else {
            return name.to_string();
        };
        let mapped = match target {
            Target::Host => mapping.host.as_deref(),
            Target::Wasi => mapping.wasi.as_deref(),
        };
        mapped.unwrap_or(name).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_manifest_parses() {
        let manifest = StdlibManifest::embedded().unwrap();
        assert!(manifest.is_internal("__array_new"));
        assert!(manifest.is_public("std:string"));
    }

    #[test]
    fn remap_falls_back_to_name_without_mapping() {
        let manifest = StdlibManifest::from_json(r#"{"modules":{"std:math":{}},"internal":[]}"#).unwrap();
        assert_eq!(manifest.remap("std:math", Target::Host), "std:math");
    }

    #[test]
    fn remap_picks_host_target() {
        let manifest = StdlibManifest::from_json(
            r#"{"modules":{"std:string":{"virtual":{"host":"std:string-host","wasi":"std:string-wasi"}}},"internal":[]}"#,
        )
        .unwrap();
        assert_eq!(manifest.remap("std:string", Target::Host), "std:string-host");
        assert_eq!(manifest.remap("std:string", Target::Wasi), "std:string-wasi");
    }

    #[test]
    fn unknown_module_is_not_public() {
        let manifest = StdlibManifest::default();
        assert!(!manifest.is_public("std:nonexistent"));
    }
}
