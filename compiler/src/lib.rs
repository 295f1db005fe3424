#![warn(clippy::pedantic)]
//! Orchestration crate for the Ember compiler pipeline.
//!
//! This crate owns nothing about where source text comes from or how a
//! finished module is consumed: it threads a caller-supplied [`host::Host`]
//! through parsing, bundles every transitively-imported module into one
//! [`ember_ast::arena::Arena`], type-checks the bundle, and hands the result
//! to [`ember_wasm_codegen`]. The CLI crate is a thin collaborator over
//! [`pipeline::Compiler`].
//!
//! ## Modules
//!
//! - [`host`] — the `Host` trait and its filesystem/in-memory implementations
//! - [`manifest`] — the stdlib manifest gating which `std:` imports are valid
//! - [`pipeline`] — [`pipeline::Compiler`], the bundling/check/build driver
//! - [`diagnostics`] — the flat diagnostic record the driver renders
//!
//! # Examples
//!
//! ```rust,no_run
//! use ember_compiler::{Compiler, FsHost, StdlibManifest};
//!
//! fn compile(entry: &str) -> anyhow::Result<Vec<u8>> {
//!     let host = FsHost::new(".", "stdlib");
//!     let compiler = Compiler::new(host, StdlibManifest::embedded()?);
//!     compiler.build(entry)
//! }
//! ```

pub mod diagnostics;
pub mod host;
pub mod manifest;
pub mod pipeline;

pub use diagnostics::{Diagnostic, Severity};
pub use host::{FsHost, Host, MemoryHost};
pub use manifest::StdlibManifest;
pub use pipeline::Compiler;
