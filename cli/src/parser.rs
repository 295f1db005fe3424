//! Command line argument parsing for the Ember compiler.
//!
//! This module defines the CLI interface using `clap`. The `Cli` struct
//! captures the subcommand and its arguments passed to the `emberc` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface definition for the Ember compiler.
///
/// `emberc` is driven by a subcommand rather than phase flags: `build` runs
/// the full pipeline through codegen, `check` stops after type checking,
/// and `run` builds then hands the module to an external WASM runtime.
#[derive(Parser)]
#[command(
    name = "emberc",
    author,
    version,
    about = "Ember compiler CLI (emberc)"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print usage information.
    Help,

    /// Type-check `path` and emit a WASM-GC binary.
    Build {
        /// Path to the entry module's source file.
        path: PathBuf,

        /// Where to write the compiled module. Defaults to `path` with a
        /// `.wasm` extension.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Type-check `path` and report diagnostics, without emitting code.
    Check {
        /// Path to the entry module's source file.
        path: PathBuf,
    },

    /// Build `path` and execute it with an external WASM runtime.
    Run {
        /// Path to the entry module's source file.
        path: PathBuf,
    },
}
