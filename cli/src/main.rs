#![warn(clippy::pedantic)]

//! # Ember Compiler CLI
//!
//! Command line interface for the Ember toolchain.
//!
//! `emberc` is driven by a subcommand:
//!
//! - `help` – print usage information.
//! - `build <file> [-o out.wasm]` – type-check and emit a WASM-GC binary.
//! - `check <file>` – type-check only, reporting diagnostics to stderr.
//! - `run <file>` – build, then hand the module to an external WASM runtime
//!   (`wasmtime`). No interpreter is embedded in this crate.
//!
//! ## Exit codes
//! * 0 – success.
//! * 1 – usage / IO / type-check / codegen failure.

mod parser;
use clap::Parser;
use ember_compiler::{Compiler, Diagnostic, FsHost, StdlibManifest};
use parser::{Cli, Command};
use std::path::{Path, PathBuf};
use std::process::{self, Command as ProcessCommand};

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Help => print_help(),
        Command::Build { path, output } => run_build(&path, output.as_deref()),
        Command::Check { path } => run_check(&path),
        Command::Run { path } => run_run(&path),
    }
}

fn print_help() {
    println!("emberc - Ember compiler CLI");
    println!();
    println!("Commands:");
    println!("  help             Print this message");
    println!("  build <file>     Type-check and emit a WASM-GC binary");
    println!("  check <file>     Type-check without emitting code");
    println!("  run <file>       Build and execute with an external WASM runtime");
    process::exit(0);
}

/// The source root is the entry file's directory; modules resolve relative
/// to it the way [`ember_compiler::host::FsHost`] expects. The stdlib
/// directory is a sibling `stdlib/` under the same root.
fn host_for(path: &Path) -> FsHost {
    let root = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    FsHost::new(root, root.join("stdlib"))
}

fn entry_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main")
        .to_string()
}

fn manifest() -> StdlibManifest {
    StdlibManifest::embedded().unwrap_or_else(|e| {
        eprintln!("Error: failed to load stdlib manifest: {e}");
        process::exit(1);
    })
}

fn require_exists(path: &Path) {
    if !path.exists() {
        eprintln!("Error: path not found");
        process::exit(1);
    }
}

fn report_failure(err: &anyhow::Error) -> ! {
    for diagnostic in Diagnostic::from_check_error(err) {
        eprintln!("{}", diagnostic.render());
    }
    process::exit(1);
}

fn run_build(path: &Path, output: Option<&Path>) {
    require_exists(path);
    let compiler = Compiler::new(host_for(path), manifest());
    let wasm = match compiler.build(&entry_name(path)) {
        Ok(wasm) => wasm,
        Err(e) => report_failure(&e),
    };
    let out_path: PathBuf = output.map(Path::to_path_buf).unwrap_or_else(|| path.with_extension("wasm"));
    if let Err(e) = std::fs::write(&out_path, &wasm) {
        eprintln!("Error: failed to write {}: {e}", out_path.display());
        process::exit(1);
    }
    println!("wrote {}", out_path.display());
}

fn run_check(path: &Path) {
    require_exists(path);
    let compiler = Compiler::new(host_for(path), manifest());
    match compiler.check(&entry_name(path)) {
        Ok(_) => println!("ok"),
        Err(e) => report_failure(&e),
    }
}

fn run_run(path: &Path) {
    require_exists(path);
    let compiler = Compiler::new(host_for(path), manifest());
    let wasm = match compiler.build(&entry_name(path)) {
        Ok(wasm) => wasm,
        Err(e) => report_failure(&e),
    };

    let module_path = std::env::temp_dir().join(format!("{}.wasm", entry_name(path)));
    if let Err(e) = std::fs::write(&module_path, &wasm) {
        eprintln!("Error: failed to write temporary module: {e}");
        process::exit(1);
    }

    match ProcessCommand::new("wasmtime").arg(&module_path).status() {
        Ok(status) => process::exit(status.code().unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: failed to launch wasmtime: {e}");
            process::exit(1);
        }
    }
}
