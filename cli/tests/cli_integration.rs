//! Integration tests for the Ember compiler CLI.
//!
//! These tests exercise the `emberc` binary in a realistic environment by
//! spawning the compiled executable and validating its behavior through
//! stdout, stderr, and exit codes.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn fixture(name: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn fails_when_file_missing() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("check").arg("this-file-does-not-exist.ember");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("path not found"));
}

#[test]
fn help_prints_commands_and_succeeds() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn check_succeeds_on_well_typed_module() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("check").arg(fixture("hello.ember"));
    cmd.assert().success().stdout(predicate::str::contains("ok"));
}

#[test]
fn check_reports_diagnostic_for_undefined_variable() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("check").arg(fixture("type_error.ember"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("TypeCheckError"));
}

#[test]
fn build_writes_a_wasm_binary_with_the_magic_header() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = fixture("hello.ember");
    let dest = temp.child("hello.ember");
    std::fs::copy(&src, dest.path()).unwrap();
    let out = temp.child("hello.wasm");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("build")
        .arg(dest.path())
        .arg("-o")
        .arg(out.path());
    cmd.assert().success();

    let bytes = std::fs::read(out.path()).unwrap();
    assert_eq!(&bytes[0..4], b"\0asm");
}

#[test]
fn build_defaults_output_to_wasm_extension() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = fixture("hello.ember");
    let dest = temp.child("hello.ember");
    std::fs::copy(&src, dest.path()).unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("build").arg(dest.path());
    cmd.assert().success();

    assert!(temp.child("hello.wasm").path().exists());
}

#[test]
fn shows_version() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("emberc"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
