//! CLI smoke tests for mupy.
//!
//! These tests verify that commands parse, fail cleanly and report the error
//! kind without needing docker or a device.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn mupy_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("mupy");
  cmd.env_remove("MUPY_DIRECTORY").env_remove("RUST_LOG");
  cmd
}

#[test]
fn help_flag_works() {
  mupy_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  mupy_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("mupy"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["setup", "images", "stock", "bom", "kit", "build", "install", "run"] {
    mupy_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn missing_reference_is_a_usage_error() {
  mupy_cmd().arg("bom").assert().failure().code(2);
}

#[test]
fn missing_configuration_is_semantic() {
  let temp = TempDir::new().unwrap();
  mupy_cmd()
    .arg("-d")
    .arg(temp.path())
    .args(["bom", "pkg^hello"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[semantic]:"))
    .stderr(predicate::str::contains("mupy.yaml not found"));
}

#[test]
fn directory_from_environment() {
  let temp = TempDir::new().unwrap();
  mupy_cmd()
    .env("MUPY_DIRECTORY", temp.path())
    .args(["setup"])
    .assert()
    .success();
  assert!(temp.path().join("mupy.yaml").is_file());
}

#[test]
fn setup_twice_requires_force() {
  let temp = TempDir::new().unwrap();
  let run = |force: bool| {
    let mut cmd = mupy_cmd();
    cmd.arg("-d").arg(temp.path()).arg("setup");
    if force {
      cmd.arg("--force");
    }
    cmd.assert()
  };

  run(false).success().stdout(predicate::str::contains("mupy.yaml"));
  run(false)
    .code(1)
    .stderr(predicate::str::contains("error[semantic]:"))
    .stderr(predicate::str::contains("already exists"));
  run(true).success();
}

#[test]
fn quiet_setup_prints_nothing() {
  let temp = TempDir::new().unwrap();
  mupy_cmd()
    .arg("-q")
    .arg("-d")
    .arg(temp.path())
    .arg("setup")
    .assert()
    .success()
    .stdout(predicate::str::is_empty());
}
