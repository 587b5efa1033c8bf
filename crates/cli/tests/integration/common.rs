//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Host configuration with one local target running kits through `/bin/sh`.
pub const LOCAL_CONFIG: &str = r#"
default:
  target: local
targets:
  - name: local
    mode: local
    type: cpython
    precompile: false
    tags: +host
    meta:
      interpreter: /bin/sh
"#;

/// Ensemble exporting `hello`, which prints a greeting when run by `/bin/sh`.
pub const HELLO_ENSEMBLE: &str = r#"
exports: [ hello ]
parts:
  - name: hello
    path: hello.py
"#;

/// Isolated host directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A host with `mupy.yaml` and an empty stock.
  pub fn new(config: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };
    env.write_file("mupy.yaml", config);
    std::fs::create_dir_all(env.path().join("stock")).unwrap();
    env
  }

  /// The hello-world host used by the end-to-end tests.
  pub fn hello() -> Self {
    let env = Self::new(LOCAL_CONFIG);
    env.write_file("stock/A/pkg.mupy", HELLO_ENSEMBLE);
    env.write_file("stock/A/hello.py", "echo \"Hello, world\"\n");
    env
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the host directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn build_path(&self) -> PathBuf {
    let p = self.path().join("build");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// A `mupy` command rooted at this host.
  pub fn mupy_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("mupy");
    cmd.env_remove("RUST_LOG");
    cmd.env("MUPY_DIRECTORY", self.path());
    cmd
  }
}
