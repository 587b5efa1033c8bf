//! Kit, build, install and run against a local `/bin/sh` target.

use predicates::prelude::*;

use super::common::{LOCAL_CONFIG, TestEnv};

#[test]
fn run_prints_hello() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["run", "pkg^hello@local"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Hello, world"));
}

#[test]
fn run_uses_default_target() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["-q", "run", "pkg^hello"])
    .assert()
    .success()
    .stdout(predicate::str::diff("Hello, world\n"));
}

#[test]
fn silent_run_hides_program_output() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["run", "--silent", "pkg^hello@local"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Hello, world").not());
}

#[test]
fn kit_renames_entry_to_main() {
  let env = TestEnv::hello();

  env.mupy_cmd().args(["kit", "pkg^hello"]).assert().success();

  let main = env.build_path().join("kit").join("pkg^hello").join("main.py");
  assert_eq!(std::fs::read_to_string(main).unwrap(), "echo \"Hello, world\"\n");
}

#[test]
fn build_fills_install_tree() {
  let env = TestEnv::hello();

  env.mupy_cmd().args(["build", "pkg^hello@local"]).assert().success();
  env.mupy_cmd().args(["build", "pkg^hello@local"]).assert().success();

  let install = env.build_path().join("install").join("pkg^hello").join("local");
  assert!(install.join("main.py").is_file());
}

#[test]
fn extra_tags_select_tagged_path() {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ hello ]
parts:
  - name: hello
    path: hello.py
    path+debug: debug.py
"#,
  );
  env.write_file("stock/A/hello.py", "echo plain\n");
  env.write_file("stock/A/debug.py", "echo debug\n");

  env
    .mupy_cmd()
    .args(["-q", "run", "--tags", "+debug", "pkg^hello"])
    .assert()
    .success()
    .stdout(predicate::str::diff("debug\n"));
}

#[test]
fn hook_output_is_progress() {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ hello ]
parts:
  - name: hello
    path: hello.py
    uses: [ banner ]
  - name: banner
    shlet: { word: hooked }
    shell: "echo {word} {origin}"
"#,
  );
  env.write_file("stock/A/hello.py", "echo hi\n");

  env
    .mupy_cmd()
    .args(["kit", "pkg^hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hooked banner"));

  env
    .mupy_cmd()
    .args(["-q", "kit", "pkg^hello"])
    .assert()
    .success()
    .stdout(predicate::str::is_empty());
}

#[test]
fn failing_hook_is_a_backend_error() {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ hello ]
parts:
  - name: hello
    shell: "exit 3"
"#,
  );

  env
    .mupy_cmd()
    .args(["kit", "pkg^hello"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[backend]:"))
    .stderr(predicate::str::contains("exit code 3"));
}

#[test]
fn unknown_target_fails() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["build", "pkg^hello@esp32"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[semantic]:"))
    .stderr(predicate::str::contains("esp32"));
}

#[test]
fn malformed_reference_is_syntax() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["kit", "pkg^^hello"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[syntax]:"));
}

#[test]
fn debug_prints_cause_chain() {
  let env = TestEnv::hello();

  env
    .mupy_cmd()
    .args(["--debug", "build", "pkg^hello@esp32"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("1: "));
}
