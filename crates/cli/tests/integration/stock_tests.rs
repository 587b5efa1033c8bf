//! Stock listing and BOM resolution.

use predicates::prelude::*;

use super::common::{LOCAL_CONFIG, TestEnv};

fn graded() -> TestEnv {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ hello ]
parts:
  - name: hello
    path: hello.py
    uses: [ util ]
  - name: util
    path: util.py
"#,
  );
  env.write_file(
    "stock/B/pkg.mupy",
    r#"
exports: [ hello ]
parts:
  - name: hello
    path: hello.py
"#,
  );
  env
}

#[test]
fn stock_lists_levels_highest_first() {
  let env = graded();

  let output = env.mupy_cmd().arg("stock").assert().success().get_output().stdout.clone();
  let text = String::from_utf8(output).unwrap();
  let b = text.find("\nB\n").unwrap();
  let a = text.find("\nA\n").unwrap();
  assert!(b < a, "{text}");
  assert!(text.contains("  pkg"));
}

#[test]
fn stock_shows_one_ensemble() {
  let env = graded();

  env
    .mupy_cmd()
    .args(["stock", "pkg", "--grade", "A"])
    .assert()
    .success()
    .stdout(predicate::str::contains("uses: [ util ]"));
}

#[test]
fn higher_grade_shadows_lower() {
  let env = graded();

  env
    .mupy_cmd()
    .args(["bom", "pkg^hello"])
    .assert()
    .success()
    .stdout(predicate::str::diff("pkg^hello (B)\n"));

  env
    .mupy_cmd()
    .args(["bom", "pkg^hello", "--grade", "A"])
    .assert()
    .success()
    .stdout(predicate::str::diff("pkg^hello (A)\n  pkg^util (A)\n"));
}

#[test]
fn bom_as_json() {
  let env = graded();

  let output = env
    .mupy_cmd()
    .args(["bom", "pkg^hello", "-g", "A", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
  let nodes = json["nodes"].as_array().unwrap();
  assert_eq!(nodes.len(), 2);
  assert_eq!(nodes[1]["component"]["name"], "pkg^util");
  assert_eq!(nodes[1]["depth"], 1);
}

#[test]
fn circular_uses_fail() {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ a ]
parts:
  - name: a
    path: a.py
    uses: [ b ]
  - name: b
    path: b.py
    uses: [ a ]
"#,
  );

  env
    .mupy_cmd()
    .args(["bom", "pkg^a"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[semantic]:"))
    .stderr(predicate::str::contains("circular"));
}

#[test]
fn local_part_also_imported_is_rejected() {
  let env = TestEnv::new(LOCAL_CONFIG);
  env.write_file(
    "stock/A/pkg.mupy",
    r#"
exports: [ a ]
parts:
  - name: a
    path: a.py
    uses: [ log ]
  - name: log
    path: log.py
imports:
  - name: base
    parts:
      - { name: logging, as: log }
"#,
  );

  env
    .mupy_cmd()
    .args(["bom", "pkg^a"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("error[semantic]:"));
}

#[test]
fn unexported_entry_fails() {
  let env = graded();

  env
    .mupy_cmd()
    .args(["bom", "pkg^util", "--grade", "A"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("does not export 'pkg^util'"));
}
