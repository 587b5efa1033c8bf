use std::path::Path;

use tracing::debug;

use super::cross::container_root;
use super::{CPYTHON, ContainerSpec, CrossTarget, LogStream, SourceTriple, TargetError, TargetInfo, stream_until_interrupt};
use crate::consts::{FLASH_DIR, MAIN_NAME};

const MODULE_FILE: &str = "__init__.py";

/// Compiles and runs inside containers. Types other than cpython compile like
/// [`CrossTarget`].
#[derive(Debug, Clone)]
pub struct DockerTarget {
  cross: CrossTarget,
}

impl DockerTarget {
  pub fn new(cross: CrossTarget) -> Self {
    Self { cross }
  }

  pub fn info(&self) -> &TargetInfo {
    self.cross.info()
  }

  /// Python module content listing the triples as `source_from_to`.
  pub fn triples_module(triples: &[SourceTriple]) -> String {
    let items = triples
      .iter()
      .map(|t| {
        format!(
          "({}, {}, {})",
          python_str(&t.source.display().to_string()),
          python_str(&t.from.display().to_string()),
          python_str(&t.to.display().to_string())
        )
      })
      .collect::<Vec<_>>()
      .join(", ");
    format!("source_from_to = [{items}]\n")
  }

  /// The in-container program relocating sources per the triples module.
  pub fn compile_snippet(&self, module: &str) -> String {
    let operation = if self.info().precompile {
      "from py_compile import compile"
    } else {
      "from shutil import copy"
    };
    format!(
      "import pathlib\n\
       {operation} as operation\n\
       from {module} import source_from_to\n\
       path = pathlib.Path('/{module}')\n\
       for _, from_path, to_path in source_from_to:\n    \
       operation(str(path / from_path), str(path / to_path))\n    \
       print('%s -> %s' % (from_path, to_path))\n"
    )
  }

  pub async fn build_container(&self, build_root: &Path, triples: &[SourceTriple]) -> Result<LogStream, TargetError> {
    let info = self.info();
    if info.kind != CPYTHON {
      return self.cross.build_container(build_root, triples).await;
    }
    let root = container_root(build_root);
    let module = root.to_string_lossy().trim_start_matches('/').to_string();
    let module_path = build_root.join(MODULE_FILE);
    std::fs::write(&module_path, Self::triples_module(triples)).map_err(|source| TargetError::Write {
      path: module_path.clone(),
      source,
    })?;
    debug!(module = ?module_path, count = triples.len(), "wrote triples module");

    ContainerSpec::new(
      &info.kind,
      &format!("{}-build", info.kind),
      vec![
        "python".to_string(),
        "-B".to_string(),
        "-c".to_string(),
        self.compile_snippet(&module),
      ],
    )
    .volume(build_root, &root)
    .working_dir(Path::new("/"))
    .spawn()
    .await
  }

  /// The container command running the entry module.
  pub fn run_args(&self) -> Vec<String> {
    if self.info().kind == CPYTHON {
      vec!["python".to_string(), "-u".to_string(), format!("{MAIN_NAME}.pyc")]
    } else {
      vec!["micropython".to_string(), "-m".to_string(), MAIN_NAME.to_string()]
    }
  }

  /// Run the install tree mounted at `/flash` and stream its output.
  pub async fn run<F>(&self, path: &Path, silent: bool, callback: F) -> Result<(), TargetError>
  where
    F: FnMut(&str),
  {
    let kind = &self.info().kind;
    let stream = ContainerSpec::new(kind, &format!("{kind}-run"), self.run_args())
      .volume(path, Path::new(FLASH_DIR))
      .working_dir(Path::new(FLASH_DIR))
      .spawn()
      .await?;
    stream_until_interrupt(stream, silent, callback).await
  }
}

/// A single-quoted Python string literal.
fn python_str(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('\'');
  for ch in value.chars() {
    match ch {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '\n' => out.push_str("\\n"),
      _ => out.push(ch),
    }
  }
  out.push('\'');
  out
}
