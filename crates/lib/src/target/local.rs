use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use super::{LogStream, SourceTriple, TargetError, TargetInfo, stream_until_interrupt};
use crate::consts::MAIN_NAME;

const DEFAULT_INTERPRETER: &str = "python3";

const PY_COMPILE: &str =
  "import py_compile, sys; py_compile.compile(sys.argv[1], cfile=sys.argv[2], doraise=True)";

/// Compiles and runs on this host with a local interpreter.
#[derive(Debug, Clone)]
pub struct LocalTarget {
  info: TargetInfo,
  interpreter: String,
}

impl LocalTarget {
  pub fn new(info: TargetInfo, interpreter: Option<String>) -> Self {
    Self {
      info,
      interpreter: interpreter.unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
    }
  }

  pub fn info(&self) -> &TargetInfo {
    &self.info
  }

  pub fn interpreter(&self) -> &str {
    &self.interpreter
  }

  /// Compile (or copy) each triple directly; the log lists the outputs.
  pub async fn build_container(&self, build_root: &Path, triples: &[SourceTriple]) -> Result<LogStream, TargetError> {
    let mut lines = Vec::with_capacity(triples.len());
    for triple in triples {
      let from = build_root.join(&triple.from);
      let to = build_root.join(&triple.to);
      if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
          .await
          .map_err(|source| TargetError::Write {
            path: parent.to_path_buf(),
            source,
          })?;
      }
      if self.info.precompile {
        self.compile(&from, &to).await?;
      } else {
        tokio::fs::copy(&from, &to)
          .await
          .map_err(|source| TargetError::Write { path: to.clone(), source })?;
      }
      debug!(from = ?triple.from, to = ?triple.to, "compiled");
      lines.push(triple.to.display().to_string());
    }
    Ok(LogStream::buffered(lines))
  }

  async fn compile(&self, from: &Path, to: &Path) -> Result<(), TargetError> {
    let mut command = Command::new(&self.interpreter);
    command.arg("-c").arg(PY_COMPILE).arg(from).arg(to);
    LogStream::spawn(command, &self.interpreter)?
      .drain(|line| debug!(line, "py_compile"))
      .await
  }

  /// Run `main<suffix>` in the install directory.
  pub async fn run<F>(&self, path: &Path, suffix: &str, silent: bool, callback: F) -> Result<(), TargetError>
  where
    F: FnMut(&str),
  {
    let mut command = Command::new(&self.interpreter);
    command.arg(format!("{MAIN_NAME}{suffix}")).current_dir(path);
    let stream = LogStream::spawn(command, &self.interpreter)?;
    stream_until_interrupt(stream, silent, callback).await
  }
}
