//! Build, install and run backends.
//!
//! A [`Target`] is one of three closed variants selected by the configured
//! `mode`. Every variant compiles a batch of sources in one backend call,
//! deploys an install tree and runs it.

mod container;
mod cross;
mod docker;
mod local;
mod mode;
mod stream;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::TargetConfig;
use crate::tag::{TagError, TagRay};

pub use container::ContainerSpec;
pub use cross::CrossTarget;
pub use docker::DockerTarget;
pub use local::LocalTarget;
pub use mode::{IMAGE_REPOSITORY, Mode, remove_all_images};
pub use stream::LogStream;

pub const CPYTHON: &str = "cpython";
pub const MICROPYTHON: &str = "micropython";

#[derive(Debug, Error)]
pub enum TargetError {
  #[error("unknown target mode '{mode}' for target '{target}'")]
  UnknownMode { target: String, mode: String },

  #[error("invalid tags for target '{target}': {source}")]
  Tags { target: String, source: TagError },

  #[error("cannot write {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error("missing {tool}; please install it")]
  MissingTool { tool: String },

  #[error("failed to start '{command}': {source}")]
  Spawn { command: String, source: std::io::Error },

  #[error("'{command}' failed with exit code {}", exit_code(.code))]
  BackendFailed { command: String, code: Option<i32> },

  #[error("docker {operation} failed: {source}")]
  Docker {
    operation: &'static str,
    source: bollard::errors::Error,
  },

  #[error("failed to build image {image}: {message}")]
  ImageBuild { image: String, message: String },
}

fn exit_code(code: &Option<i32>) -> String {
  code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl TargetError {
  /// Classify a spawn failure, reporting a missing executable as a missing tool.
  pub(crate) fn spawn(program: &str, command: String, source: std::io::Error) -> Self {
    if source.kind() == std::io::ErrorKind::NotFound {
      TargetError::MissingTool {
        tool: program.to_string(),
      }
    } else {
      TargetError::Spawn { command, source }
    }
  }

  pub(crate) fn docker(operation: &'static str, source: bollard::errors::Error) -> Self {
    TargetError::Docker { operation, source }
  }
}

/// The configured backend of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
  Local,
  Cross,
  Docker,
}

impl FromStr for TargetMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "local" => Ok(TargetMode::Local),
      "cross" => Ok(TargetMode::Cross),
      "docker" => Ok(TargetMode::Docker),
      other => Err(other.to_string()),
    }
  }
}

/// Attributes shared by every target variant.
#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
  pub name: String,
  /// `cpython`, `micropython` or `none`
  pub kind: String,
  pub precompile: bool,
  pub tags: TagRay,
}

/// One source queued for compilation.
///
/// `source` is relative to the kit; `from` and `to` are relative to the
/// build root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTriple {
  pub source: PathBuf,
  pub from: PathBuf,
  pub to: PathBuf,
}

#[derive(Debug, Clone)]
pub enum Target {
  Local(LocalTarget),
  Cross(CrossTarget),
  Docker(DockerTarget),
}

impl Target {
  /// Build a target from its configuration record.
  ///
  /// Missing fields default to mode `cross`, type `micropython`, precompiled,
  /// named `<type>Target`.
  pub fn from_config(config: &TargetConfig) -> Result<Self, TargetError> {
    let kind = config.kind.clone().unwrap_or_else(|| MICROPYTHON.to_string());
    let name = config.name.clone().unwrap_or_else(|| format!("{kind}Target"));
    let mode_name = config.mode.as_deref().unwrap_or("cross");
    let mode = mode_name.parse::<TargetMode>().map_err(|mode| TargetError::UnknownMode {
      target: name.clone(),
      mode,
    })?;
    let tags = config
      .tags
      .as_deref()
      .unwrap_or("")
      .parse()
      .map_err(|source| TargetError::Tags {
        target: name.clone(),
        source,
      })?;
    let info = TargetInfo {
      name,
      kind,
      precompile: config.precompile.unwrap_or(true),
      tags,
    };

    let target = match mode {
      TargetMode::Local => Target::Local(LocalTarget::new(info, config.meta_str("interpreter"))),
      TargetMode::Cross => Target::Cross(CrossTarget::new(info, config.meta_u64("baud"), config.meta_str("port"))),
      TargetMode::Docker => Target::Docker(DockerTarget::new(CrossTarget::new(
        info,
        config.meta_u64("baud"),
        config.meta_str("port"),
      ))),
    };
    info!(target = %target.name(), mode = ?target.mode(), "target selected");
    Ok(target)
  }

  pub fn info(&self) -> &TargetInfo {
    match self {
      Target::Local(t) => t.info(),
      Target::Cross(t) => t.info(),
      Target::Docker(t) => t.info(),
    }
  }

  pub fn mode(&self) -> TargetMode {
    match self {
      Target::Local(_) => TargetMode::Local,
      Target::Cross(_) => TargetMode::Cross,
      Target::Docker(_) => TargetMode::Docker,
    }
  }

  pub fn name(&self) -> &str {
    &self.info().name
  }

  pub fn kind(&self) -> &str {
    &self.info().kind
  }

  pub fn precompile(&self) -> bool {
    self.info().precompile
  }

  pub fn tags(&self) -> &TagRay {
    &self.info().tags
  }

  /// Suffix of compiled artifacts.
  pub fn suffix(&self) -> &'static str {
    let info = self.info();
    match self {
      Target::Local(_) if info.precompile => ".pyc",
      _ if !info.precompile => ".py",
      _ if info.kind == CPYTHON => ".pyc",
      _ => ".mpy",
    }
  }

  /// Compile a batch of sources under `build_root`. The returned stream must
  /// be drained for the compilation to complete.
  pub async fn build_container(&self, build_root: &Path, triples: &[SourceTriple]) -> Result<LogStream, TargetError> {
    match self {
      Target::Local(t) => t.build_container(build_root, triples).await,
      Target::Cross(t) => t.build_container(build_root, triples).await,
      Target::Docker(t) => t.build_container(build_root, triples).await,
    }
  }

  /// Deploy an install tree to the target's execution environment.
  pub async fn install(&self, path: &Path, quiet: bool) -> Result<(), TargetError> {
    match self {
      Target::Local(_) | Target::Docker(_) => Ok(()),
      Target::Cross(t) => t.install(path, quiet).await,
    }
  }

  /// Run an installed tree. Interrupting the run stops it and is not an error.
  pub async fn run<F>(&self, path: &Path, silent: bool, callback: F) -> Result<(), TargetError>
  where
    F: FnMut(&str),
  {
    match self {
      Target::Local(t) => t.run(path, self.suffix(), silent, callback).await,
      Target::Cross(t) => t.run(silent).await,
      Target::Docker(t) => t.run(path, silent, callback).await,
    }
  }
}

/// Relay `stream` through `callback` until it ends. When the user interrupts,
/// the backend is closed and the run counts as finished.
pub(crate) async fn stream_until_interrupt<F>(
  mut stream: LogStream,
  silent: bool,
  mut callback: F,
) -> Result<(), TargetError>
where
  F: FnMut(&str),
{
  loop {
    tokio::select! {
      line = stream.next_line() => match line? {
        Some(line) if !silent => callback(&line),
        Some(_) => {}
        None => return Ok(()),
      },
      _ = tokio::signal::ctrl_c() => {
        info!("interrupted");
        return stream.close().await;
      }
    }
  }
}
