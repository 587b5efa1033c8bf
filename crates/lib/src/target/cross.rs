use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use super::{ContainerSpec, LogStream, SourceTriple, TargetError, TargetInfo};
use crate::consts::FLASH_DIR;

pub const RSHELL: &str = "rshell";
pub const COMPILE_SCRIPT: &str = ".compile.sh";

const DEFAULT_BAUD: u64 = 115200;
const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Cross-compiles in a container and deploys to a device over a serial port.
#[derive(Debug, Clone)]
pub struct CrossTarget {
  info: TargetInfo,
  baud: u64,
  port: String,
}

impl CrossTarget {
  pub fn new(info: TargetInfo, baud: Option<u64>, port: Option<String>) -> Self {
    Self {
      info,
      baud: baud.unwrap_or(DEFAULT_BAUD),
      port: port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
    }
  }

  pub fn info(&self) -> &TargetInfo {
    &self.info
  }

  pub fn baud(&self) -> u64 {
    self.baud
  }

  pub fn port(&self) -> &str {
    &self.port
  }

  /// The shell script compiling `triples` inside a container where the build
  /// root is mounted at `root`.
  pub fn compile_script(&self, root: &Path, triples: &[SourceTriple]) -> String {
    let mut script = String::new();
    for triple in triples {
      let from = root.join(&triple.from);
      let to = root.join(&triple.to);
      if self.info.precompile {
        let _ = writeln!(
          script,
          "mpy-cross -s {} -o {} {}",
          triple.source.display(),
          to.display(),
          from.display()
        );
      } else {
        let _ = writeln!(script, "cp --preserve=all {} {}", from.display(), to.display());
      }
      let _ = writeln!(script, "echo {}", triple.to.display());
    }
    script
  }

  /// Write `.compile.sh` into `build_root` and run it in the type's image.
  pub async fn build_container(&self, build_root: &Path, triples: &[SourceTriple]) -> Result<LogStream, TargetError> {
    let root = container_root(build_root);
    let script_path = build_root.join(COMPILE_SCRIPT);
    std::fs::write(&script_path, self.compile_script(&root, triples)).map_err(|source| TargetError::Write {
      path: script_path.clone(),
      source,
    })?;
    debug!(script = ?script_path, count = triples.len(), "wrote compile script");

    ContainerSpec::new(
      &self.info.kind,
      &format!("{}-build", self.info.kind),
      vec!["bash".to_string(), COMPILE_SCRIPT.to_string()],
    )
    .volume(build_root, &root)
    .working_dir(&root)
    .spawn()
    .await
  }

  fn rshell(&self, command: &str) -> Command {
    let mut rshell = Command::new(RSHELL);
    rshell
      .arg("--baud")
      .arg(self.baud.to_string())
      .arg("--port")
      .arg(&self.port)
      .arg(command)
      .kill_on_drop(true);
    rshell
  }

  /// The rshell command line for `command`, for messages.
  pub fn rshell_line(&self, command: &str) -> String {
    format!("{RSHELL} --baud {} --port {} {command}", self.baud, self.port)
  }

  /// Sync the install tree onto the device's flash.
  pub async fn install(&self, path: &Path, quiet: bool) -> Result<(), TargetError> {
    let command = format!("rsync {} {FLASH_DIR}", path.display());
    info!(port = %self.port, path = ?path, "installing to device");
    let mut rshell = self.rshell(&command);
    if quiet {
      rshell.stdout(Stdio::null());
    }
    self.wait(rshell, &command).await
  }

  /// Open a REPL on the device and import the entry module.
  pub async fn run(&self, silent: bool) -> Result<(), TargetError> {
    let command = "repl ~ import main ~";
    let mut rshell = self.rshell(command);
    if silent {
      rshell.stdout(Stdio::null());
    }
    tokio::select! {
      result = self.wait(rshell, command) => result,
      _ = tokio::signal::ctrl_c() => {
        info!("interrupted");
        Ok(())
      }
    }
  }

  async fn wait(&self, mut rshell: Command, command: &str) -> Result<(), TargetError> {
    let line = self.rshell_line(command);
    let status = rshell
      .status()
      .await
      .map_err(|source| TargetError::spawn(RSHELL, line.clone(), source))?;
    if status.success() {
      Ok(())
    } else {
      Err(TargetError::BackendFailed {
        command: line,
        code: status.code(),
      })
    }
  }
}

/// `/<basename of build_root>`
pub(super) fn container_root(build_root: &Path) -> PathBuf {
  let name = build_root.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
  PathBuf::from(format!("/{name}"))
}
