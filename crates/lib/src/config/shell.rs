use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{ConfigError, ShellSection};

const DEFAULT_SHELL: &str = "/bin/sh";

/// The shell that runs kit hooks: binary, working directory and environment.
#[derive(Debug, Clone)]
pub struct ShellConfig {
  pub bin: PathBuf,
  pub cwd: PathBuf,
  pub env: BTreeMap<String, String>,
}

impl ShellConfig {
  /// Resolve the shell from `section`, falling back to `$SHELL` and then
  /// `/bin/sh`. The configured environment is merged over the process
  /// environment.
  pub fn from_section(section: Option<&ShellSection>, cwd: &Path) -> Result<Self, ConfigError> {
    let bin = section
      .and_then(|s| s.bin.clone())
      .or_else(|| std::env::var_os("SHELL").map(PathBuf::from))
      .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL));
    check_executable(&bin)?;
    if !cwd.is_dir() {
      return Err(ConfigError::MissingWorkingDirectory { path: cwd.to_path_buf() });
    }
    let mut env: BTreeMap<String, String> = std::env::vars_os()
      .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
      .collect();
    if let Some(section) = section {
      env.extend(section.env.clone());
    }
    Ok(Self {
      bin,
      cwd: cwd.to_path_buf(),
      env,
    })
  }
}

fn check_executable(bin: &Path) -> Result<(), ConfigError> {
  if !bin.is_file() {
    return Err(ConfigError::ShellNotFile { path: bin.to_path_buf() });
  }
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(bin)
      .map_err(|source| ConfigError::Read {
        path: bin.to_path_buf(),
        source,
      })?
      .permissions()
      .mode();
    if mode & 0o111 == 0 {
      return Err(ConfigError::ShellNotExecutable { path: bin.to_path_buf() });
    }
  }
  Ok(())
}
