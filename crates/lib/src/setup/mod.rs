//! Scaffold a new host directory.
//!
//! `mupy setup` writes a default `mupy.yaml` and creates the stock, build and
//! kit directories beside it. Existing directories are reused when writable.

mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::host::{BUILD, KIT, STOCK};
use crate::consts::CONFIG_FILENAME;

pub use templates::CONFIG_TEMPLATE;

#[derive(Debug, Error)]
pub enum SetupError {
  #[error("file already exists: {} (use --force to overwrite)", path.display())]
  PathExists { path: PathBuf },

  #[error("'{}' exists as a file", path.display())]
  NotADirectory { path: PathBuf },

  #[error("'{}' exists but is not writeable (use --force)", path.display())]
  ReadOnly { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },

  #[error("failed to change permissions of {}: {source}", path.display())]
  Permissions { path: PathBuf, source: std::io::Error },
}

/// Result of a successful setup.
#[derive(Debug)]
pub struct SetupResult {
  /// The written configuration file
  pub config: PathBuf,
  /// Host directories in creation order
  pub directories: Vec<PathBuf>,
}

/// Set up a host directory at `directory`.
///
/// # Errors
///
/// Fails if `mupy.yaml` already exists and `force` is unset, if a host
/// directory exists as a file, or if an existing directory is read-only and
/// `force` is unset.
pub fn setup(directory: &Path, force: bool) -> Result<SetupResult, SetupError> {
  let build = directory.join(BUILD);
  let directories = vec![
    directory.to_path_buf(),
    directory.join(STOCK),
    build.clone(),
    build.join(KIT),
  ];

  let config = directory.join(CONFIG_FILENAME);
  if config.exists() && (!force || config.is_dir()) {
    return Err(SetupError::PathExists { path: config });
  }

  for path in &directories {
    make_writeable(path, force)?;
    debug!(path = %path.display(), "host directory ready");
  }

  fs::write(&config, CONFIG_TEMPLATE).map_err(|source| SetupError::WriteFile {
    path: config.clone(),
    source,
  })?;
  info!(path = %config.display(), "configuration written");

  Ok(SetupResult { config, directories })
}

fn make_writeable(path: &Path, force: bool) -> Result<(), SetupError> {
  if !path.exists() {
    return fs::create_dir_all(path).map_err(|source| SetupError::CreateDir {
      path: path.to_path_buf(),
      source,
    });
  }
  if !path.is_dir() {
    return Err(SetupError::NotADirectory {
      path: path.to_path_buf(),
    });
  }

  let permissions_error = |source| SetupError::Permissions {
    path: path.to_path_buf(),
    source,
  };
  let mut permissions = fs::metadata(path).map_err(permissions_error)?.permissions();
  if !permissions.readonly() {
    return Ok(());
  }
  if !force {
    return Err(SetupError::ReadOnly {
      path: path.to_path_buf(),
    });
  }

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o200);
  }
  #[cfg(not(unix))]
  permissions.set_readonly(false);

  fs::set_permissions(path, permissions).map_err(permissions_error)
}
