//! Filesystem helpers shared by the kit and build stages.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Remove a directory tree, treating a missing tree as removed.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

/// Copy one file, creating parent directories and keeping its mtime.
pub fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(from, to)?;
  let modified = fs::metadata(from)?.modified()?;
  fs::File::open(to)?.set_modified(modified)?;
  Ok(())
}

/// Recursively copy a directory tree. Symlinks are recreated, not followed.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
  for entry in WalkDir::new(from).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(from).map_err(io::Error::other)?;
    let target = to.join(rel);
    let file_type = entry.file_type();
    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      copy_symlink(entry.path(), &target)?;
    } else {
      copy_file(entry.path(), &target)?;
    }
  }
  Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
  let link = fs::read_link(from)?;
  std::os::unix::fs::symlink(link, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
  copy_file(from, to)
}

/// `path` relative to `base`, computed lexically with `..` where needed.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
  let path: Vec<_> = path.components().filter(|c| *c != Component::CurDir).collect();
  let base: Vec<_> = base.components().filter(|c| *c != Component::CurDir).collect();
  let common = path.iter().zip(&base).take_while(|(a, b)| a == b).count();
  let mut out = PathBuf::new();
  for _ in common..base.len() {
    out.push("..");
  }
  for component in &path[common..] {
    out.push(component);
  }
  out
}

/// True if both paths name the same file. Paths that cannot be resolved are
/// compared as written.
pub fn same_file(a: &Path, b: &Path) -> bool {
  match (dunce::canonicalize(a), dunce::canonicalize(b)) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}
