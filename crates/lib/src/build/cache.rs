//! Compile tree layout and the rotated cache.

use std::path::{Path, PathBuf};

use crate::util::fs::remove_dir_all_if_exists;

pub const COMPILE: &str = ".compile";
pub const INSTALL: &str = "install";

/// Paths used by one (entry, target) build under a build root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
  /// `<build>/.compile/<entry>/<target>`
  pub compile: PathBuf,
  /// `<build>/.compile/<entry>/.<target>`
  pub cache: PathBuf,
  /// `<build>/install/<entry>/<target>`
  pub install: PathBuf,
}

impl BuildLayout {
  pub fn new(build_root: &Path, entry: &str, target: &str) -> Self {
    let compile_root = build_root.join(COMPILE).join(entry);
    Self {
      compile: compile_root.join(target),
      cache: compile_root.join(format!(".{target}")),
      install: build_root.join(INSTALL).join(entry).join(target),
    }
  }

  /// Turn the previous compile tree into the cache, leaving an empty compile
  /// tree. Without a previous tree the cache is left as it is.
  pub fn rotate(&self) -> std::io::Result<()> {
    if self.compile.is_dir() {
      remove_dir_all_if_exists(&self.cache)?;
      std::fs::rename(&self.compile, &self.cache)?;
    } else {
      remove_dir_all_if_exists(&self.compile)?;
    }
    std::fs::create_dir_all(&self.compile)
  }
}

/// `<stem><suffix>.<hash>`, the compile tree name of a source.
pub fn hashed_name(source: &Path, suffix: &str, hash: &str) -> PathBuf {
  let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
  source.with_file_name(format!("{stem}{suffix}.{hash}"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn layout_paths() {
    let layout = BuildLayout::new(Path::new("/b"), "app^main", "ghost");
    assert_eq!(layout.compile, PathBuf::from("/b/.compile/app^main/ghost"));
    assert_eq!(layout.cache, PathBuf::from("/b/.compile/app^main/.ghost"));
    assert_eq!(layout.install, PathBuf::from("/b/install/app^main/ghost"));
  }

  #[test]
  fn hashed_names_keep_directory() {
    assert_eq!(
      hashed_name(Path::new("lib/util.py"), ".mpy", "0A0B0C0D"),
      PathBuf::from("lib/util.mpy.0A0B0C0D")
    );
  }

  #[test]
  fn rotate_moves_previous_tree_to_cache() {
    let temp = TempDir::new().unwrap();
    let layout = BuildLayout::new(temp.path(), "e", "t");
    std::fs::create_dir_all(&layout.compile).unwrap();
    std::fs::write(layout.compile.join("main.pyc.00000001"), "old").unwrap();

    layout.rotate().unwrap();
    assert!(layout.cache.join("main.pyc.00000001").exists());
    assert!(layout.compile.is_dir());
    assert_eq!(std::fs::read_dir(&layout.compile).unwrap().count(), 0);

    // A second rotation drops the older cache.
    layout.rotate().unwrap();
    assert!(!layout.cache.join("main.pyc.00000001").exists());
  }
}
