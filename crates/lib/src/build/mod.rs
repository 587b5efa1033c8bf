//! Per-target compilation of a kit into an install tree.
//!
//! Sources are compiled into a hashed compile tree
//! (`<stem><suffix>.<ADLER32>`). The previous compile tree is kept as a
//! cache; a source whose hashed name is already there is copied forward
//! instead of recompiled. The install tree is rebuilt from the compile tree
//! with hashes stripped, plus every non-source file of the kit.

mod cache;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::consts::SOURCE_EXTENSION;
use crate::kit::Kit;
use crate::target::{SourceTriple, Target, TargetError};
use crate::util::fs::{copy_file, relative_path, remove_dir_all_if_exists};
use crate::util::hash::{HashError, hash_file};

pub use cache::{BuildLayout, COMPILE, INSTALL, hashed_name};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("kit does not exist: {}", path.display())]
  MissingKit { path: PathBuf },

  #[error("cannot prepare {}: {source}", path.display())]
  Prepare { path: PathBuf, source: std::io::Error },

  #[error("cannot scan {}: {source}", path.display())]
  Walk { path: PathBuf, source: walkdir::Error },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("cannot copy {} to {}: {source}", from.display(), to.display())]
  Copy {
    from: PathBuf,
    to: PathBuf,
    source: std::io::Error,
  },

  #[error("file is not valid '{}'", path.display())]
  InvalidFile { path: PathBuf },

  #[error(transparent)]
  Target(#[from] TargetError),
}

/// A compiled install tree for one kit and target.
#[derive(Debug, Clone)]
pub struct Build {
  path: PathBuf,
  target: Target,
  compiled: Vec<SourceTriple>,
}

impl Build {
  /// Compile `kit` for `target` under `build_root`.
  ///
  /// `callback` receives the backend's output followed by every installed
  /// path, relative to `build_root`.
  pub async fn from_kit<F>(
    kit: &Kit,
    build_root: &Path,
    entry: &str,
    target: &Target,
    mut callback: F,
  ) -> Result<Self, BuildError>
  where
    F: FnMut(&str),
  {
    let kit_path = kit.path();
    if !kit_path.is_dir() {
      return Err(BuildError::MissingKit {
        path: kit_path.to_path_buf(),
      });
    }
    let layout = BuildLayout::new(build_root, entry, target.name());
    layout.rotate().map_err(|source| BuildError::Prepare {
      path: layout.compile.clone(),
      source,
    })?;

    let mut triples = Vec::new();
    let mut verbatim = Vec::new();
    let mut cached = 0usize;
    for item in WalkDir::new(kit_path).min_depth(1).sort_by_file_name() {
      let item = item.map_err(|source| BuildError::Walk {
        path: kit_path.to_path_buf(),
        source,
      })?;
      let rel = relative_path(item.path(), kit_path);
      let is_source = item.file_type().is_file() && item.path().extension().is_some_and(|e| e == SOURCE_EXTENSION);
      if !is_source {
        verbatim.push(rel);
        continue;
      }

      let hash = hash_file(item.path())?;
      let hashed = hashed_name(&rel, target.suffix(), &hash.0);
      let hit = layout.cache.join(&hashed);
      let compiled = layout.compile.join(&hashed);
      if hit.is_file() {
        copy(&hit, &compiled)?;
        cached += 1;
      } else {
        triples.push(SourceTriple {
          source: rel,
          from: relative_path(item.path(), build_root),
          to: relative_path(&compiled, build_root),
        });
      }
    }

    info!(entry, target = %target.name(), compile = triples.len(), cached, "building");
    if !triples.is_empty() {
      target
        .build_container(build_root, &triples)
        .await?
        .drain(&mut callback)
        .await?;
    }

    remove_dir_all_if_exists(&layout.install).map_err(|source| BuildError::Prepare {
      path: layout.install.clone(),
      source,
    })?;
    install_compiled(&layout, build_root, &mut callback)?;
    install_verbatim(kit_path, &layout.install, &verbatim, build_root, &mut callback)?;

    Ok(Self {
      path: layout.install,
      target: target.clone(),
      compiled: triples,
    })
  }

  /// The install tree.
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn target(&self) -> &Target {
    &self.target
  }

  /// Sources handed to the backend by this build; cache hits are absent.
  pub fn compiled_sources(&self) -> &[SourceTriple] {
    &self.compiled
  }
}

/// Copy compiled artifacts to the install tree without their hash extension.
fn install_compiled<F>(layout: &BuildLayout, build_root: &Path, callback: &mut F) -> Result<(), BuildError>
where
  F: FnMut(&str),
{
  for item in WalkDir::new(&layout.compile).min_depth(1).sort_by_file_name() {
    let item = item.map_err(|source| BuildError::Walk {
      path: layout.compile.clone(),
      source,
    })?;
    let rel = relative_path(item.path(), &layout.compile);
    if item.file_type().is_dir() {
      let dir = layout.install.join(&rel);
      std::fs::create_dir_all(&dir).map_err(|source| BuildError::Prepare { path: dir, source })?;
      continue;
    }
    let Some(stem) = rel.file_stem() else {
      continue;
    };
    let to = layout.install.join(rel.with_file_name(stem));
    copy(item.path(), &to)?;
    callback(&relative_path(&to, build_root).display().to_string());
  }
  Ok(())
}

fn install_verbatim<F>(
  kit: &Path,
  install: &Path,
  items: &[PathBuf],
  build_root: &Path,
  callback: &mut F,
) -> Result<(), BuildError>
where
  F: FnMut(&str),
{
  for rel in items {
    let from = kit.join(rel);
    let to = install.join(rel);
    if from.is_file() {
      copy(&from, &to)?;
    } else if from.is_dir() {
      std::fs::create_dir_all(&to).map_err(|source| BuildError::Prepare {
        path: to.clone(),
        source,
      })?;
    } else if from.exists() {
      return Err(BuildError::InvalidFile { path: from });
    }
    debug!(from = ?from, to = ?to, "copied verbatim");
    callback(&relative_path(&to, build_root).display().to_string());
  }
  Ok(())
}

fn copy(from: &Path, to: &Path) -> Result<(), BuildError> {
  copy_file(from, to).map_err(|source| BuildError::Copy {
    from: from.to_path_buf(),
    to: to.to_path_buf(),
    source,
  })
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use crate::config::TargetConfig;
  use serde_yaml::Value;
  use std::collections::BTreeMap;
  use tempfile::TempDir;

  /// A local target copying sources, so no interpreter is needed.
  fn target() -> Target {
    Target::from_config(&TargetConfig {
      name: Some("ghost".to_string()),
      mode: Some("local".to_string()),
      kind: Some("cpython".to_string()),
      precompile: Some(false),
      tags: None,
      meta: BTreeMap::from([("interpreter".to_string(), Value::from("/bin/sh"))]),
    })
    .unwrap()
  }

  struct Fixture {
    temp: TempDir,
  }

  impl Fixture {
    fn new() -> Self {
      let fx = Self {
        temp: TempDir::new().unwrap(),
      };
      fx.write("main.py", "import util");
      fx.write("lib/util.py", "x = 1");
      fx.write("lib/other.py", "y = 2");
      fx.write("data/config.json", "{}");
      fx
    }

    fn build_root(&self) -> PathBuf {
      self.temp.path().join("build")
    }

    fn kit(&self) -> Kit {
      Kit::at(&self.build_root().join("kit"))
    }

    fn write(&self, rel: &str, content: &str) {
      let path = self.build_root().join("kit").join(rel);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(path, content).unwrap();
    }

    async fn build(&self) -> (Build, Vec<String>) {
      let mut lines = Vec::new();
      let build = Build::from_kit(&self.kit(), &self.build_root(), "app^main", &target(), |l| {
        lines.push(l.to_string())
      })
      .await
      .unwrap();
      (build, lines)
    }
  }

  fn sources(build: &Build) -> Vec<String> {
    build
      .compiled_sources()
      .iter()
      .map(|t| t.source.display().to_string())
      .collect()
  }

  #[tokio::test]
  async fn first_build_compiles_everything() {
    let fx = Fixture::new();
    let (build, lines) = fx.build().await;

    assert_eq!(sources(&build), ["lib/other.py", "lib/util.py", "main.py"]);
    assert_eq!(build.path(), fx.build_root().join("install/app^main/ghost"));
    assert_eq!(std::fs::read_to_string(build.path().join("main.py")).unwrap(), "import util");
    assert_eq!(std::fs::read_to_string(build.path().join("lib/util.py")).unwrap(), "x = 1");
    assert_eq!(std::fs::read_to_string(build.path().join("data/config.json")).unwrap(), "{}");
    assert!(lines.iter().any(|l| l == "install/app^main/ghost/main.py"));
  }

  #[tokio::test]
  async fn triples_are_relative_to_build_root() {
    let fx = Fixture::new();
    let (build, _) = fx.build().await;
    let main = &build.compiled_sources()[2];
    assert_eq!(main.from, PathBuf::from("kit/main.py"));
    let to = main.to.display().to_string();
    assert!(to.starts_with(".compile/app^main/ghost/main.py."), "{to}");
    assert_eq!(to.rsplit('.').next().unwrap().len(), 8);
  }

  #[tokio::test]
  async fn unchanged_rebuild_hits_the_cache() {
    let fx = Fixture::new();
    fx.build().await;
    let (build, lines) = fx.build().await;

    assert!(build.compiled_sources().is_empty());
    // Only installed paths are reported; the backend produced no output.
    assert!(lines.iter().all(|l| l.starts_with("install/")), "{lines:?}");
    assert_eq!(std::fs::read_to_string(build.path().join("lib/other.py")).unwrap(), "y = 2");
  }

  #[tokio::test]
  async fn changed_source_is_the_only_one_recompiled() {
    let fx = Fixture::new();
    fx.build().await;
    fx.write("lib/util.py", "x = 2");
    let (build, _) = fx.build().await;

    assert_eq!(sources(&build), ["lib/util.py"]);
    assert_eq!(std::fs::read_to_string(build.path().join("lib/util.py")).unwrap(), "x = 2");
  }

  #[tokio::test]
  async fn removed_source_leaves_the_install_tree() {
    let fx = Fixture::new();
    fx.build().await;
    std::fs::remove_file(fx.build_root().join("kit/lib/other.py")).unwrap();
    let (build, _) = fx.build().await;

    assert!(!build.path().join("lib/other.py").exists());
    assert!(build.path().join("lib/util.py").exists());
  }

  #[tokio::test]
  async fn missing_kit_fails() {
    let temp = TempDir::new().unwrap();
    let err = Build::from_kit(&Kit::at(&temp.path().join("kit")), temp.path(), "e", &target(), |_| {})
      .await
      .unwrap_err();
    assert!(matches!(err, BuildError::MissingKit { .. }));
  }
}
