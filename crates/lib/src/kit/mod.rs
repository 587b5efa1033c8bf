//! Kit materialization: a flat source tree for one BOM.
//!
//! Materialization runs in two passes. The plan pass resolves every node's
//! tagged path, hooks and destination without touching the filesystem, so
//! conflicting destinations are found before anything is written. The apply
//! pass clears the kit, runs hooks and copies sources.

mod hook;

use std::collections::BTreeMap;
use std::path::{Component as PathComponent, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::bom::{Bom, Component};
use crate::catalog::{ShellSpec, Shlet};
use crate::config::ShellConfig;
use crate::consts::MAIN_NAME;
use crate::placeholder::{PlaceholderError, substitute};
use crate::tag::{TagError, TagRay};
use crate::util::fs::{copy_file, copy_tree, remove_dir_all_if_exists, same_file};

pub use hook::{HookError, run_hook};

#[derive(Debug, Error)]
pub enum KitError {
  #[error("cannot prepare kit directory {}: {source}", path.display())]
  Prepare { path: PathBuf, source: std::io::Error },

  #[error("cannot copy {} to {}: {source}", from.display(), to.display())]
  Copy {
    from: PathBuf,
    to: PathBuf,
    source: std::io::Error,
  },

  #[error("{entry}: {source}")]
  Tags { entry: String, source: TagError },

  #[error("{entry}: invalid hook '{command}': {source}")]
  Template {
    entry: String,
    command: String,
    source: PlaceholderError,
  },

  #[error(transparent)]
  Hook(#[from] HookError),

  #[error("invalid duplicates '{}' and '{}' both map to {}", first.display(), second.display(), to.display())]
  DuplicateDestination {
    to: PathBuf,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("{entry}: destination '{}' leaves the kit", path.display())]
  EscapesKit { entry: String, path: PathBuf },

  #[error("kit part does not exist '{}'", path.display())]
  MissingSource { path: PathBuf },

  #[error("kit part is not a file or directory '{}'", path.display())]
  InvalidSource { path: PathBuf },
}

/// Progress reported while materializing a kit.
#[derive(Debug, Clone, Copy)]
pub enum KitEvent<'a> {
  /// A non-quiet hook ran.
  Hook { command: &'a str, output: &'a str },
  /// A part's source was copied into the kit.
  Copy { from: &'a Path, to: &'a Path },
}

/// One BOM node, resolved against the active tags.
struct KitNode {
  entry: String,
  vars: Shlet,
  shell: Option<ShellSpec>,
  /// (source, absolute destination)
  copy: Option<(PathBuf, PathBuf)>,
}

/// A materialized kit directory.
#[derive(Debug, Clone)]
pub struct Kit {
  path: PathBuf,
}

impl Kit {
  /// Refer to an already materialized kit.
  pub fn at(path: &Path) -> Self {
    Self { path: path.to_path_buf() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Materialize `bom` into `path`, replacing anything already there.
  ///
  /// The root part is renamed `main`; every other part takes the name it was
  /// requested by, keeping its extension.
  pub async fn from_bom<F>(
    bom: &Bom,
    path: &Path,
    tags: &TagRay,
    shell: &ShellConfig,
    mut callback: F,
  ) -> Result<Self, KitError>
  where
    F: FnMut(KitEvent<'_>),
  {
    let nodes = plan(bom, path, tags)?;

    remove_dir_all_if_exists(path)
      .and_then(|()| std::fs::create_dir_all(path))
      .map_err(|source| KitError::Prepare {
        path: path.to_path_buf(),
        source,
      })?;

    for node in &nodes {
      apply(node, shell, &mut callback).await?;
    }

    info!(path = ?path, nodes = nodes.len(), "kit materialized");
    Ok(Self { path: path.to_path_buf() })
  }
}

fn plan(bom: &Bom, root: &Path, tags: &TagRay) -> Result<Vec<KitNode>, KitError> {
  let mut nodes = Vec::new();
  let mut destinations: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

  bom.try_walk(
    |component, is_main| {
      if let Some(node) = plan_node(component, *is_main, root, tags, &mut destinations)? {
        nodes.push(node);
      }
      Ok::<(), KitError>(())
    },
    |_| false,
    true,
  )?;

  Ok(nodes)
}

fn plan_node(
  component: &Component,
  is_main: bool,
  root: &Path,
  tags: &TagRay,
  destinations: &mut BTreeMap<PathBuf, PathBuf>,
) -> Result<Option<KitNode>, KitError> {
  let entry = component.name();
  let part = component.part();
  let ensemble = component.ensemble();
  let tag_error = |source| KitError::Tags {
    entry: entry.clone(),
    source,
  };
  let name = if is_main { MAIN_NAME } else { component.origin() };

  let mut vars = Shlet::from([
    ("origin".to_string(), component.origin().to_string()),
    ("name".to_string(), name.to_string()),
    ("here".to_string(), ensemble.path().display().to_string()),
    ("there".to_string(), root.display().to_string()),
  ]);

  let mut copy = None;
  if part.has_path() {
    let resolved = part.tagged_path(tags).map_err(tag_error)?;
    let source = ensemble.path().join(resolved);
    let rebased = rebase(part.path().unwrap_or(resolved), name);
    let Some(relative) = normalize(&rebased) else {
      return Err(KitError::EscapesKit { entry, path: rebased });
    };

    if let Some(first) = destinations.get(&relative) {
      if same_file(first, &source) {
        debug!(entry = %entry, to = ?relative, "destination already provided");
        return Ok(None);
      }
      return Err(KitError::DuplicateDestination {
        to: root.join(&relative),
        first: first.clone(),
        second: source,
      });
    }
    destinations.insert(relative.clone(), source.clone());

    let dest = root.join(relative);
    vars.insert("this".to_string(), source.display().to_string());
    vars.insert("that".to_string(), dest.display().to_string());
    copy = Some((source, dest));
  }

  if let Some(shlet) = part.tagged_shlet(tags).map_err(tag_error)? {
    vars.extend(shlet.clone());
  }
  let shell = part.tagged_shell(tags).map_err(tag_error)?.cloned();

  Ok(Some(KitNode {
    entry,
    vars,
    shell,
    copy,
  }))
}

/// `dir/file.ext` renamed to `dir/<name>.ext`.
fn rebase(path: &Path, name: &str) -> PathBuf {
  let file = match path.extension() {
    Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
    None => name.to_string(),
  };
  path.parent().unwrap_or(Path::new("")).join(file)
}

/// Resolve `.` and `..` in a relative path. `None` if the path climbs above
/// its start or is absolute.
fn normalize(path: &Path) -> Option<PathBuf> {
  let mut normal = PathBuf::new();
  for component in path.components() {
    match component {
      PathComponent::Normal(part) => normal.push(part),
      PathComponent::CurDir => {}
      PathComponent::ParentDir => {
        if !normal.pop() {
          return None;
        }
      }
      PathComponent::RootDir | PathComponent::Prefix(_) => return None,
    }
  }
  Some(normal)
}

async fn apply<F>(node: &KitNode, shell: &ShellConfig, callback: &mut F) -> Result<(), KitError>
where
  F: FnMut(KitEvent<'_>),
{
  if let Some(spec) = &node.shell {
    let commands = spec
      .commands
      .iter()
      .map(|command| {
        substitute(command, &node.vars).map_err(|source| KitError::Template {
          entry: node.entry.clone(),
          command: command.clone(),
          source,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let mut input = String::new();
    for command in &commands {
      let output = run_hook(command, &input, shell).await?;
      if !spec.quiet {
        callback(KitEvent::Hook {
          command,
          output: &output,
        });
      }
      input = output;
    }
  }

  let Some((from, to)) = &node.copy else {
    return Ok(());
  };
  if to.exists() {
    return Ok(());
  }
  let copy_error = |source| KitError::Copy {
    from: from.clone(),
    to: to.clone(),
    source,
  };
  if from.is_file() {
    copy_file(from, to).map_err(copy_error)?;
  } else if from.is_dir() {
    copy_tree(from, to).map_err(copy_error)?;
  } else if from.exists() {
    return Err(KitError::InvalidSource { path: from.clone() });
  } else {
    return Err(KitError::MissingSource { path: from.clone() });
  }
  debug!(entry = %node.entry, from = ?from, to = ?to, "copied");
  callback(KitEvent::Copy { from, to });
  Ok(())
}
