//! Catalog model: ensembles, their parts and imports.
//!
//! An ensemble is loaded from one descriptor file (`<name>.mupy`, YAML). Its
//! parts carry tag-selected paths, shell hooks and substitution variables,
//! and name their dependencies in `uses`.

mod load;
mod types;

use std::path::PathBuf;

use thiserror::Error;

use crate::syntax::SyntaxError;
use crate::tag::TagError;

pub use load::load_ensemble;
pub use types::{Ensemble, Import, Part, ShellSpec, Shlet};

/// Errors that can occur while loading an ensemble descriptor.
#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("cannot read ensemble file {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("ensemble path is a directory: {}", path.display())]
  IsDirectory { path: PathBuf },

  #[error("invalid YAML in {}: {source}", path.display())]
  Syntax { path: PathBuf, source: serde_yaml::Error },

  #[error("malformed ensemble {}: {source}", path.display())]
  Structure { path: PathBuf, source: serde_yaml::Error },

  #[error(transparent)]
  Identifier(#[from] SyntaxError),

  #[error("invalid tags in {location}: {source}")]
  Tags { location: String, source: TagError },

  #[error("missing part name in {location}")]
  MissingPartName { location: String },

  #[error("missing path or shell for '{part}' in {location}")]
  MissingPathOrShell { part: String, location: String },

  #[error("absolute path '{}' in {location}", path.display())]
  AbsolutePath { path: PathBuf, location: String },

  #[error("shell variables ('shlet') must be a mapping of names to scalars in {location}")]
  InvalidShlet { location: String },

  #[error("shell commands must be a string or a list of strings in {location}")]
  InvalidShell { location: String },

  #[error("invalid value for '{key}' in {location}")]
  InvalidValue { key: String, location: String },

  #[error("missing import ensemble name in {location}")]
  MissingImportName { location: String },

  #[error("duplicate import alias '{alias}' in {location}")]
  DuplicateAlias { alias: String, location: String },

  #[error("duplicate export '{name}' in {}", path.display())]
  DuplicateExport { name: String, path: PathBuf },

  #[error("duplicate part '{part}' in ensemble '{ensemble}'")]
  DuplicatePart { part: String, ensemble: String },
}
