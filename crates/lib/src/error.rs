//! Crate-level error wrapping every pipeline stage.
//!
//! Each module owns its own error enum. [`Error`] collects them so callers
//! can handle any stage uniformly and classify a failure with [`Error::kind`].

use std::fmt;

use thiserror::Error;

use crate::bom::BomError;
use crate::build::BuildError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::kit::{HookError, KitError};
use crate::setup::SetupError;
use crate::stock::StockError;
use crate::syntax::SyntaxError;
use crate::tag::TagError;
use crate::target::TargetError;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed YAML, reference or tag string.
  Syntax,
  /// Invalid catalog or configuration content.
  Semantic,
  /// More than one candidate where exactly one is required.
  Ambiguity,
  /// An external tool, container or device failed.
  Backend,
  /// Filesystem access failed.
  Io,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ErrorKind::Syntax => "syntax",
      ErrorKind::Semantic => "semantic",
      ErrorKind::Ambiguity => "ambiguity",
      ErrorKind::Backend => "backend",
      ErrorKind::Io => "io",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Syntax(#[from] SyntaxError),

  #[error(transparent)]
  Tag(#[from] TagError),

  #[error(transparent)]
  Catalog(#[from] CatalogError),

  #[error(transparent)]
  Stock(#[from] StockError),

  #[error(transparent)]
  Bom(#[from] BomError),

  #[error(transparent)]
  Kit(#[from] KitError),

  #[error(transparent)]
  Hook(#[from] HookError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Target(#[from] TargetError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Setup(#[from] SetupError),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Syntax(_) => ErrorKind::Syntax,
      Error::Tag(e) => tag_kind(e),
      Error::Catalog(e) => catalog_kind(e),
      Error::Stock(e) => stock_kind(e),
      Error::Bom(e) => bom_kind(e),
      Error::Kit(e) => kit_kind(e),
      Error::Hook(_) => ErrorKind::Backend,
      Error::Build(e) => build_kind(e),
      Error::Target(e) => target_kind(e),
      Error::Config(e) => config_kind(e),
      Error::Setup(e) => match e {
        SetupError::PathExists { .. } | SetupError::NotADirectory { .. } | SetupError::ReadOnly { .. } => {
          ErrorKind::Semantic
        }
        SetupError::CreateDir { .. } | SetupError::WriteFile { .. } | SetupError::Permissions { .. } => ErrorKind::Io,
      },
    }
  }
}

fn tag_kind(e: &TagError) -> ErrorKind {
  match e {
    TagError::Syntax(_) => ErrorKind::Syntax,
    TagError::Ambiguous { .. } => ErrorKind::Ambiguity,
    TagError::NotImplemented(_) | TagError::Duplicate(_) | TagError::NoMatch(_) => ErrorKind::Semantic,
  }
}

fn catalog_kind(e: &CatalogError) -> ErrorKind {
  match e {
    CatalogError::Read { .. } | CatalogError::IsDirectory { .. } => ErrorKind::Io,
    CatalogError::Syntax { .. } | CatalogError::Structure { .. } | CatalogError::Identifier(_) => ErrorKind::Syntax,
    CatalogError::Tags { source, .. } => tag_kind(source),
    _ => ErrorKind::Semantic,
  }
}

fn stock_kind(e: &StockError) -> ErrorKind {
  match e {
    StockError::Scan { .. } | StockError::ReadDir { .. } => ErrorKind::Io,
    StockError::Catalog(e) => catalog_kind(e),
    StockError::DuplicateEnsemble { .. }
    | StockError::MissingDirectory { .. }
    | StockError::NotExported { .. }
    | StockError::MissingPart { .. } => ErrorKind::Semantic,
  }
}

fn bom_kind(e: &BomError) -> ErrorKind {
  match e {
    BomError::Stock(e) => stock_kind(e),
    BomError::LocalAlsoImported { .. } | BomError::Circular { .. } | BomError::Undefined { .. } => {
      ErrorKind::Semantic
    }
  }
}

fn kit_kind(e: &KitError) -> ErrorKind {
  match e {
    KitError::Prepare { .. } | KitError::Copy { .. } => ErrorKind::Io,
    KitError::Tags { source, .. } => tag_kind(source),
    KitError::Template { .. } => ErrorKind::Syntax,
    KitError::Hook(_) => ErrorKind::Backend,
    KitError::DuplicateDestination { .. } => ErrorKind::Ambiguity,
    KitError::MissingSource { .. } | KitError::InvalidSource { .. } | KitError::EscapesKit { .. } => {
      ErrorKind::Semantic
    }
  }
}

fn build_kind(e: &BuildError) -> ErrorKind {
  match e {
    BuildError::Target(e) => target_kind(e),
    BuildError::MissingKit { .. } | BuildError::InvalidFile { .. } => ErrorKind::Semantic,
    BuildError::Prepare { .. } | BuildError::Walk { .. } | BuildError::Hash(_) | BuildError::Copy { .. } => {
      ErrorKind::Io
    }
  }
}

fn target_kind(e: &TargetError) -> ErrorKind {
  match e {
    TargetError::UnknownMode { .. } => ErrorKind::Semantic,
    TargetError::Tags { source, .. } => tag_kind(source),
    TargetError::Write { .. } => ErrorKind::Io,
    TargetError::MissingTool { .. }
    | TargetError::Spawn { .. }
    | TargetError::BackendFailed { .. }
    | TargetError::Docker { .. }
    | TargetError::ImageBuild { .. } => ErrorKind::Backend,
  }
}

fn config_kind(e: &ConfigError) -> ErrorKind {
  match e {
    ConfigError::Read { .. } => ErrorKind::Io,
    ConfigError::Syntax { .. } | ConfigError::Structure { .. } => ErrorKind::Syntax,
    _ => ErrorKind::Semantic,
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use super::*;
  use crate::tag::TagRay;

  #[test]
  fn malformed_reference_is_syntax() {
    let err: Error = SyntaxError::Reference { value: "a^^b".into() }.into();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().contains("a^^b"));
  }

  #[test]
  fn tag_tie_is_ambiguity() {
    let ray = |s: &str| s.parse::<TagRay>().unwrap();
    let err: Error = TagError::Ambiguous {
      first: ray("+a"),
      second: ray("+b"),
      query: ray("+a+b"),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::Ambiguity);
  }

  #[test]
  fn nested_kinds_are_unwrapped() {
    let err: Error = BomError::Stock(StockError::NotExported {
      entry: "pkg^hello".into(),
      grade: None,
    })
    .into();
    assert_eq!(err.kind(), ErrorKind::Semantic);

    let err: Error = BuildError::Target(TargetError::MissingTool { tool: "docker".into() }).into();
    assert_eq!(err.kind(), ErrorKind::Backend);

    let err: Error = StockError::DuplicateEnsemble {
      grade: "0".into(),
      name: "pkg".into(),
      first: PathBuf::from("a.mupy"),
      second: PathBuf::from("b.mupy"),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::Semantic);
  }

  #[test]
  fn duplicates_and_collisions_are_semantic() {
    let err: Error = BomError::LocalAlsoImported { entry: "util".into() }.into();
    assert_eq!(err.kind(), ErrorKind::Semantic);

    let err: Error = CatalogError::DuplicateExport {
      path: PathBuf::from("pkg.mupy"),
      name: "a".into(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::Semantic);
  }

  #[test]
  fn image_build_failure_is_backend() {
    let err: Error = TargetError::ImageBuild {
      image: "mupy:cpython".into(),
      message: "no space left".into(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::Backend);
  }

  #[test]
  fn missing_target_is_semantic() {
    let err: Error = ConfigError::MissingTarget { name: "esp".into() }.into();
    assert_eq!(err.kind(), ErrorKind::Semantic);
    assert_eq!(err.kind().to_string(), "semantic");
  }
}
