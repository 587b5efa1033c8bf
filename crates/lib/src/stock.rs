//! The graded stock of ensembles.
//!
//! A stock root holds one directory per grade level. Every descriptor found
//! below a level belongs to that level's [`EnsembleSet`]. Higher grades (by
//! lexical order of the directory name) shadow lower ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

use crate::bom::Component;
use crate::catalog::{CatalogError, Ensemble, load_ensemble};
use crate::consts::DESCRIPTOR_EXTENSION;
use crate::syntax::entry_name;

#[derive(Debug, Error)]
pub enum StockError {
  #[error("stock directory does not exist: {}", path.display())]
  MissingDirectory { path: PathBuf },

  #[error("cannot scan {}: {source}", path.display())]
  Scan { path: PathBuf, source: walkdir::Error },

  #[error("cannot read {}: {source}", path.display())]
  ReadDir { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Catalog(#[from] CatalogError),

  #[error("grade level '{grade}' contains duplicate ensemble '{name}' ({} and {})", first.display(), second.display())]
  DuplicateEnsemble {
    grade: String,
    name: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("stock {}does not export '{entry}'", filter(.grade))]
  NotExported { entry: String, grade: Option<String> },

  #[error("ensemble '{ensemble}' at grade level '{level}' has no part '{part}'")]
  MissingPart {
    ensemble: String,
    part: String,
    level: String,
  },
}

fn filter(grade: &Option<String>) -> String {
  grade.as_ref().map(|g| format!("grade level {g} ")).unwrap_or_default()
}

/// The ensembles of one grade level, keyed by name.
#[derive(Debug)]
pub struct EnsembleSet {
  grade: String,
  path: PathBuf,
  ensembles: BTreeMap<String, Arc<Ensemble>>,
}

impl EnsembleSet {
  /// Recursively scan `path` for descriptor files, following symlinks.
  pub fn scan(grade: &str, path: &Path) -> Result<Self, StockError> {
    let mut ensembles: BTreeMap<String, Arc<Ensemble>> = BTreeMap::new();
    let mut descriptors: BTreeMap<String, PathBuf> = BTreeMap::new();
    let walker = WalkDir::new(path).follow_links(true).sort_by_file_name();
    for entry in walker {
      let entry = entry.map_err(|source| StockError::Scan {
        path: path.to_path_buf(),
        source,
      })?;
      let is_descriptor = entry.file_type().is_file()
        && entry.path().extension().is_some_and(|ext| ext == DESCRIPTOR_EXTENSION);
      if !is_descriptor {
        continue;
      }
      trace!(path = ?entry.path(), "loading descriptor");
      let ensemble = load_ensemble(grade, entry.path())?;
      let descriptor = entry.path().to_path_buf();
      if let Some(first) = descriptors.get(ensemble.name()) {
        return Err(StockError::DuplicateEnsemble {
          grade: grade.to_string(),
          name: ensemble.name().to_string(),
          first: first.clone(),
          second: descriptor,
        });
      }
      descriptors.insert(ensemble.name().to_string(), descriptor);
      ensembles.insert(ensemble.name().to_string(), Arc::new(ensemble));
    }
    debug!(grade, count = ensembles.len(), "scanned grade level");
    Ok(Self {
      grade: grade.to_string(),
      path: path.to_path_buf(),
      ensembles,
    })
  }

  pub fn grade(&self) -> &str {
    &self.grade
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn get(&self, name: &str) -> Option<&Arc<Ensemble>> {
    self.ensembles.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Arc<Ensemble>> {
    self.ensembles.values()
  }

  pub fn len(&self) -> usize {
    self.ensembles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ensembles.is_empty()
  }
}

/// Grade levels of a stock root, highest grade first.
#[derive(Debug)]
pub struct Stock {
  path: PathBuf,
  grade: Option<String>,
  levels: Vec<EnsembleSet>,
}

impl Stock {
  /// Scan every grade level under `path`.
  ///
  /// With `grade` set, only levels whose name sorts at or below it are kept,
  /// so a grade filter hides the levels above it.
  pub fn from_path(path: &Path, grade: Option<&str>) -> Result<Self, StockError> {
    if !path.is_dir() {
      return Err(StockError::MissingDirectory {
        path: path.to_path_buf(),
      });
    }
    let read_error = |source| StockError::ReadDir {
      path: path.to_path_buf(),
      source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(path).map_err(read_error)? {
      let entry = entry.map_err(read_error)?;
      if !entry.path().is_dir() {
        continue;
      }
      let name = entry.file_name().to_string_lossy().to_string();
      if grade.is_none_or(|g| name.as_str() <= g) {
        names.push(name);
      }
    }
    names.sort_by(|a, b| b.cmp(a));

    let levels = names
      .iter()
      .map(|name| EnsembleSet::scan(name, &path.join(name)))
      .collect::<Result<Vec<_>, _>>()?;

    info!(path = ?path, levels = levels.len(), "stock loaded");
    Ok(Self {
      path: path.to_path_buf(),
      grade: grade.map(str::to_string),
      levels,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn grade(&self) -> Option<&str> {
    self.grade.as_deref()
  }

  pub fn levels(&self) -> &[EnsembleSet] {
    &self.levels
  }

  /// The highest-graded ensemble named `name`.
  pub fn ensemble(&self, name: &str) -> Option<&Arc<Ensemble>> {
    self.levels.iter().find_map(|level| level.get(name))
  }

  /// Resolve `ensemble^part`, requested by `origin`.
  ///
  /// The highest grade level holding an ensemble with that name decides the
  /// lookup; lower levels are never consulted once one does. With `is_local`
  /// the part need not be exported.
  pub fn get_component(
    &self,
    origin: &str,
    ensemble: &str,
    part: &str,
    is_local: bool,
  ) -> Result<Component, StockError> {
    let entry = entry_name(ensemble, part);
    let not_exported = || StockError::NotExported {
      entry: entry.clone(),
      grade: self.grade.clone(),
    };

    let Some((level, found)) = self
      .levels
      .iter()
      .find_map(|level| level.get(ensemble).map(|e| (level, e)))
    else {
      return Err(not_exported());
    };

    if !is_local && !found.is_export(part) {
      return Err(not_exported());
    }
    let Some(resolved) = found.get_part(part)? else {
      return Err(StockError::MissingPart {
        ensemble: ensemble.to_string(),
        part: part.to_string(),
        level: level.grade().to_string(),
      });
    };

    trace!(origin, entry = %entry, grade = level.grade(), "resolved component");
    Ok(Component::new(origin, Arc::clone(found), Arc::clone(resolved)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn descriptor(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }

  const EXPORTS_P: &str = "exports: [ p ]\nparts:\n  - { name: p, path: p.py }\n  - { name: q, path: q.py }\n";

  #[test]
  fn missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();
    let err = Stock::from_path(&temp.path().join("nope"), None).unwrap_err();
    assert!(matches!(err, StockError::MissingDirectory { .. }));
  }

  #[test]
  fn levels_sorted_highest_first() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/x.mupy", "");
    descriptor(temp.path(), "C/y.mupy", "");
    descriptor(temp.path(), "B/nested/deeper/z.mupy", "");
    std::fs::write(temp.path().join("README"), "not a level").unwrap();

    let stock = Stock::from_path(temp.path(), None).unwrap();
    let grades: Vec<_> = stock.levels().iter().map(EnsembleSet::grade).collect();
    assert_eq!(grades, ["C", "B", "A"]);
    assert!(stock.levels()[1].get("z").is_some());
  }

  #[test]
  fn grade_filter_hides_higher_levels() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/x.mupy", "");
    descriptor(temp.path(), "B/x.mupy", "");
    descriptor(temp.path(), "C/x.mupy", "");

    let stock = Stock::from_path(temp.path(), Some("B")).unwrap();
    let grades: Vec<_> = stock.levels().iter().map(EnsembleSet::grade).collect();
    assert_eq!(grades, ["B", "A"]);
    assert_eq!(stock.ensemble("x").unwrap().grade(), "B");
  }

  #[test]
  fn duplicate_ensemble_within_level_fails() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/one/x.mupy", "");
    descriptor(temp.path(), "A/two/x.mupy", "");
    let err = Stock::from_path(temp.path(), None).unwrap_err();
    assert!(matches!(err, StockError::DuplicateEnsemble { ref name, .. } if name == "x"));
  }

  #[test]
  fn higher_grade_shadows_lower() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/X.mupy", EXPORTS_P);
    descriptor(temp.path(), "B/X.mupy", EXPORTS_P);

    let stock = Stock::from_path(temp.path(), None).unwrap();
    let component = stock.get_component("p", "X", "p", false).unwrap();
    assert_eq!(component.ensemble().grade(), "B");
    assert_eq!(component.name(), "X^p");
  }

  #[test]
  fn shadowing_applies_even_without_export() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/X.mupy", EXPORTS_P);
    descriptor(temp.path(), "B/X.mupy", "parts:\n  - { name: p, path: p.py }\n");

    let stock = Stock::from_path(temp.path(), None).unwrap();
    let err = stock.get_component("p", "X", "p", false).unwrap_err();
    assert!(matches!(err, StockError::NotExported { .. }));
  }

  #[test]
  fn unexported_part_needs_local_lookup() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/X.mupy", EXPORTS_P);

    let stock = Stock::from_path(temp.path(), Some("A")).unwrap();
    let err = stock.get_component("q", "X", "q", false).unwrap_err();
    assert_eq!(err.to_string(), "stock grade level A does not export 'X^q'");
    assert!(stock.get_component("q", "X", "q", true).is_ok());
  }

  #[test]
  fn local_lookup_of_absent_part_fails() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/X.mupy", EXPORTS_P);

    let stock = Stock::from_path(temp.path(), None).unwrap();
    let err = stock.get_component("r", "X", "r", true).unwrap_err();
    assert!(matches!(err, StockError::MissingPart { .. }));
  }

  #[test]
  fn unknown_ensemble_is_not_exported() {
    let temp = TempDir::new().unwrap();
    descriptor(temp.path(), "A/X.mupy", EXPORTS_P);

    let stock = Stock::from_path(temp.path(), None).unwrap();
    let err = stock.get_component("p", "Y", "p", false).unwrap_err();
    assert_eq!(err.to_string(), "stock does not export 'Y^p'");
  }
}
