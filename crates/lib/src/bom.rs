//! Bill of materials: the dependency tree of one entry part.
//!
//! Nodes live in an arena indexed from the root (index 0). Cycles are
//! detected against the set of part identities on the current resolution
//! path.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Ensemble, Part};
use crate::stock::{Stock, StockError};
use crate::syntax::entry_name;

#[derive(Debug, Error)]
pub enum BomError {
  #[error("circular reference {chain}")]
  Circular { chain: String },

  #[error("local {entry} is also imported")]
  LocalAlsoImported { entry: String },

  #[error("undefined {entry}")]
  Undefined { entry: String },

  #[error(transparent)]
  Stock(#[from] StockError),
}

/// A resolved reference: the part, its ensemble and the name it was requested by.
#[derive(Debug, Clone)]
pub struct Component {
  origin: String,
  ensemble: Arc<Ensemble>,
  part: Arc<Part>,
}

impl Component {
  pub(crate) fn new(origin: &str, ensemble: Arc<Ensemble>, part: Arc<Part>) -> Self {
    Self {
      origin: origin.to_string(),
      ensemble,
      part,
    }
  }

  /// The `uses` name (or entry name) that requested this component.
  pub fn origin(&self) -> &str {
    &self.origin
  }

  pub fn ensemble(&self) -> &Arc<Ensemble> {
    &self.ensemble
  }

  pub fn part(&self) -> &Arc<Part> {
    &self.part
  }

  /// `ensemble^part`
  pub fn name(&self) -> String {
    entry_name(self.ensemble.name(), self.part.name())
  }

  fn part_id(&self) -> PartId {
    PartId(Arc::as_ptr(&self.part))
  }
}

impl Serialize for Component {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    let mut s = serializer.serialize_struct("Component", 4)?;
    s.serialize_field("name", &self.name())?;
    s.serialize_field("origin", &self.origin)?;
    s.serialize_field("grade", self.ensemble.grade())?;
    s.serialize_field("path", self.ensemble.path())?;
    s.end()
  }
}

/// Identity of a loaded part. Parts are shared through `Arc`, so the pointer
/// is stable for the lifetime of the stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PartId(*const Part);

#[derive(Debug, Serialize)]
pub struct BomNode {
  pub component: Component,
  pub children: Vec<usize>,
  pub depth: usize,
}

#[derive(Debug, Serialize)]
pub struct Bom {
  nodes: Vec<BomNode>,
}

impl Bom {
  /// Resolve the tree rooted at `root` by following `uses` through `stock`.
  pub fn from_stock(stock: &Stock, root: Component) -> Result<Self, BomError> {
    let mut bom = Self { nodes: Vec::new() };
    let mut path = Vec::new();
    let mut visiting = HashSet::new();
    bom.resolve(stock, root, 0, &mut path, &mut visiting)?;
    debug!(root = %bom.root().name(), nodes = bom.nodes.len(), "resolved bom");
    Ok(bom)
  }

  fn resolve(
    &mut self,
    stock: &Stock,
    component: Component,
    depth: usize,
    path: &mut Vec<String>,
    visiting: &mut HashSet<PartId>,
  ) -> Result<usize, BomError> {
    let id = component.part_id();
    if visiting.contains(&id) {
      let start = path.iter().position(|n| *n == component.name()).unwrap_or(0);
      let mut chain: Vec<_> = path[start..].to_vec();
      chain.push(component.name());
      return Err(BomError::Circular {
        chain: chain.join(" > "),
      });
    }

    let index = self.nodes.len();
    let uses = component.part().uses().to_vec();
    let ensemble = Arc::clone(component.ensemble());
    path.push(component.name());
    visiting.insert(id);
    self.nodes.push(BomNode {
      component,
      children: Vec::new(),
      depth,
    });

    for name in &uses {
      let (ensemble_name, part_name, is_local) = lookup_args(&ensemble, name)?;
      let child = stock.get_component(name, &ensemble_name, &part_name, is_local)?;
      let child_index = self.resolve(stock, child, depth + 1, path, visiting)?;
      self.nodes[index].children.push(child_index);
    }

    visiting.remove(&id);
    path.pop();
    Ok(index)
  }

  pub fn root(&self) -> &Component {
    &self.nodes[0].component
  }

  pub fn nodes(&self) -> &[BomNode] {
    &self.nodes
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Visit every component pre-order. `next` derives a child's argument from
  /// its parent's.
  pub fn walk<A, F, N>(&self, mut callback: F, next: N, arg: A)
  where
    F: FnMut(&Component, &A),
    N: Fn(&A) -> A,
  {
    self.walk_from(0, &mut callback, &next, &arg);
  }

  fn walk_from<A, F, N>(&self, index: usize, callback: &mut F, next: &N, arg: &A)
  where
    F: FnMut(&Component, &A),
    N: Fn(&A) -> A,
  {
    let node = &self.nodes[index];
    callback(&node.component, arg);
    let child_arg = next(arg);
    for &child in &node.children {
      self.walk_from(child, callback, next, &child_arg);
    }
  }

  /// Fallible pre-order visit, stopping at the first error.
  pub fn try_walk<A, E, F, N>(&self, mut callback: F, next: N, arg: A) -> Result<(), E>
  where
    F: FnMut(&Component, &A) -> Result<(), E>,
    N: Fn(&A) -> A,
  {
    self.try_walk_from(0, &mut callback, &next, &arg)
  }

  fn try_walk_from<A, E, F, N>(&self, index: usize, callback: &mut F, next: &N, arg: &A) -> Result<(), E>
  where
    F: FnMut(&Component, &A) -> Result<(), E>,
    N: Fn(&A) -> A,
  {
    let node = &self.nodes[index];
    callback(&node.component, arg)?;
    let child_arg = next(arg);
    for &child in &node.children {
      self.try_walk_from(child, callback, next, &child_arg)?;
    }
    Ok(())
  }
}

/// Decide where a `uses` name lives: a local part or an import alias.
fn lookup_args(ensemble: &Ensemble, name: &str) -> Result<(String, String, bool), BomError> {
  let is_local = ensemble.has_part(name);
  let import = ensemble.import_for(name);
  match (is_local, import) {
    (true, Some(_)) => Err(BomError::LocalAlsoImported {
      entry: entry_name(ensemble.name(), name),
    }),
    (true, None) => Ok((ensemble.name().to_string(), name.to_string(), true)),
    (false, Some(import)) => {
      let exported = import.resolve(name).unwrap_or(name);
      Ok((import.name().to_string(), exported.to_string(), false))
    }
    (false, None) => Err(BomError::Undefined {
      entry: entry_name(ensemble.name(), name),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use tempfile::TempDir;

  fn stock_with(files: &[(&str, &str)]) -> (TempDir, Stock) {
    let temp = TempDir::new().unwrap();
    for (rel, content) in files {
      let path = temp.path().join(rel);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(path, content).unwrap();
    }
    let stock = Stock::from_path(temp.path(), None).unwrap();
    (temp, stock)
  }

  fn resolve(stock: &Stock, ensemble: &str, part: &str) -> Result<Bom, BomError> {
    let root = stock.get_component(part, ensemble, part, false)?;
    Bom::from_stock(stock, root)
  }

  fn names(bom: &Bom) -> Vec<String> {
    let mut out = Vec::new();
    bom.walk(|c, depth| out.push(format!("{}{}", "  ".repeat(*depth), c.name())), |d| d + 1, 0);
    out
  }

  #[test]
  fn resolves_local_and_imported_uses() {
    let (_temp, stock) = stock_with(&[
      (
        "A/app.mupy",
        "exports: [ main ]\nparts:\n  - { name: main, path: main.py, uses: [ helper, log ] }\n  - { name: helper, path: helper.py }\nimports:\n  - { name: lib, parts: [ { name: logging, as: log } ] }\n",
      ),
      ("A/lib.mupy", "exports: [ logging ]\nparts:\n  - { name: logging, path: logging.py }\n"),
    ]);
    let bom = resolve(&stock, "app", "main").unwrap();
    assert_eq!(names(&bom), ["app^main", "  app^helper", "  lib^logging"]);
    assert_eq!(bom.nodes()[2].component.origin(), "log");
    assert_eq!(bom.nodes()[2].depth, 1);
  }

  #[test]
  fn detects_cycles() {
    let (_temp, stock) = stock_with(&[(
      "A/E.mupy",
      "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ b ] }\n  - { name: b, path: b.py, uses: [ a ] }\n",
    )]);
    let err = resolve(&stock, "E", "a").unwrap_err();
    assert!(matches!(err, BomError::Circular { .. }));
    let message = err.to_string();
    assert!(message.contains("E^a > E^b > E^a"), "{message}");
  }

  #[test]
  fn shared_dependency_is_not_a_cycle() {
    let (_temp, stock) = stock_with(&[(
      "A/E.mupy",
      "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ b, c ] }\n  - { name: b, path: b.py, uses: [ c ] }\n  - { name: c, path: c.py }\n",
    )]);
    let bom = resolve(&stock, "E", "a").unwrap();
    assert_eq!(names(&bom), ["E^a", "  E^b", "    E^c", "  E^c"]);
  }

  #[test]
  fn local_and_import_collision_fails() {
    let (_temp, stock) = stock_with(&[
      (
        "A/E.mupy",
        "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ x ] }\n  - { name: x, path: x.py }\nimports:\n  - { name: F, parts: [ { name: y, as: x } ] }\n",
      ),
      ("A/F.mupy", "exports: [ y ]\nparts:\n  - { name: y, path: y.py }\n"),
    ]);
    let err = resolve(&stock, "E", "a").unwrap_err();
    assert!(matches!(err, BomError::LocalAlsoImported { ref entry } if entry == "E^x"));
  }

  #[test]
  fn undefined_use_fails() {
    let (_temp, stock) = stock_with(&[(
      "A/E.mupy",
      "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ ghost ] }\n",
    )]);
    let err = resolve(&stock, "E", "a").unwrap_err();
    assert_eq!(err.to_string(), "undefined E^ghost");
  }

  #[test]
  fn imported_part_must_be_exported() {
    let (_temp, stock) = stock_with(&[
      (
        "A/E.mupy",
        "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ x ] }\nimports:\n  - { name: F, parts: [ { name: y, as: x } ] }\n",
      ),
      ("A/F.mupy", "parts:\n  - { name: y, path: y.py }\n"),
    ]);
    let err = resolve(&stock, "E", "a").unwrap_err();
    assert!(matches!(err, BomError::Stock(StockError::NotExported { .. })));
  }

  #[test]
  fn try_walk_stops_on_error() {
    let (_temp, stock) = stock_with(&[(
      "A/E.mupy",
      "exports: [ a ]\nparts:\n  - { name: a, path: a.py, uses: [ b, c ] }\n  - { name: b, path: b.py }\n  - { name: c, path: c.py }\n",
    )]);
    let bom = resolve(&stock, "E", "a").unwrap();
    let mut seen = Vec::new();
    let result: Result<(), String> = bom.try_walk(
      |c, _| {
        seen.push(c.part().name().to_string());
        if c.part().name() == "b" { Err("stop".to_string()) } else { Ok(()) }
      },
      |_| (),
      (),
    );
    assert_eq!(result, Err("stop".to_string()));
    assert_eq!(seen, ["a", "b"]);
  }

  #[test]
  fn serializes_to_json() {
    let (temp, stock) = stock_with(&[("A/E.mupy", "exports: [ a ]\nparts:\n  - { name: a, path: a.py }\n")]);
    let bom = resolve(&stock, "E", "a").unwrap();
    let json = serde_json::to_value(&bom).unwrap();
    assert_eq!(json["nodes"][0]["component"]["name"], "E^a");
    assert_eq!(json["nodes"][0]["component"]["grade"], "A");
    assert_eq!(
      Path::new(json["nodes"][0]["component"]["path"].as_str().unwrap()),
      temp.path().join("A")
    );
  }
}
