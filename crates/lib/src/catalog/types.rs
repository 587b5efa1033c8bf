use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::tag::{TagError, TagIndex, TagRay};

use super::CatalogError;

/// Named substitution variables available to a part's shell hooks.
pub type Shlet = BTreeMap<String, String>;

/// One tagged variant of a part's shell hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSpec {
  pub commands: Vec<String>,
  /// Quiet hooks (`shhell`) run without reporting their output.
  pub quiet: bool,
}

/// A named unit of an ensemble.
#[derive(Debug)]
pub struct Part {
  pub(super) name: String,
  pub(super) path: Option<PathBuf>,
  pub(super) paths: TagIndex<PathBuf>,
  pub(super) shlets: TagIndex<Shlet>,
  pub(super) shells: TagIndex<ShellSpec>,
  pub(super) uses: Vec<String>,
}

impl Part {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The untagged base path, relative to the ensemble root.
  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  /// True if the part declares a base path or any tagged path.
  pub fn has_path(&self) -> bool {
    !self.paths.is_empty()
  }

  pub fn tagged_path(&self, tags: &TagRay) -> Result<&Path, TagError> {
    self.paths.max(tags).map(PathBuf::as_path)
  }

  pub fn tagged_shlet(&self, tags: &TagRay) -> Result<Option<&Shlet>, TagError> {
    self.shlets.max_or_none(tags)
  }

  pub fn tagged_shell(&self, tags: &TagRay) -> Result<Option<&ShellSpec>, TagError> {
    self.shells.max_or_none(tags)
  }

  pub fn uses(&self) -> &[String] {
    &self.uses
  }
}

/// Parts imported from another ensemble's exports, under local aliases.
#[derive(Debug, Clone)]
pub struct Import {
  pub(super) name: String,
  /// alias -> exported part name
  pub(super) aliases: BTreeMap<String, String>,
  /// Recorded only; resolution does not check it.
  pub(super) version: Option<String>,
}

impl Import {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn aliases(&self) -> &BTreeMap<String, String> {
    &self.aliases
  }

  pub fn resolve(&self, alias: &str) -> Option<&str> {
    self.aliases.get(alias).map(String::as_str)
  }

  pub fn version(&self) -> Option<&str> {
    self.version.as_deref()
  }
}

/// The unit of distribution, loaded from one descriptor file.
#[derive(Debug)]
pub struct Ensemble {
  pub(super) grade: String,
  pub(super) path: PathBuf,
  pub(super) name: String,
  pub(super) parts: Vec<Arc<Part>>,
  pub(super) exports: Vec<String>,
  pub(super) imports: Vec<Import>,
  pub(super) version: Option<String>,
}

impl Ensemble {
  pub fn grade(&self) -> &str {
    &self.grade
  }

  /// Base directory for the parts' relative paths.
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn parts(&self) -> &[Arc<Part>] {
    &self.parts
  }

  pub fn exports(&self) -> &[String] {
    &self.exports
  }

  pub fn imports(&self) -> &[Import] {
    &self.imports
  }

  pub fn version(&self) -> Option<&str> {
    self.version.as_deref()
  }

  pub fn is_export(&self, name: &str) -> bool {
    self.exports.iter().any(|e| e == name)
  }

  pub fn has_part(&self, name: &str) -> bool {
    self.parts.iter().any(|p| p.name == name)
  }

  /// Look up a part by name. Two parts with the same name are an error.
  pub fn get_part(&self, name: &str) -> Result<Option<&Arc<Part>>, CatalogError> {
    let mut found = self.parts.iter().filter(|p| p.name == name);
    let first = found.next();
    if found.next().is_some() {
      return Err(CatalogError::DuplicatePart {
        part: name.to_string(),
        ensemble: self.name.clone(),
      });
    }
    Ok(first)
  }

  /// The import declaring `alias`, if any.
  pub fn import_for(&self, alias: &str) -> Option<&Import> {
    self.imports.iter().find(|i| i.aliases.contains_key(alias))
  }

  /// A readable YAML summary of the ensemble.
  pub fn to_yaml(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} \"{}\"", self.name, self.path.display());
    let _ = writeln!(out, "exports: [ {} ]", self.exports.join(", "));
    if !self.parts.is_empty() {
      out.push_str("parts:\n");
      for part in &self.parts {
        out.push_str("  -\n");
        let _ = writeln!(out, "    name: {}", part.name);
        if let Some(path) = &part.path {
          let _ = writeln!(out, "    path: \"{}\"", path.display());
        }
        for (tags, path) in part.paths.iter().filter(|(t, _)| !t.is_empty()) {
          let _ = writeln!(out, "    path{}: \"{}\"", tags, path.display());
        }
        for (tags, shell) in part.shells.iter() {
          let key = if shell.quiet { "shhell" } else { "shell" };
          let _ = writeln!(out, "    {key}{tags}: {} command(s)", shell.commands.len());
        }
        if !part.uses.is_empty() {
          let _ = writeln!(out, "    uses: [ {} ]", part.uses.join(", "));
        }
      }
    }
    if !self.imports.is_empty() {
      out.push_str("imports:\n");
      for import in &self.imports {
        out.push_str("  -\n");
        let _ = writeln!(out, "    name: {}", import.name);
        if let Some(version) = &import.version {
          let _ = writeln!(out, "    version: \"{version}\"");
        }
        out.push_str("    parts:\n");
        for (alias, name) in &import.aliases {
          let _ = writeln!(out, "      - {{ name: {name}, as: {alias} }}");
        }
      }
    }
    out
  }
}
