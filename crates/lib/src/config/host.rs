use std::path::{Path, PathBuf};

use super::Configuration;
use crate::build::BuildLayout;

pub const STOCK: &str = "stock";
pub const BUILD: &str = "build";
pub const KIT: &str = "kit";

/// Filesystem layout derived from a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
  root: PathBuf,
  stock: PathBuf,
  build: PathBuf,
}

impl Host {
  pub fn new(root: &Path, stock: &Path, build: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      stock: root.join(stock),
      build: root.join(build),
    }
  }

  pub fn from_config(config: &Configuration) -> Self {
    let directory = &config.file().directory;
    Self::new(
      config.directory(),
      directory.stock.as_deref().unwrap_or(Path::new(STOCK)),
      directory.build.as_deref().unwrap_or(Path::new(BUILD)),
    )
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn stock_path(&self) -> &Path {
    &self.stock
  }

  pub fn build_path(&self) -> &Path {
    &self.build
  }

  pub fn kit_path(&self) -> PathBuf {
    self.build.join(KIT)
  }

  pub fn layout(&self, entry: &str, target: &str) -> BuildLayout {
    BuildLayout::new(&self.build, entry, target)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_relative_to_config() {
    let config = Configuration::from_content(Path::new("/proj/mupy.yaml"), "").unwrap();
    let host = Host::from_config(&config);
    assert_eq!(host.stock_path(), Path::new("/proj/stock"));
    assert_eq!(host.kit_path(), PathBuf::from("/proj/build/kit"));
  }

  #[test]
  fn configured_directories() {
    let config =
      Configuration::from_content(Path::new("/proj/mupy.yaml"), "directory:\n  stock: lib\n  build: out\n").unwrap();
    let host = Host::from_config(&config);
    assert_eq!(host.stock_path(), Path::new("/proj/lib"));
    let layout = host.layout("app^main", "ghost");
    assert_eq!(layout.install, PathBuf::from("/proj/out/install/app^main/ghost"));
    assert_eq!(layout.cache, PathBuf::from("/proj/out/.compile/app^main/.ghost"));
  }
}
