//! A loaded host: configuration, directory layout and stock.
//!
//! Every pipeline command starts by opening a session from a working
//! directory, then resolves a reference against it stage by stage.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::bom::{Bom, Component};
use crate::build::Build;
use crate::config::{Configuration, Host};
use crate::consts::CONFIG_FILENAME;
use crate::error::Error;
use crate::kit::{Kit, KitEvent};
use crate::stock::Stock;
use crate::syntax::Reference;
use crate::tag::TagRay;
use crate::target::Target;

#[derive(Debug)]
pub struct Session {
  config: Configuration,
  host: Host,
  stock: Stock,
}

impl Session {
  /// Find `mupy.yaml` in or above `directory` and scan its stock, keeping
  /// only grade levels up to `grade`.
  pub fn open(directory: &Path, grade: Option<&str>) -> Result<Self, Error> {
    let config = Configuration::from_search(directory, CONFIG_FILENAME)?;
    let host = Host::from_config(&config);
    let stock = Stock::from_path(host.stock_path(), grade)?;
    info!(root = ?host.root(), levels = stock.levels().len(), "session opened");
    Ok(Self { config, host, stock })
  }

  pub fn config(&self) -> &Configuration {
    &self.config
  }

  pub fn host(&self) -> &Host {
    &self.host
  }

  pub fn stock(&self) -> &Stock {
    &self.stock
  }

  /// The target named by the reference, or the configured default.
  pub fn target(&self, reference: &Reference) -> Result<Target, Error> {
    let config = self.config.target(reference.target.as_deref())?;
    Ok(Target::from_config(&config)?)
  }

  /// The reference's entry part, which must be exported.
  pub fn component(&self, reference: &Reference) -> Result<Component, Error> {
    let entry = reference.require_entry()?;
    Ok(self.stock.get_component(entry, &reference.ensemble, entry, false)?)
  }

  pub fn bom(&self, reference: &Reference) -> Result<Bom, Error> {
    let root = self.component(reference)?;
    Ok(Bom::from_stock(&self.stock, root)?)
  }

  /// Where the kit for `reference` is materialized.
  pub fn kit_path(&self, reference: &Reference) -> Result<PathBuf, Error> {
    Ok(self.host.kit_path().join(reference.entry_name()?))
  }

  /// Resolve the BOM and materialize it for `target`, with `extra` tags added
  /// to the target's own.
  pub async fn kit<F>(&self, reference: &Reference, target: &Target, extra: &TagRay, callback: F) -> Result<Kit, Error>
  where
    F: FnMut(KitEvent<'_>),
  {
    let bom = self.bom(reference)?;
    let tags = target.tags().plus(extra);
    let shell = self.config.shell()?;
    let path = self.kit_path(reference)?;
    Ok(Kit::from_bom(&bom, &path, &tags, &shell, callback).await?)
  }

  /// Compile an existing kit for `target`.
  pub async fn build<F>(&self, reference: &Reference, kit: &Kit, target: &Target, callback: F) -> Result<Build, Error>
  where
    F: FnMut(&str),
  {
    let entry = reference.entry_name()?;
    Ok(Build::from_kit(kit, self.host.build_path(), &entry, target, callback).await?)
  }
}
