//! Implementation of the `mupy images` commands.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use mupy_lib::config::Configuration;
use mupy_lib::consts::CONFIG_FILENAME;
use mupy_lib::target::remove_all_images;

use super::runtime;
use crate::output::Progress;

#[derive(Subcommand, Debug)]
pub enum ImagesCommand {
  /// Build the container image for a target type, or for every configured type
  Install {
    /// Target type, e.g. micropython
    kind: Option<String>,
  },

  /// Remove every mupy container image
  Remove,
}

pub fn cmd_images(directory: &Path, command: ImagesCommand, progress: Progress) -> Result<()> {
  match command {
    ImagesCommand::Install { kind } => cmd_install(directory, kind.as_deref(), progress),
    ImagesCommand::Remove => cmd_remove(progress),
  }
}

fn cmd_install(directory: &Path, kind: Option<&str>, progress: Progress) -> Result<()> {
  let config = Configuration::from_search(directory, CONFIG_FILENAME)
    .map_err(mupy_lib::Error::from)
    .context("Failed to load configuration")?;
  let kinds: Vec<String> = match kind {
    Some(kind) => vec![kind.to_string()],
    None => config.mode_names().map(str::to_string).collect(),
  };

  let rt = runtime()?;
  for kind in &kinds {
    let mode = config.mode(kind).map_err(mupy_lib::Error::from)?;
    rt.block_on(mode.install_image(|line| progress.line(line)))
      .map_err(mupy_lib::Error::from)
      .with_context(|| format!("Failed to install image {}", mode.tag()))?;
  }
  Ok(())
}

fn cmd_remove(progress: Progress) -> Result<()> {
  let rt = runtime()?;
  let count = rt
    .block_on(remove_all_images(|line| progress.line(line)))
    .map_err(mupy_lib::Error::from)
    .context("Failed to remove images")?;
  progress.success(&format!("Removed {count} image(s)"));
  Ok(())
}
