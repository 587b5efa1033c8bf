//! Implementation of the `mupy setup` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use mupy_lib::setup::setup;

use crate::output::{Progress, symbols};

pub fn cmd_setup(directory: &Path, force: bool, progress: Progress) -> Result<()> {
  let result = setup(directory, force)
    .map_err(mupy_lib::Error::from)
    .with_context(|| format!("Failed to set up {}", directory.display()))?;

  if progress.is_quiet() {
    return Ok(());
  }
  for path in &result.directories {
    println!("  {} {}", symbols::INFO.cyan(), path.display());
  }
  println!("{} Wrote {}", symbols::SUCCESS.green(), result.config.display());
  Ok(())
}
