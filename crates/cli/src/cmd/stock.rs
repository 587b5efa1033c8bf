//! Implementation of the `mupy stock` command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;

use mupy_lib::session::Session;
use mupy_lib::syntax::Reference;

use crate::output::{print_info, print_stat};

#[derive(Args, Debug)]
pub struct StockArgs {
  /// Ensemble to show, e.g. pkg or pkg^hello
  pub reference: Option<String>,

  /// Ignore grade levels above this one
  #[arg(short, long)]
  pub grade: Option<String>,
}

pub fn cmd_stock(directory: &Path, args: &StockArgs) -> Result<()> {
  let session = Session::open(directory, args.grade.as_deref()).context("Failed to open stock")?;
  let stock = session.stock();

  let Some(reference) = &args.reference else {
    print_info(&format!("Stock {}", stock.path().display()));
    if let Some(grade) = stock.grade() {
      print_stat("grade", grade);
    }
    for level in stock.levels() {
      println!("{}", level.grade());
      for ensemble in level.iter() {
        println!("  {}", ensemble.name());
      }
    }
    return Ok(());
  };

  let reference = Reference::parse(reference).map_err(mupy_lib::Error::from)?;
  let Some(ensemble) = stock.ensemble(&reference.ensemble) else {
    bail!("ensemble '{}' not found in {}", reference.ensemble, stock.path().display());
  };
  print!("{}", ensemble.to_yaml());
  Ok(())
}
