mod bom;
mod images;
mod pipeline;
mod setup;
mod stock;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

pub use bom::cmd_bom;
pub use images::{ImagesCommand, cmd_images};
pub use pipeline::{PipelineArgs, cmd_build, cmd_install, cmd_kit, cmd_run};
pub use setup::cmd_setup;
pub use stock::{StockArgs, cmd_stock};

fn runtime() -> Result<Runtime> {
  Runtime::new().context("Failed to create async runtime")
}
