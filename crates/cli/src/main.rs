mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mupy_lib::consts::DIRECTORY_ENV;

use cmd::{ImagesCommand, PipelineArgs, StockArgs};
use output::{OutputFormat, Progress};

/// mupy - build, install and run Python parts on CPython and MicroPython targets
#[derive(Parser)]
#[command(name = "mupy")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Host directory; mupy.yaml is searched for here and in its parents
  #[arg(short, long, global = true, env = DIRECTORY_ENV, default_value = ".")]
  directory: PathBuf,

  /// Log progress at info level
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Suppress progress output
  #[arg(short, long, global = true)]
  quiet: bool,

  /// Log at debug level and print full error chains
  #[arg(long, global = true)]
  debug: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create mupy.yaml and the stock and build directories
  Setup {
    /// Overwrite an existing mupy.yaml and fix read-only directories
    #[arg(long)]
    force: bool,
  },

  /// Manage container images for docker and cross targets
  #[command(subcommand)]
  Images(ImagesCommand),

  /// List grade levels and ensembles, or show one ensemble
  Stock(StockArgs),

  /// Print the bill of materials of an entry part
  Bom {
    /// Reference, e.g. pkg^hello
    reference: String,

    /// Ignore grade levels above this one
    #[arg(short, long)]
    grade: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Materialize the kit of an entry part
  Kit(PipelineArgs),

  /// Compile the kit for its target
  Build(PipelineArgs),

  /// Build and install to the target
  Install(PipelineArgs),

  /// Build, install and run on the target
  Run {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Do not print the program's output
    #[arg(long)]
    silent: bool,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.debug {
    "debug"
  } else if cli.verbose {
    "info"
  } else {
    "warn"
  };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let progress = Progress::new(cli.quiet);
  let directory = cli.directory.as_path();

  let result = match cli.command {
    Commands::Setup { force } => cmd::cmd_setup(directory, force, progress),
    Commands::Images(command) => cmd::cmd_images(directory, command, progress),
    Commands::Stock(args) => cmd::cmd_stock(directory, &args),
    Commands::Bom {
      reference,
      grade,
      output,
    } => cmd::cmd_bom(directory, &reference, grade.as_deref(), output),
    Commands::Kit(args) => cmd::cmd_kit(directory, &args, progress),
    Commands::Build(args) => cmd::cmd_build(directory, &args, progress),
    Commands::Install(args) => cmd::cmd_install(directory, &args, progress),
    Commands::Run { pipeline, silent } => cmd::cmd_run(directory, &pipeline, silent, progress),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_failure(&err, cli.debug);
      ExitCode::FAILURE
    }
  }
}
