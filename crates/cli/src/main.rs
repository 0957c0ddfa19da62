mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use checkbuild_lib::consts::{ENV_BRANCH, ENV_FORCE_BUILD};

use cmd::{cmd_build, cmd_detect, cmd_local, cmd_publish, cmd_queue, cmd_run};

/// checkbuild - change detection, versioning and publication of checks
#[derive(Parser)]
#[command(name = "checkbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Config file (default: ~/.config/checkbuild/config.toml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Branch being built (default: the checked-out branch)
  #[arg(long, global = true, env = ENV_BRANCH)]
  branch: Option<String>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output results as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Write the list of checks that need a build
  Detect {
    /// Directory holding one subdirectory per check
    base_dir: PathBuf,

    /// File receiving one `path:tag:commit` line per check
    output: PathBuf,

    /// Rebuild one check by name, or every check with ALL
    #[arg(long, env = ENV_FORCE_BUILD)]
    force: Option<String>,
  },

  /// Build, push and announce the checks in a detection list
  Build {
    /// File written by `detect`
    images_file: PathBuf,
  },

  /// Build an image for one check locally, without pushing it
  Local {
    /// Check directory
    dir: PathBuf,
  },

  /// Build a check locally and run it once, configured by its local.toml
  Run {
    /// Check directory
    dir: PathBuf,
  },

  /// Announce the latest image of every check to one persistence endpoint
  Publish {
    /// Persistence service base URL
    endpoint: String,
  },

  /// Serve an in-memory message queue over HTTP until interrupted
  Queue {
    /// Address to bind; port 0 picks a free port
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// First path segment of the queue routes
    #[arg(long, default_value = "check")]
    path: String,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = cli.config.as_deref();
  let branch = cli.branch.as_deref();

  match cli.command {
    Commands::Detect {
      base_dir,
      output,
      force,
    } => cmd_detect(config, branch, &base_dir, &output, force.as_deref(), cli.json),
    Commands::Build { images_file } => cmd_build(config, branch, &images_file, cli.json),
    Commands::Local { dir } => cmd_local(config, branch, &dir, cli.json),
    Commands::Run { dir } => cmd_run(config, branch, &dir, cli.json),
    Commands::Publish { endpoint } => cmd_publish(config, &endpoint, cli.json),
    Commands::Queue { addr, path } => cmd_queue(&addr, &path),
  }
}
