mod build;
mod detect;
mod local;
mod publish;
mod queue;
mod run;

pub use build::cmd_build;
pub use detect::cmd_detect;
pub use local::cmd_local;
pub use publish::cmd_publish;
pub use queue::cmd_queue;
pub use run::cmd_run;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use checkbuild_lib::config::{Config, ConfigError};
use checkbuild_lib::consts::ENV_CI_BRANCH;
use checkbuild_lib::git;

/// Current-thread runtime: pipeline steps run one at a time.
fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}

fn load_config(path: Option<&Path>) -> Result<Config> {
  Config::discover(path).context("Failed to load configuration")
}

/// Like [`load_config`], but defaults apply when no config file exists.
fn load_config_or_default(path: Option<&Path>) -> Result<Config> {
  match Config::discover(path) {
    Ok(config) => Ok(config),
    Err(ConfigError::NoneFound(candidates)) => {
      debug!(?candidates, "no config file, using defaults");
      let mut config = Config::default();
      config.apply_env_overrides();
      Ok(config)
    }
    Err(e) => Err(e).context("Failed to load configuration"),
  }
}

/// The branch being built: `--branch`/`BUILD_BRANCH`, then the CI variable,
/// then the branch checked out in the working directory.
fn resolve_branch(explicit: Option<&str>) -> Option<String> {
  match explicit {
    Some(branch) if !branch.is_empty() => return Some(branch.to_string()),
    _ => {}
  }
  match std::env::var(ENV_CI_BRANCH) {
    Ok(branch) if !branch.is_empty() => return Some(branch),
    _ => {}
  }

  let cwd = std::env::current_dir().ok()?;
  match git::current_branch(&cwd) {
    Ok(branch) => branch,
    Err(e) => {
      debug!(error = %e, "could not read the checked-out branch");
      None
    }
  }
}
