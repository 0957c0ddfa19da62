//! Build system configuration.
//!
//! Configuration is a plain value threaded into the components that need it.
//! It is loaded from TOML and then overlaid with registry settings from the
//! environment.
//!
//! # Format
//!
//! ```toml
//! registry = "registry.example.com"
//! registry_api_url = "https://registry.example.com/v2"
//! registry_extended_api_url = "https://registry.example.com/api/docker/checks/v2"
//! checks_repo = "vulcan-checks"
//! toolchain_version_cmd = "git -C ../sdk rev-parse --short HEAD"
//!
//! [compile]
//! command = "go build ."
//! env = { GOOS = "linux", CGO_ENABLED = "0" }
//!
//! [environments]
//! primary_master = ["https://persistence.example.com"]
//! primary_dev = ["https://persistence-dev.example.com"]
//! ```

mod environments;

pub use environments::*;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFIG_FILENAME, DEFAULT_CONTAINER_CLI, DEFAULT_DEV_SUFFIX, DEFAULT_MANIFEST_FILE, DEFAULT_PRODUCTION_BRANCH,
  ENV_REGISTRY, ENV_REGISTRY_PASSWORD, ENV_REGISTRY_USER, LEGACY_CONFIG_FILENAME,
};
use crate::platform::paths::{config_dir, home_dir};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(PathBuf),

  #[error("no config file found (looked in {})", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
  NoneFound(Vec<PathBuf>),

  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// How check sources are compiled before packaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileConfig {
  /// Shell command run in the check directory.
  pub command: String,

  /// Extra environment for the command, on top of the inherited one.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

impl Default for CompileConfig {
  fn default() -> Self {
    Self {
      command: "go build -a -ldflags '-extldflags -static' .".to_string(),
      env: BTreeMap::from([
        ("GOOS".to_string(), "linux".to_string()),
        ("CGO_ENABLED".to_string(), "0".to_string()),
      ]),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Registry host used in image references.
  pub registry: String,

  /// Base URL of the registry API (`/{repo}/{name}/tags/list`, `/_catalog`).
  pub registry_api_url: String,

  /// Base URL of the registry's extended API exposing image properties.
  pub registry_extended_api_url: String,

  pub registry_user: String,
  pub registry_password: String,

  /// Registry namespace holding the check images.
  pub checks_repo: String,

  pub production_branch: String,

  /// Suffix appended to artifact names built outside the production branch.
  pub dev_suffix: String,

  pub manifest_file: String,

  /// Container CLI used to build and push images (`docker`, `podman`).
  pub container_cli: String,

  /// Shell command printing the current toolchain version.
  pub toolchain_version_cmd: Option<String>,

  pub compile: CompileConfig,

  pub environments: EnvironmentsConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      registry: String::new(),
      registry_api_url: String::new(),
      registry_extended_api_url: String::new(),
      registry_user: String::new(),
      registry_password: String::new(),
      checks_repo: String::new(),
      production_branch: DEFAULT_PRODUCTION_BRANCH.to_string(),
      dev_suffix: DEFAULT_DEV_SUFFIX.to_string(),
      manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
      container_cli: DEFAULT_CONTAINER_CLI.to_string(),
      toolchain_version_cmd: None,
      compile: CompileConfig::default(),
      environments: EnvironmentsConfig::default(),
    }
  }
}

impl Config {
  /// Parse configuration from TOML. `path` is only used for error context.
  pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Load configuration from a file and apply environment overrides.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound(path.to_path_buf())),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    let mut config = Self::from_toml(&content, path)?;
    config.apply_env_overrides();
    debug!(path = %path.display(), "loaded config");
    Ok(config)
  }

  /// Load configuration from an explicit path, or from the default locations.
  pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    Self::load(&find_config_path(explicit)?)
  }

  /// Overlay registry settings from the environment. Empty values are ignored.
  pub fn apply_env_overrides(&mut self) {
    let overrides = [
      (ENV_REGISTRY_USER, &mut self.registry_user),
      (ENV_REGISTRY_PASSWORD, &mut self.registry_password),
      (ENV_REGISTRY, &mut self.registry),
    ];
    for (var, field) in overrides {
      match std::env::var(var) {
        Ok(value) if !value.is_empty() => *field = value,
        _ => {}
      }
    }
  }

  /// Registry credentials, when both user and password are set.
  pub fn registry_credentials(&self) -> Option<(&str, &str)> {
    if self.registry_user.is_empty() || self.registry_password.is_empty() {
      None
    } else {
      Some((&self.registry_user, &self.registry_password))
    }
  }

  /// Classify a branch name.
  pub fn branch_class(&self, branch: Option<&str>) -> BranchClass {
    match branch {
      Some(b) if b == self.production_branch => BranchClass::Master,
      _ => BranchClass::Dev,
    }
  }
}

/// Find the config file.
///
/// Priority order:
/// 1. Explicit path (must exist)
/// 2. `$XDG_CONFIG_HOME/checkbuild/config.toml` (`~/.config/...` without XDG)
/// 3. `~/.checkbuild.toml`
pub fn find_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
  if let Some(path) = explicit {
    if path.exists() {
      return Ok(path.to_path_buf());
    }
    return Err(ConfigError::NotFound(path.to_path_buf()));
  }

  let candidates: Vec<PathBuf> = [
    config_dir().map(|dir| dir.join(CONFIG_FILENAME)),
    home_dir().map(|home| home.join(LEGACY_CONFIG_FILENAME)),
  ]
  .into_iter()
  .flatten()
  .collect();

  let found = candidates.iter().find(|p| p.exists()).cloned();
  found.ok_or(ConfigError::NoneFound(candidates))
}
