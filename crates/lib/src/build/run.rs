//! Running a locally built check image.
//!
//! A check directory may hold a `local.toml` describing how to run the check
//! by hand. It uses the check SDK's local config layout:
//!
//! ```toml
//! AllowPrivateIps = false
//!
//! [Check]
//! Target = "example.com"
//! Options = '{"depth": 2}'
//!
//! [Log]
//! LogLevel = "debug"
//!
//! [RequiredVars]
//! API_TOKEN = "..."
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use super::BuildError;
use crate::consts::LOCAL_RUN_FILE;

pub const ENV_CHECK_TARGET: &str = "VULCAN_CHECK_TARGET";
pub const ENV_CHECK_OPTIONS: &str = "VULCAN_CHECK_OPTIONS";
pub const ENV_ALLOW_PRIVATE_IPS: &str = "VULCAN_ALLOW_PRIVATE_IPS";
pub const ENV_LOG_LEVEL: &str = "VULCAN_CHECK_LOG_LVL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalRunConfig {
  #[serde(rename = "Check", alias = "check")]
  pub check: LocalCheck,

  #[serde(rename = "Log", alias = "log")]
  pub log: LocalLog,

  /// Unset means private IPs are allowed.
  #[serde(rename = "AllowPrivateIps", alias = "allow_private_ips")]
  pub allow_private_ips: Option<bool>,

  #[serde(rename = "RequiredVars", alias = "required_vars")]
  pub required_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalCheck {
  #[serde(rename = "Target", alias = "target")]
  pub target: String,

  #[serde(rename = "Options", alias = "options")]
  pub options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalLog {
  #[serde(rename = "LogLevel", alias = "log_level")]
  pub log_level: String,
}

impl LocalRunConfig {
  /// Read `local.toml` from a check directory. A missing file is `None`.
  pub fn load(dir: &Path) -> Result<Option<Self>, BuildError> {
    let path = dir.join(LOCAL_RUN_FILE);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no local run config");
        return Ok(None);
      }
      Err(source) => return Err(BuildError::LocalConfigRead { path, source }),
    };

    toml::from_str(&content)
      .map(Some)
      .map_err(|source| BuildError::LocalConfigParse { path, source })
  }

  /// Environment of the check container.
  pub fn env(&self) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(ENV_CHECK_TARGET.to_string(), self.check.target.clone());
    env.insert(ENV_CHECK_OPTIONS.to_string(), self.check.options.clone());
    env.insert(
      ENV_ALLOW_PRIVATE_IPS.to_string(),
      self.allow_private_ips.unwrap_or(true).to_string(),
    );
    if !self.log.log_level.is_empty() {
      env.insert(ENV_LOG_LEVEL.to_string(), self.log.log_level.clone());
    }
    env.extend(self.required_vars.clone());
    env
  }
}
