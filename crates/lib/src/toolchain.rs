//! Build toolchain version.
//!
//! Images record the toolchain version they were built with, so a toolchain
//! upgrade triggers a rebuild of every check.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::util::cmd::run_shell;

#[derive(Debug, Error)]
pub enum ToolchainError {
  #[error("failed to run toolchain version command '{command}': {source}")]
  Spawn {
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("toolchain version command '{command}' failed (exit code {code:?}): {stderr}")]
  Failed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },
}

/// Current toolchain version, or an empty string when no command is configured.
pub async fn current_version(command: Option<&str>) -> Result<String, ToolchainError> {
  let Some(command) = command.filter(|c| !c.trim().is_empty()) else {
    return Ok(String::new());
  };

  let output = run_shell(command, None, &BTreeMap::new())
    .await
    .map_err(|source| ToolchainError::Spawn {
      command: command.to_string(),
      source,
    })?;

  if !output.success() {
    return Err(ToolchainError::Failed {
      command: command.to_string(),
      code: output.code,
      stderr: output.stderr.trim().to_string(),
    });
  }

  let version = output.stdout.trim().to_string();
  debug!(version = %version, "resolved toolchain version");
  Ok(version)
}
