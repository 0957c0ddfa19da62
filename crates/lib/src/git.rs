//! Source state: what changed last in a check's directory.
//!
//! The last commit touching a directory is read by shelling out to `git`,
//! which handles path-limited history far faster than walking it ourselves.
//! The current branch is read in-process with `gix`.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::util::cmd::run_command;

/// Errors that can occur while reading source state.
#[derive(Debug, Error)]
pub enum GitError {
  #[error("failed to run git for '{dir}': {source}")]
  Spawn {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("git log failed for '{dir}' (exit code {code:?}): {stderr}")]
  Failed {
    dir: PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  #[error("no commits found for '{dir}'")]
  NoCommits { dir: PathBuf },

  #[error("failed to open repository containing '{path}': {source}")]
  Discover {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("failed to resolve HEAD: {0}")]
  ResolveHead(String),
}

/// Reads the identifier of the latest change affecting a directory.
#[allow(async_fn_in_trait)]
pub trait SourceStateReader {
  async fn last_commit(&self, dir: &Path) -> Result<String, GitError>;
}

/// [`SourceStateReader`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
  program: String,
}

impl Default for GitCli {
  fn default() -> Self {
    Self {
      program: "git".to_string(),
    }
  }
}

impl GitCli {
  pub fn new(program: impl Into<String>) -> Self {
    Self { program: program.into() }
  }
}

impl SourceStateReader for GitCli {
  async fn last_commit(&self, dir: &Path) -> Result<String, GitError> {
    let args = [
      OsStr::new("-C"),
      dir.as_os_str(),
      OsStr::new("log"),
      OsStr::new("-n"),
      OsStr::new("1"),
      OsStr::new("--format=%h"),
      OsStr::new("--"),
      OsStr::new("."),
    ];
    let output = run_command(&self.program, args, None, &BTreeMap::new(), None)
      .await
      .map_err(|source| GitError::Spawn {
        dir: dir.to_path_buf(),
        source,
      })?;

    if !output.success() {
      return Err(GitError::Failed {
        dir: dir.to_path_buf(),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
      });
    }

    let commit = parse_last_commit(&output.stdout).ok_or_else(|| GitError::NoCommits { dir: dir.to_path_buf() })?;
    debug!(dir = %dir.display(), commit = %commit, "read last commit");
    Ok(commit)
  }
}

/// First token of the first line of `git log` output.
fn parse_last_commit(output: &str) -> Option<String> {
  output
    .lines()
    .next()
    .and_then(|line| line.split_whitespace().next())
    .map(str::to_string)
}

/// Name of the branch checked out in the repository containing `path`.
///
/// Returns `None` for a detached HEAD.
pub fn current_branch(path: &Path) -> Result<Option<String>, GitError> {
  let repo = gix::discover(path).map_err(|e| GitError::Discover {
    path: path.to_path_buf(),
    source: Box::new(e),
  })?;

  let head = repo.head_name().map_err(|e| GitError::ResolveHead(e.to_string()))?;
  Ok(head.map(|name| name.shorten().to_string()))
}
