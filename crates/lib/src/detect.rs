//! Change detection: which checks need a new build.
//!
//! A check is rebuilt when its source moved on since the deployed build, when
//! the toolchain changed, when it has never been deployed, or when forced.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::{ArtifactError, DetectedArtifact, artifact_name};
use crate::config::BranchClass;
use crate::consts::FORCE_ALL_TOKEN;
use crate::git::{GitError, SourceStateReader};
use crate::registry::{DeployedStateReader, RegistryError};
use crate::version::{latest_tag, next_tag};

#[derive(Debug, Error)]
pub enum DetectError {
  #[error("failed to list directories under '{path}': {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("check '{name}' not found under '{base}'")]
  NotFound { name: String, base: PathBuf },

  #[error(transparent)]
  Git(#[from] GitError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Artifact(#[from] ArtifactError),
}

/// Which checks a detection pass considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionMode {
  /// Every check, rebuilt unconditionally.
  All,
  /// One named check, rebuilt unconditionally.
  Single(String),
  /// Every check, rebuilt only when changed.
  ChangedOnly,
}

impl DetectionMode {
  /// Mode selected by the force setting: unset, [`FORCE_ALL_TOKEN`] or a check name.
  pub fn from_force(force: Option<&str>) -> Self {
    match force.map(str::trim) {
      None | Some("") => DetectionMode::ChangedOnly,
      Some(FORCE_ALL_TOKEN) => DetectionMode::All,
      Some(name) => DetectionMode::Single(name.to_string()),
    }
  }
}

/// Compares source state with deployed state.
pub struct ChangeDetector<'a, S, D> {
  source: &'a S,
  deployed: &'a D,
  branch: BranchClass,
  dev_suffix: String,
  toolchain_version: String,
}

impl<'a, S, D> ChangeDetector<'a, S, D>
where
  S: SourceStateReader,
  D: DeployedStateReader,
{
  pub fn new(
    source: &'a S,
    deployed: &'a D,
    branch: BranchClass,
    dev_suffix: impl Into<String>,
    toolchain_version: impl Into<String>,
  ) -> Self {
    Self {
      source,
      deployed,
      branch,
      dev_suffix: dev_suffix.into(),
      toolchain_version: toolchain_version.into(),
    }
  }

  /// Checks under `base_dir` that need a build, in directory name order.
  ///
  /// Source state for every candidate is read before the registry is
  /// queried; any failure aborts the pass with no partial result.
  pub async fn detect(&self, base_dir: &Path, mode: &DetectionMode) -> Result<Vec<DetectedArtifact>, DetectError> {
    info!(branch = %self.branch, toolchain_version = %self.toolchain_version, "detecting changed checks");

    let dirs = list_dirs(base_dir)?;
    let (dirs, force) = match mode {
      DetectionMode::ChangedOnly => (dirs, false),
      DetectionMode::All => {
        info!("rebuilding all checks");
        (dirs, true)
      }
      DetectionMode::Single(name) => {
        let dir = dirs
          .into_iter()
          .find(|dir| dir.file_name().is_some_and(|n| n == name.as_str()))
          .ok_or_else(|| DetectError::NotFound {
            name: name.clone(),
            base: base_dir.to_path_buf(),
          })?;
        (vec![dir], true)
      }
    };

    let mut commits = Vec::with_capacity(dirs.len());
    for dir in dirs {
      let commit = self.source.last_commit(&dir).await?;
      commits.push((dir, commit));
    }

    let mut selected = Vec::new();
    for (dir, commit) in commits {
      if let Some(tag) = self.next_build_tag(&dir, &commit, force).await? {
        info!(path = %dir.display(), tag = %tag, commit = %commit, "check needs build");
        selected.push(DetectedArtifact { path: dir, tag, commit });
      }
    }
    Ok(selected)
  }

  /// Tag to build `dir` with, or `None` when the deployed build is current.
  async fn next_build_tag(&self, dir: &Path, commit: &str, force: bool) -> Result<Option<String>, DetectError> {
    let name = artifact_name(dir, self.branch, &self.dev_suffix)?;
    let tags = self.deployed.list_tags(&name).await?;
    let (latest, found) = latest_tag(&tags.tags);
    let next = next_tag(&latest);

    if !found {
      debug!(name = %name, "no deployed version");
      return Ok(Some(next));
    }
    if force {
      return Ok(Some(next));
    }

    let state = self.deployed.tag_info(&name, &latest).await?;
    let deployed_commit = state.commit.as_deref().unwrap_or_default();
    let deployed_toolchain = state.toolchain_version.as_deref().unwrap_or_default();

    if deployed_commit != commit {
      debug!(name = %name, deployed = %deployed_commit, current = %commit, "source changed");
      return Ok(Some(next));
    }
    if deployed_toolchain != self.toolchain_version {
      debug!(name = %name, deployed = %deployed_toolchain, current = %self.toolchain_version, "toolchain changed");
      return Ok(Some(next));
    }

    debug!(name = %name, tag = %latest, "deployed build is current");
    Ok(None)
  }
}

/// Immediate subdirectories of `base`, sorted by name.
fn list_dirs(base: &Path) -> Result<Vec<PathBuf>, DetectError> {
  let read_err = |source| DetectError::ReadDir {
    path: base.to_path_buf(),
    source,
  };

  let mut dirs = Vec::new();
  for entry in fs::read_dir(base).map_err(read_err)? {
    let entry = entry.map_err(read_err)?;
    if entry.file_type().map_err(read_err)?.is_dir() {
      dirs.push(entry.path());
    }
  }
  dirs.sort();
  Ok(dirs)
}
