//! Artifacts and the build list passed from detection to the build phase.
//!
//! The build list is plain text, one `path:tag:commit` line per artifact,
//! where `tag` is the tag the artifact will be built with.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::BranchClass;
use crate::manifest::{Manifest, ManifestError, read_manifest};

#[derive(Debug, Error)]
pub enum ArtifactError {
  #[error("cannot derive an artifact name from '{0}'")]
  InvalidPath(PathBuf),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("invalid build list entry {line:?}: expected path:tag:commit")]
  InvalidEntry { line: String },

  #[error("failed to read build list '{path}': {source}")]
  ReadList {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write build list '{path}': {source}")]
  WriteList {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Externally visible name of the artifact built from `dir`.
///
/// The directory's base name, suffixed with `dev_suffix` outside the
/// production branch.
pub fn artifact_name(dir: &Path, branch: BranchClass, dev_suffix: &str) -> Result<String, ArtifactError> {
  let base = dir
    .file_name()
    .and_then(|name| name.to_str())
    .filter(|name| !name.is_empty())
    .ok_or_else(|| ArtifactError::InvalidPath(dir.to_path_buf()))?;

  Ok(match branch {
    BranchClass::Master => base.to_string(),
    BranchClass::Dev => format!("{}{}", base, dev_suffix),
  })
}

/// Full image reference, `{registry}/{repo}/{name}:{tag}`.
///
/// An empty registry or repo is left out rather than producing `//`.
pub fn image_ref(registry: &str, repo: &str, name: &str, tag: &str) -> String {
  let path = [registry, repo, name]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("/");
  format!("{}:{}", path, tag)
}

/// A check ready to be built: where it lives, what it is called and its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
  pub name: String,
  pub source_path: PathBuf,
  pub manifest: Manifest,
}

impl Artifact {
  /// Read the artifact in `dir`, validating its manifest.
  pub fn load(dir: &Path, manifest_file: &str, branch: BranchClass, dev_suffix: &str) -> Result<Self, ArtifactError> {
    let name = artifact_name(dir, branch, dev_suffix)?;
    let manifest = read_manifest(&dir.join(manifest_file))?;
    Ok(Self {
      name,
      source_path: dir.to_path_buf(),
      manifest,
    })
  }
}

/// One line of the build list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedArtifact {
  pub path: PathBuf,
  /// Tag the artifact is to be built with.
  pub tag: String,
  pub commit: String,
}

impl fmt::Display for DetectedArtifact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.path.display(), self.tag, self.commit)
  }
}

impl FromStr for DetectedArtifact {
  type Err = ArtifactError;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let invalid = || ArtifactError::InvalidEntry { line: line.to_string() };

    // Split from the right: only the path may contain ':'.
    let mut fields = line.trim().rsplitn(3, ':');
    let commit = fields.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let tag = fields.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let path = fields.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    Ok(Self {
      path: PathBuf::from(path),
      tag: tag.to_string(),
      commit: commit.to_string(),
    })
  }
}

/// Parse a build list. Blank lines are ignored.
pub fn parse_build_list(content: &str) -> Result<Vec<DetectedArtifact>, ArtifactError> {
  content
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(str::parse)
    .collect()
}

pub fn read_build_list(path: &Path) -> Result<Vec<DetectedArtifact>, ArtifactError> {
  let content = fs::read_to_string(path).map_err(|source| ArtifactError::ReadList {
    path: path.to_path_buf(),
    source,
  })?;
  parse_build_list(&content)
}

pub fn write_build_list(path: &Path, artifacts: &[DetectedArtifact]) -> Result<(), ArtifactError> {
  let content = artifacts.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
  fs::write(path, content).map_err(|source| ArtifactError::WriteList {
    path: path.to_path_buf(),
    source,
  })
}
