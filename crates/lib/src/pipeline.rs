//! Batch orchestration.
//!
//! A batch is built completely before anything is published. The first
//! build failure ends the run with nothing pushed; during publication the
//! first primary-tier failure stops the remaining artifacts.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::{Artifact, ArtifactError, DetectedArtifact, artifact_name, image_ref};
use crate::build::{BuildError, Builder, ImageRunner, LocalRunConfig, image_labels};
use crate::config::{BranchClass, Config};
use crate::persistence::{Checktype, ChecktypeAnnouncer};
use crate::publish::{BuiltArtifact, PublicationCoordinator, PublishError, PublishReport};
use crate::registry::{DeployedStateReader, RegistryError};
use crate::version::latest_tag;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("failed to load check in '{path}': {source}")]
  Load {
    path: PathBuf,
    #[source]
    source: ArtifactError,
  },

  #[error("failed to build '{name}': {source}")]
  Build {
    name: String,
    #[source]
    source: BuildError,
  },

  #[error(transparent)]
  Publish(#[from] PublishError),

  #[error(transparent)]
  Registry(#[from] RegistryError),
}

/// Settings a build batch runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
  pub branch: BranchClass,
  pub dev_suffix: String,
  pub manifest_file: String,
  pub registry: String,
  pub checks_repo: String,
  pub toolchain_version: String,
}

impl BuildSettings {
  pub fn from_config(config: &Config, branch: BranchClass, toolchain_version: impl Into<String>) -> Self {
    Self {
      branch,
      dev_suffix: config.dev_suffix.clone(),
      manifest_file: config.manifest_file.clone(),
      registry: config.registry.clone(),
      checks_repo: config.checks_repo.clone(),
      toolchain_version: toolchain_version.into(),
    }
  }
}

/// Build every artifact in the list, in order.
pub async fn build_batch<B: Builder>(
  builder: &B,
  settings: &BuildSettings,
  entries: &[DetectedArtifact],
) -> Result<Vec<BuiltArtifact>, PipelineError> {
  info!(count = entries.len(), "checks to build");

  let mut built = Vec::with_capacity(entries.len());
  for entry in entries {
    built.push(build_one(builder, settings, entry).await?);
  }
  Ok(built)
}

async fn build_one<B: Builder>(
  builder: &B,
  settings: &BuildSettings,
  entry: &DetectedArtifact,
) -> Result<BuiltArtifact, PipelineError> {
  let artifact = Artifact::load(&entry.path, &settings.manifest_file, settings.branch, &settings.dev_suffix).map_err(
    |source| PipelineError::Load {
      path: entry.path.clone(),
      source,
    },
  )?;
  let image = image_ref(&settings.registry, &settings.checks_repo, &artifact.name, &entry.tag);
  let build_err = |source| PipelineError::Build {
    name: artifact.name.clone(),
    source,
  };

  builder.compile(&artifact.source_path).await.map_err(build_err)?;
  let context = builder
    .package_filesystem(&artifact.source_path)
    .await
    .map_err(build_err)?;
  let labels = image_labels(&entry.commit, &settings.toolchain_version, &artifact.manifest).map_err(build_err)?;
  let log = builder
    .build_image(context, std::slice::from_ref(&image), &labels)
    .await
    .map_err(build_err)?;
  debug!(image = %image, log = %log, "image built");
  info!(image = %image, "image built");

  Ok(BuiltArtifact {
    name: artifact.name,
    image_ref: image,
    manifest: artifact.manifest,
  })
}

/// Publish built artifacts in order, stopping at the first failure.
pub async fn publish_batch<B, A>(
  coordinator: &PublicationCoordinator<'_, B, A>,
  built: &[BuiltArtifact],
) -> Result<Vec<PublishReport>, PipelineError>
where
  B: Builder,
  A: ChecktypeAnnouncer,
{
  let mut reports = Vec::with_capacity(built.len());
  for artifact in built {
    reports.push(coordinator.publish(artifact).await?);
  }
  Ok(reports)
}

/// Build the whole list, then publish it.
pub async fn run_batch<B, A>(
  builder: &B,
  coordinator: &PublicationCoordinator<'_, B, A>,
  settings: &BuildSettings,
  entries: &[DetectedArtifact],
) -> Result<Vec<PublishReport>, PipelineError>
where
  B: Builder,
  A: ChecktypeAnnouncer,
{
  if entries.is_empty() {
    info!("no checks to build");
    return Ok(Vec::new());
  }
  let built = build_batch(builder, settings, entries).await?;
  publish_batch(coordinator, &built).await
}

/// Build an image from `dir` for local use. Returns the image name.
///
/// Nothing is labelled, pushed or announced.
pub async fn build_local<B: Builder>(
  builder: &B,
  dir: &Path,
  branch: BranchClass,
  dev_suffix: &str,
) -> Result<String, PipelineError> {
  let name = artifact_name(dir, branch, dev_suffix).map_err(|source| PipelineError::Load {
    path: dir.to_path_buf(),
    source,
  })?;
  let build_err = |source| PipelineError::Build {
    name: name.clone(),
    source,
  };

  builder.compile(dir).await.map_err(build_err)?;
  let context = builder.package_filesystem(dir).await.map_err(build_err)?;
  let log = builder
    .build_image(context, std::slice::from_ref(&name), &Default::default())
    .await
    .map_err(build_err)?;
  debug!(log = %log, "image build log");
  info!(image = %name, "local image built");
  Ok(name)
}

/// Outcome of [`run_local`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRun {
  pub image: String,
  /// Container output.
  pub output: String,
}

/// Build `dir` locally and run the image once.
///
/// The container environment comes from the directory's `local.toml`; with
/// no such file the container gets no environment.
pub async fn run_local<B: Builder + ImageRunner>(
  builder: &B,
  dir: &Path,
  branch: BranchClass,
  dev_suffix: &str,
) -> Result<LocalRun, PipelineError> {
  let image = build_local(builder, dir, branch, dev_suffix).await?;
  let run_err = |source| PipelineError::Build {
    name: image.clone(),
    source,
  };

  let env = LocalRunConfig::load(dir)
    .map_err(run_err)?
    .map(|config| config.env())
    .unwrap_or_default();
  let output = builder.run(&image, &env).await.map_err(run_err)?;
  info!(image = %image, "local run finished");
  Ok(LocalRun { image, output })
}

/// Result of re-announcing the registry's content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepublishReport {
  pub announced: Vec<String>,
  /// Artifacts without a numeric tag or a recorded manifest.
  pub skipped: Vec<String>,
}

/// Announce the latest build of every artifact in the registry.
///
/// Every artifact is resolved before the first announcement is made.
pub async fn republish_latest<D, B, A>(
  deployed: &D,
  coordinator: &PublicationCoordinator<'_, B, A>,
  registry: &str,
  checks_repo: &str,
) -> Result<RepublishReport, PipelineError>
where
  D: DeployedStateReader,
  B: Builder,
  A: ChecktypeAnnouncer,
{
  let mut report = RepublishReport::default();
  let mut checktypes = Vec::new();

  for name in deployed.list_artifacts().await? {
    let tags = deployed.list_tags(&name).await?;
    let (tag, found) = latest_tag(&tags.tags);
    if !found {
      info!(name = %name, "skipping check without a valid tag");
      report.skipped.push(name);
      continue;
    }

    let state = deployed.tag_info(&name, &tag).await?;
    let manifest = match state.manifest {
      Some(manifest) if !manifest.description.is_empty() => manifest,
      _ => {
        warn!(name = %name, tag = %tag, "no manifest recorded for image, skipping");
        report.skipped.push(name);
        continue;
      }
    };

    let image = image_ref(registry, checks_repo, &name, &tag);
    checktypes.push(Checktype::from_manifest(&name, &image, &manifest));
  }

  for checktype in &checktypes {
    coordinator.announce(checktype).await?;
    report.announced.push(checktype.name.clone());
  }
  Ok(report)
}
