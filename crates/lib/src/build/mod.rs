//! Building check images.
//!
//! A check is compiled in its source directory, the directory is packaged as
//! a tar stream, and the stream is handed to a container builder as the build
//! context. The resulting image carries its provenance as labels.
//!
//! # Submodules
//!
//! - [`container`] - [`Builder`] backed by a container CLI
//! - [`run`] - Local run settings of a check
//! - [`tarball`] - Deterministic build context packaging

pub mod container;
pub mod run;
pub mod tarball;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{LABEL_COMMIT, LABEL_MANIFEST, LABEL_TOOLCHAIN_VERSION};
use crate::manifest::Manifest;

pub use container::ContainerBuilder;
pub use run::LocalRunConfig;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("compile failed in '{dir}' (exit code {code:?}):\n{output}")]
  Compile {
    dir: PathBuf,
    code: Option<i32>,
    output: String,
  },

  #[error("failed to package '{dir}': {source}")]
  Package {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("image build failed (exit code {code:?}):\n{log}")]
  Image { code: Option<i32>, log: String },

  #[error("failed to push '{image}' (exit code {code:?}): {log}")]
  Push {
    image: String,
    code: Option<i32>,
    log: String,
  },

  #[error("failed to run '{image}' (exit code {code:?}):\n{log}")]
  Run {
    image: String,
    code: Option<i32>,
    log: String,
  },

  #[error("failed to read '{path}': {source}")]
  LocalConfigRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  LocalConfigParse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("failed to encode manifest label: {0}")]
  Label(#[from] serde_json::Error),
}

/// External build steps.
#[allow(async_fn_in_trait)]
pub trait Builder {
  /// Compile the sources in `dir`, returning the compiler output.
  async fn compile(&self, dir: &Path) -> Result<String, BuildError>;

  /// Package `dir` as an uncompressed tar stream.
  async fn package_filesystem(&self, dir: &Path) -> Result<Vec<u8>, BuildError>;

  /// Build an image from a tar build context, returning the build log.
  async fn build_image(
    &self,
    context: Vec<u8>,
    tags: &[String],
    labels: &BTreeMap<String, String>,
  ) -> Result<String, BuildError>;

  /// Push a built image, returning the push log.
  async fn push(&self, image_ref: &str) -> Result<String, BuildError>;
}

/// Runs a built image in a throwaway container.
#[allow(async_fn_in_trait)]
pub trait ImageRunner {
  /// Run `image` with `env`, returning the container output.
  async fn run(&self, image: &str, env: &BTreeMap<String, String>) -> Result<String, BuildError>;
}

/// Provenance labels recorded on a published image.
pub fn image_labels(
  commit: &str,
  toolchain_version: &str,
  manifest: &Manifest,
) -> Result<BTreeMap<String, String>, BuildError> {
  Ok(BTreeMap::from([
    (LABEL_COMMIT.to_string(), commit.to_string()),
    (LABEL_TOOLCHAIN_VERSION.to_string(), toolchain_version.to_string()),
    (LABEL_MANIFEST.to_string(), manifest.to_label()?),
  ]))
}
