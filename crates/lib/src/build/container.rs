//! [`Builder`] that drives a container CLI (`docker`, `podman`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{BuildError, Builder, ImageRunner, tarball};
use crate::config::{CompileConfig, Config};
use crate::util::cmd::{run_command, run_shell};

#[derive(Debug, Clone)]
pub struct ContainerBuilder {
  cli: String,
  compile: CompileConfig,
}

impl ContainerBuilder {
  pub fn new(cli: impl Into<String>, compile: CompileConfig) -> Self {
    Self {
      cli: cli.into(),
      compile,
    }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(&config.container_cli, config.compile.clone())
  }

  fn spawn_err(&self) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Spawn {
      program: self.cli.clone(),
      source,
    }
  }
}

/// Arguments of `<cli> build` reading the context from stdin.
fn build_args(tags: &[String], labels: &BTreeMap<String, String>) -> Vec<String> {
  let mut args = vec!["build".to_string()];
  for tag in tags {
    args.push("-t".to_string());
    args.push(tag.clone());
  }
  for (key, value) in labels {
    args.push("--label".to_string());
    args.push(format!("{}={}", key, value));
  }
  args.push("-".to_string());
  args
}

/// Arguments of `<cli> run` for a container removed on exit.
fn run_args(image: &str, env: &BTreeMap<String, String>) -> Vec<String> {
  let mut args = vec!["run".to_string(), "--rm".to_string()];
  for (key, value) in env {
    args.push("-e".to_string());
    args.push(format!("{}={}", key, value));
  }
  args.push(image.to_string());
  args
}

impl Builder for ContainerBuilder {
  async fn compile(&self, dir: &Path) -> Result<String, BuildError> {
    info!(dir = %dir.display(), command = %self.compile.command, "compiling");
    let output = run_shell(&self.compile.command, Some(dir), &self.compile.env)
      .await
      .map_err(|source| BuildError::Spawn {
        program: self.compile.command.clone(),
        source,
      })?;

    if !output.success() {
      return Err(BuildError::Compile {
        dir: dir.to_path_buf(),
        code: output.code,
        output: output.combined(),
      });
    }
    Ok(output.combined())
  }

  async fn package_filesystem(&self, dir: &Path) -> Result<Vec<u8>, BuildError> {
    let owned: PathBuf = dir.to_path_buf();
    let packed = tokio::task::spawn_blocking(move || tarball::pack_dir(&owned))
      .await
      .map_err(std::io::Error::other)
      .and_then(|result| result);

    packed.map_err(|source| BuildError::Package {
      dir: dir.to_path_buf(),
      source,
    })
  }

  async fn build_image(
    &self,
    context: Vec<u8>,
    tags: &[String],
    labels: &BTreeMap<String, String>,
  ) -> Result<String, BuildError> {
    info!(tags = ?tags, "building image");
    let output = run_command(&self.cli, build_args(tags, labels), None, &BTreeMap::new(), Some(context))
      .await
      .map_err(self.spawn_err())?;

    let log = output.combined();
    if !output.success() {
      debug!(log = %log, "output of the failed image build");
      return Err(BuildError::Image { code: output.code, log });
    }
    Ok(log)
  }

  async fn push(&self, image_ref: &str) -> Result<String, BuildError> {
    info!(image = %image_ref, "pushing image");
    let output = run_command(&self.cli, ["push", image_ref], None, &BTreeMap::new(), None)
      .await
      .map_err(self.spawn_err())?;

    if !output.success() {
      return Err(BuildError::Push {
        image: image_ref.to_string(),
        code: output.code,
        log: output.combined(),
      });
    }
    Ok(output.combined())
  }
}

impl ImageRunner for ContainerBuilder {
  async fn run(&self, image: &str, env: &BTreeMap<String, String>) -> Result<String, BuildError> {
    info!(image = %image, vars = env.len(), "running image");
    let output = run_command(&self.cli, run_args(image, env), None, &BTreeMap::new(), None)
      .await
      .map_err(self.spawn_err())?;

    if !output.success() {
      return Err(BuildError::Run {
        image: image.to_string(),
        code: output.code,
        log: output.combined(),
      });
    }
    Ok(output.combined())
  }
}
