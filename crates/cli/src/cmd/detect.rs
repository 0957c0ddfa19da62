//! Detect command implementation.
//!
//! Writes the checks that need a build, with their next tags, to a list file.

use std::path::Path;

use anyhow::{Context, Result};

use checkbuild_lib::artifact::write_build_list;
use checkbuild_lib::detect::{ChangeDetector, DetectionMode};
use checkbuild_lib::git::GitCli;
use checkbuild_lib::registry::RegistryClient;
use checkbuild_lib::toolchain;

use crate::output::{print_info, print_item, print_json, print_success};

pub fn cmd_detect(
  config_path: Option<&Path>,
  branch: Option<&str>,
  base_dir: &Path,
  output: &Path,
  force: Option<&str>,
  json: bool,
) -> Result<()> {
  let config = super::load_config(config_path)?;
  let branch = super::resolve_branch(branch);
  let class = config.branch_class(branch.as_deref());
  let mode = DetectionMode::from_force(force);

  let rt = super::runtime()?;
  let detected = rt.block_on(async {
    let toolchain_version = toolchain::current_version(config.toolchain_version_cmd.as_deref())
      .await
      .context("Failed to read toolchain version")?;
    let source = GitCli::default();
    let registry = RegistryClient::from_config(&config).context("Failed to create registry client")?;

    let detector = ChangeDetector::new(&source, &registry, class, config.dev_suffix.as_str(), toolchain_version);
    detector
      .detect(base_dir, &mode)
      .await
      .with_context(|| format!("Failed to detect changes under {}", base_dir.display()))
  })?;

  write_build_list(output, &detected).context("Failed to write build list")?;

  if json {
    let lines: Vec<String> = detected.iter().map(ToString::to_string).collect();
    print_json(&serde_json::json!({
      "branch": branch,
      "branch_class": class.to_string(),
      "output": output.display().to_string(),
      "checks": lines,
    }))?;
    return Ok(());
  }

  if detected.is_empty() {
    print_info("No checks need a build");
    return Ok(());
  }

  print_success(&format!(
    "{} check(s) to build, written to {}",
    detected.len(),
    output.display()
  ));
  for artifact in &detected {
    print_item(&artifact.to_string());
  }
  Ok(())
}
