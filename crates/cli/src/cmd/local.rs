use std::path::Path;

use anyhow::{Context, Result};

use checkbuild_lib::build::ContainerBuilder;
use checkbuild_lib::pipeline::build_local;

use crate::output::{print_json, print_success};

pub fn cmd_local(config_path: Option<&Path>, branch: Option<&str>, dir: &Path, json: bool) -> Result<()> {
  let config = super::load_config_or_default(config_path)?;
  let class = config.branch_class(super::resolve_branch(branch).as_deref());
  let builder = ContainerBuilder::from_config(&config);

  let rt = super::runtime()?;
  let image = rt
    .block_on(build_local(&builder, dir, class, &config.dev_suffix))
    .with_context(|| format!("Failed to build {}", dir.display()))?;

  if json {
    print_json(&serde_json::json!({ "image": image }))?;
  } else {
    print_success(&format!("Built image {}", image));
  }
  Ok(())
}
