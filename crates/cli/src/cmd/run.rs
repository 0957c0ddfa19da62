use std::path::Path;

use anyhow::{Context, Result};

use checkbuild_lib::build::ContainerBuilder;
use checkbuild_lib::pipeline::run_local;

use crate::output::{print_json, print_success};

pub fn cmd_run(config_path: Option<&Path>, branch: Option<&str>, dir: &Path, json: bool) -> Result<()> {
  let config = super::load_config_or_default(config_path)?;
  let class = config.branch_class(super::resolve_branch(branch).as_deref());
  let builder = ContainerBuilder::from_config(&config);

  let rt = super::runtime()?;
  let run = rt
    .block_on(run_local(&builder, dir, class, &config.dev_suffix))
    .with_context(|| format!("Failed to run {}", dir.display()))?;

  if json {
    print_json(&serde_json::json!({ "image": run.image, "output": run.output }))?;
    return Ok(());
  }

  print!("{}", run.output);
  if !run.output.is_empty() && !run.output.ends_with('\n') {
    println!();
  }
  print_success(&format!("Check image {} finished", run.image));
  Ok(())
}
