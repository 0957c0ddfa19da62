//! Build command implementation.
//!
//! Builds every check in a detection list, then pushes and announces them.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use checkbuild_lib::artifact::read_build_list;
use checkbuild_lib::build::ContainerBuilder;
use checkbuild_lib::persistence::PersistenceClient;
use checkbuild_lib::pipeline::{BuildSettings, run_batch};
use checkbuild_lib::publish::PublicationCoordinator;
use checkbuild_lib::toolchain;

use crate::output::{format_duration, print_info, print_item, print_json, print_stat, print_success, print_warning};

pub fn cmd_build(config_path: Option<&Path>, branch: Option<&str>, images_file: &Path, json: bool) -> Result<()> {
  let start = Instant::now();

  let entries = read_build_list(images_file).context("Failed to read build list")?;
  if entries.is_empty() {
    if json {
      print_json(&serde_json::json!({ "built": [] }))?;
    } else {
      print_info("No checks to build");
    }
    return Ok(());
  }

  let config = super::load_config(config_path)?;
  let branch = super::resolve_branch(branch);
  let class = config.branch_class(branch.as_deref());

  let environments = config.environments.select(class);
  let addressed = environments.addressable_count();
  if addressed == 0 {
    print_warning(&format!("No {} environments configured, images will only be pushed", class));
  }

  let rt = super::runtime()?;
  let reports = rt.block_on(async {
    let toolchain_version = toolchain::current_version(config.toolchain_version_cmd.as_deref())
      .await
      .context("Failed to read toolchain version")?;
    let settings = BuildSettings::from_config(&config, class, toolchain_version);
    let builder = ContainerBuilder::from_config(&config);
    let announcer = PersistenceClient::new().context("Failed to create persistence client")?;
    let coordinator = PublicationCoordinator::new(&builder, &announcer, environments);

    run_batch(&builder, &coordinator, &settings, &entries)
      .await
      .context("Build failed")
  })?;

  if json {
    let built: Vec<_> = entries
      .iter()
      .zip(&reports)
      .map(|(entry, report)| {
        serde_json::json!({
          "path": entry.path.display().to_string(),
          "tag": entry.tag,
          "announced": report.announced,
          "failed": report.skipped_failures.iter().map(|(endpoint, _)| endpoint).collect::<Vec<_>>(),
        })
      })
      .collect();
    print_json(&serde_json::json!({ "environments": addressed, "built": built }))?;
    return Ok(());
  }

  print_success(&format!("Built and published {} check(s)", entries.len()));
  for (entry, report) in entries.iter().zip(&reports) {
    print_item(&format!("{}:{}", entry.path.display(), entry.tag));
    print_stat("Announced", &format!("{}/{}", report.announced.len(), addressed));
    for (endpoint, error) in &report.skipped_failures {
      print_warning(&format!("Not announced to {}: {}", endpoint, error));
    }
  }
  print_stat("Time", &format_duration(start.elapsed()));
  Ok(())
}
