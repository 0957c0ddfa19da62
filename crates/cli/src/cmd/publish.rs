//! Publish command implementation.
//!
//! Re-announces the latest image of every check in the registry to a single
//! persistence endpoint, e.g. to seed a new environment.

use std::path::Path;

use anyhow::{Context, Result};

use checkbuild_lib::build::ContainerBuilder;
use checkbuild_lib::config::{BranchClass, Environment, EnvironmentSet, Tier};
use checkbuild_lib::persistence::PersistenceClient;
use checkbuild_lib::pipeline::republish_latest;
use checkbuild_lib::publish::PublicationCoordinator;
use checkbuild_lib::registry::RegistryClient;

use crate::output::{print_item, print_json, print_stat, print_success};

pub fn cmd_publish(config_path: Option<&Path>, endpoint: &str, json: bool) -> Result<()> {
  let config = super::load_config(config_path)?;
  let environments = EnvironmentSet {
    primary: vec![Environment::new(endpoint, Tier::Primary, BranchClass::Master)],
    secondary: Vec::new(),
  };

  let rt = super::runtime()?;
  let report = rt.block_on(async {
    let registry = RegistryClient::from_config(&config).context("Failed to create registry client")?;
    let builder = ContainerBuilder::from_config(&config);
    let announcer = PersistenceClient::new().context("Failed to create persistence client")?;
    let coordinator = PublicationCoordinator::new(&builder, &announcer, environments);

    republish_latest(&registry, &coordinator, &config.registry, &config.checks_repo)
      .await
      .with_context(|| format!("Failed to publish to {}", endpoint))
  })?;

  if json {
    print_json(&serde_json::json!({
      "endpoint": endpoint,
      "announced": report.announced,
      "skipped": report.skipped,
    }))?;
    return Ok(());
  }

  print_success(&format!("Published {} check(s) to {}", report.announced.len(), endpoint));
  for name in &report.announced {
    print_item(name);
  }
  if !report.skipped.is_empty() {
    print_stat("Skipped", &report.skipped.join(", "));
  }
  Ok(())
}
