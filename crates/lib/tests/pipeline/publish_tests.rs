use checkbuild_lib::artifact::DetectedArtifact;
use checkbuild_lib::config::{BranchClass, EnvironmentsConfig};
use checkbuild_lib::manifest::{AssetType, Manifest};
use checkbuild_lib::pipeline::{PipelineError, build_batch, republish_latest, run_batch};
use checkbuild_lib::publish::{PublicationCoordinator, PublishError};

use super::common::*;

fn detected(base: &tempfile::TempDir, names: &[(&str, &str)]) -> Vec<DetectedArtifact> {
  names
    .iter()
    .map(|(name, tag)| DetectedArtifact {
      path: check_path(base, name),
      tag: tag.to_string(),
      commit: format!("{}-commit", name),
    })
    .collect()
}

#[tokio::test]
async fn first_primary_failure_stops_all_announcements() {
  let base = checks_dir(&["a"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::failing(&["https://p1"]);
  let coordinator = PublicationCoordinator::new(
    &builder,
    &persistence,
    environments(&["https://p1", "https://p2"], &["https://s1", "https://s2"]),
  );

  let result = run_batch(
    &builder,
    &coordinator,
    &settings(BranchClass::Master, ""),
    &detected(&base, &[("a", "1")]),
  )
  .await;

  match result {
    Err(PipelineError::Publish(PublishError::Announce { endpoint, .. })) => assert_eq!(endpoint, "https://p1"),
    other => panic!("unexpected result: {:?}", other),
  }
  assert_eq!(persistence.endpoints_called(), vec!["https://p1"]);
  assert_eq!(builder.pushes().len(), 1);
}

#[tokio::test]
async fn secondary_failure_does_not_fail_the_publish() {
  let base = checks_dir(&["a"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::failing(&["https://s1"]);
  let coordinator = PublicationCoordinator::new(
    &builder,
    &persistence,
    environments(&["https://p1", "https://p2"], &["https://s1", "https://s2"]),
  );

  let reports = run_batch(
    &builder,
    &coordinator,
    &settings(BranchClass::Master, ""),
    &detected(&base, &[("a", "1")]),
  )
  .await
  .unwrap();

  assert_eq!(
    persistence.endpoints_called(),
    vec!["https://p1", "https://p2", "https://s1", "https://s2"]
  );
  assert_eq!(reports[0].announced, vec!["https://p1", "https://p2", "https://s2"]);
  assert_eq!(reports[0].skipped_failures[0].0, "https://s1");
}

#[tokio::test]
async fn build_failure_pushes_nothing() {
  let base = checks_dir(&["a", "b", "c"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry).failing_compile(&["b"]);
  let persistence = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://p1"], &[]));

  let result = run_batch(
    &builder,
    &coordinator,
    &settings(BranchClass::Master, ""),
    &detected(&base, &[("a", "1"), ("b", "1"), ("c", "1")]),
  )
  .await;

  match result {
    Err(PipelineError::Build { name, .. }) => assert_eq!(name, "b"),
    other => panic!("unexpected result: {:?}", other),
  }
  assert_eq!(
    builder.events(),
    vec![
      "compile a",
      "image registry.example.com/vulcan-checks/a:1",
      "compile b",
    ]
  );
  assert!(builder.pushes().is_empty());
  assert!(persistence.endpoints_called().is_empty());
  assert!(registry.tags("a").is_empty());
}

#[tokio::test]
async fn primary_failure_stops_later_artifacts() {
  let base = checks_dir(&["a", "b"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::failing(&["https://p1"]);
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://p1"], &[]));

  let result = run_batch(
    &builder,
    &coordinator,
    &settings(BranchClass::Master, ""),
    &detected(&base, &[("a", "1"), ("b", "1")]),
  )
  .await;

  assert!(result.is_err());
  assert_eq!(builder.pushes(), vec!["registry.example.com/vulcan-checks/a:1"]);
  // Both were built before anything was published.
  assert!(builder.events().contains(&"image registry.example.com/vulcan-checks/b:1".to_string()));
}

#[tokio::test]
async fn announcement_carries_manifest() {
  let base = checks_dir(&["vulcan-x"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://p1"], &[]));

  run_batch(
    &builder,
    &coordinator,
    &settings(BranchClass::Dev, ""),
    &detected(&base, &[("vulcan-x", "2")]),
  )
  .await
  .unwrap();

  let checktype = &persistence.checktypes()[0];
  assert_eq!(checktype.name, "vulcan-x-experimental");
  assert_eq!(checktype.image, "registry.example.com/vulcan-checks/vulcan-x-experimental:2");
  assert_eq!(checktype.description, "Check vulcan-x");
  assert_eq!(checktype.timeout, 60);
  assert_eq!(checktype.assets, vec!["Hostname"]);
}

#[tokio::test]
async fn branch_selection_feeds_the_coordinator() {
  let config = EnvironmentsConfig {
    primary_master: vec!["https://pm".to_string()],
    secondary_master: vec!["https://sm".to_string()],
    primary_dev: vec!["https://pd".to_string(), String::new()],
    secondary_dev: vec!["https://sd".to_string()],
  };
  let base = checks_dir(&["a"]);
  let registry = Registry::default();
  let builder = FakeBuilder::new(&registry);

  let master = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &master, config.select(BranchClass::Master));
  let built = build_batch(&builder, &settings(BranchClass::Master, ""), &detected(&base, &[("a", "1")]))
    .await
    .unwrap();
  coordinator.publish(&built[0]).await.unwrap();
  assert_eq!(
    master.endpoints_called(),
    vec!["https://pm", "https://pd", "https://sm", "https://sd"]
  );

  let dev = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &dev, config.select(BranchClass::Dev));
  coordinator.publish(&built[0]).await.unwrap();
  assert_eq!(dev.endpoints_called(), vec!["https://pd"]);
}

#[tokio::test]
async fn republish_announces_latest_tags() {
  let registry = Registry::default();
  let manifest = Manifest {
    description: "Scans".to_string(),
    asset_types: vec![AssetType::Ip],
    ..Default::default()
  };
  registry.deploy("vulcan-a", "2", "c", "", Some(manifest.clone()));
  registry.deploy("vulcan-a", "10", "c", "", Some(manifest.clone()));
  registry.deploy("vulcan-b", "latest", "c", "", Some(manifest.clone()));
  registry.deploy("vulcan-c", "1", "c", "", None);

  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://only"], &[]));

  let report = republish_latest(&registry, &coordinator, REGISTRY, REPO).await.unwrap();

  assert_eq!(report.announced, vec!["vulcan-a"]);
  assert_eq!(report.skipped, vec!["vulcan-b", "vulcan-c"]);
  let checktypes = persistence.checktypes();
  assert_eq!(checktypes.len(), 1);
  assert_eq!(checktypes[0].image, "registry.example.com/vulcan-checks/vulcan-a:10");
  assert_eq!(checktypes[0].assets, vec!["IP"]);
  assert!(builder.pushes().is_empty());
}

#[tokio::test]
async fn republish_stops_at_first_failure() {
  let registry = Registry::default();
  let manifest = Manifest {
    description: "d".to_string(),
    ..Default::default()
  };
  registry.deploy("a", "1", "c", "", Some(manifest.clone()));
  registry.deploy("b", "1", "c", "", Some(manifest));

  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::failing(&["https://only"]);
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://only"], &[]));

  let result = republish_latest(&registry, &coordinator, REGISTRY, REPO).await;
  assert!(matches!(result, Err(PipelineError::Publish(_))));
  assert_eq!(persistence.endpoints_called().len(), 1);
}
