use checkbuild_lib::config::BranchClass;
use checkbuild_lib::detect::{ChangeDetector, DetectionMode};
use checkbuild_lib::manifest::Manifest;
use checkbuild_lib::pipeline::run_batch;
use checkbuild_lib::publish::PublicationCoordinator;

use super::common::*;

fn names(result: &[checkbuild_lib::artifact::DetectedArtifact]) -> Vec<(String, String)> {
  result
    .iter()
    .map(|d| (d.path.file_name().unwrap().to_string_lossy().to_string(), d.tag.clone()))
    .collect()
}

#[tokio::test]
async fn unchanged_then_changed_source() {
  let base = checks_dir(&["A"]);
  let source = Source::default();
  let registry = Registry::default();
  registry.deploy("A", "3", "abc", "v1", None);

  source.set("A", "abc");
  let detector = ChangeDetector::new(&source, &registry, BranchClass::Master, "-experimental", "v1");
  let result = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert!(result.is_empty());

  source.set("A", "def");
  let result = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert_eq!(names(&result), vec![("A".to_string(), "4".to_string())]);
  assert_eq!(result[0].commit, "def");
  assert_eq!(result[0].to_string(), format!("{}:4:def", check_path(&base, "A").display()));
}

#[tokio::test]
async fn second_detection_after_publish_is_empty() {
  let base = checks_dir(&["vulcan-a", "vulcan-b", "vulcan-c"]);
  let source = Source::default();
  source.set("vulcan-a", "a1");
  source.set("vulcan-b", "b1");
  source.set("vulcan-c", "c1");
  let registry = Registry::default();
  registry.deploy("vulcan-b", "7", "b1", "v1", None);

  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&["https://p"], &[]));
  let settings = settings(BranchClass::Master, "v1");
  let detector = ChangeDetector::new(&source, &registry, BranchClass::Master, "-experimental", "v1");

  let first = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert_eq!(
    names(&first),
    vec![("vulcan-a".to_string(), "1".to_string()), ("vulcan-c".to_string(), "1".to_string())]
  );

  run_batch(&builder, &coordinator, &settings, &first).await.unwrap();

  let second = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert!(second.is_empty(), "unexpected rebuilds: {:?}", second);
}

#[tokio::test]
async fn forced_rebuilds_get_increasing_tags() {
  let base = checks_dir(&["vulcan-a"]);
  let source = Source::default();
  source.set("vulcan-a", "a1");
  let registry = Registry::default();

  let builder = FakeBuilder::new(&registry);
  let persistence = Persistence::default();
  let coordinator = PublicationCoordinator::new(&builder, &persistence, environments(&[], &[]));
  let settings = settings(BranchClass::Master, "");
  let detector = ChangeDetector::new(&source, &registry, BranchClass::Master, "", "");

  let mut tags = Vec::new();
  for _ in 0..5 {
    let detected = detector
      .detect(base.path(), &DetectionMode::Single("vulcan-a".to_string()))
      .await
      .unwrap();
    tags.push(detected[0].tag.parse::<u64>().unwrap());
    run_batch(&builder, &coordinator, &settings, &detected).await.unwrap();
  }

  assert_eq!(tags, vec![1, 2, 3, 4, 5]);
  assert!(tags.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn toolchain_upgrade_rebuilds_everything() {
  let base = checks_dir(&["x", "y"]);
  let source = Source::default();
  source.set("x", "x1");
  source.set("y", "y1");
  let registry = Registry::default();
  registry.deploy("x", "2", "x1", "v1", None);
  registry.deploy("y", "5", "y1", "v1", None);

  let detector = ChangeDetector::new(&source, &registry, BranchClass::Master, "", "v2");
  let result = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();

  assert_eq!(
    names(&result),
    vec![("x".to_string(), "3".to_string()), ("y".to_string(), "6".to_string())]
  );
}

#[tokio::test]
async fn unlabelled_images_are_rebuilt() {
  let base = checks_dir(&["x"]);
  let source = Source::default();
  source.set("x", "x1");
  let registry = Registry::default();
  registry.deploy_unlabelled("x", "2");

  let detector = ChangeDetector::new(&source, &registry, BranchClass::Master, "", "");
  let result = detector.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert_eq!(names(&result), vec![("x".to_string(), "3".to_string())]);
}

#[tokio::test]
async fn dev_and_master_lineages_are_separate() {
  let base = checks_dir(&["x"]);
  let source = Source::default();
  source.set("x", "x1");
  let registry = Registry::default();
  registry.deploy("x", "10", "x1", "", Some(Manifest::default()));

  let master = ChangeDetector::new(&source, &registry, BranchClass::Master, "-experimental", "");
  assert!(master.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap().is_empty());

  let dev = ChangeDetector::new(&source, &registry, BranchClass::Dev, "-experimental", "");
  let result = dev.detect(base.path(), &DetectionMode::ChangedOnly).await.unwrap();
  assert_eq!(names(&result), vec![("x".to_string(), "1".to_string())]);
}
