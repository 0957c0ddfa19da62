//! In-memory collaborators shared by the pipeline tests.
//!
//! [`Registry`] and [`FakeBuilder`] are wired together: pushing an image
//! records it in the registry with the labels it was built with, so a
//! detection pass after a publish sees the new deployed state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use checkbuild_lib::build::{BuildError, Builder};
use checkbuild_lib::config::{BranchClass, Environment, EnvironmentSet, Tier};
use checkbuild_lib::git::{GitError, SourceStateReader};
use checkbuild_lib::manifest::Manifest;
use checkbuild_lib::persistence::{Checktype, ChecktypeAnnouncer, PersistenceError, PublishedChecktype};
use checkbuild_lib::pipeline::BuildSettings;
use checkbuild_lib::registry::{DeployedState, DeployedStateReader, RegistryError, TagList};
use reqwest::StatusCode;
use tempfile::TempDir;

pub const REGISTRY: &str = "registry.example.com";
pub const REPO: &str = "vulcan-checks";

/// Commits per check directory name.
#[derive(Default)]
pub struct Source {
  commits: Mutex<HashMap<String, String>>,
}

impl Source {
  pub fn set(&self, check: &str, commit: &str) {
    self.commits.lock().unwrap().insert(check.to_string(), commit.to_string());
  }
}

impl SourceStateReader for Source {
  async fn last_commit(&self, dir: &Path) -> Result<String, GitError> {
    let name = dir.file_name().unwrap().to_string_lossy().to_string();
    self
      .commits
      .lock()
      .unwrap()
      .get(&name)
      .cloned()
      .ok_or_else(|| GitError::NoCommits { dir: dir.to_path_buf() })
  }
}

/// Deployed images per artifact name and tag.
#[derive(Default)]
pub struct Registry {
  images: Mutex<HashMap<String, BTreeMap<String, DeployedState>>>,
}

impl Registry {
  pub fn deploy(&self, name: &str, tag: &str, commit: &str, toolchain: &str, manifest: Option<Manifest>) {
    self.images.lock().unwrap().entry(name.to_string()).or_default().insert(
      tag.to_string(),
      DeployedState {
        tag: tag.to_string(),
        commit: Some(commit.to_string()),
        toolchain_version: Some(toolchain.to_string()),
        manifest,
        last_modified: None,
      },
    );
  }

  /// Push a tag with no labels at all.
  pub fn deploy_unlabelled(&self, name: &str, tag: &str) {
    self.images.lock().unwrap().entry(name.to_string()).or_default().insert(
      tag.to_string(),
      DeployedState {
        tag: tag.to_string(),
        ..Default::default()
      },
    );
  }

  pub fn tags(&self, name: &str) -> Vec<String> {
    self
      .images
      .lock()
      .unwrap()
      .get(name)
      .map(|tags| tags.keys().cloned().collect())
      .unwrap_or_default()
  }
}

impl DeployedStateReader for Registry {
  async fn list_tags(&self, name: &str) -> Result<TagList, RegistryError> {
    Ok(TagList {
      name: format!("{}/{}", REPO, name),
      tags: self.tags(name),
    })
  }

  async fn tag_info(&self, name: &str, tag: &str) -> Result<DeployedState, RegistryError> {
    let images = self.images.lock().unwrap();
    Ok(images.get(name).and_then(|tags| tags.get(tag)).cloned().unwrap_or(DeployedState {
      tag: tag.to_string(),
      ..Default::default()
    }))
  }

  async fn list_artifacts(&self) -> Result<Vec<String>, RegistryError> {
    let mut names: Vec<String> = self.images.lock().unwrap().keys().cloned().collect();
    names.sort();
    Ok(names)
  }
}

/// Builder that "pushes" into a [`Registry`].
pub struct FakeBuilder<'a> {
  registry: &'a Registry,
  labels: Mutex<HashMap<String, BTreeMap<String, String>>>,
  events: Mutex<Vec<String>>,
  fail_compile: HashSet<String>,
}

impl<'a> FakeBuilder<'a> {
  pub fn new(registry: &'a Registry) -> Self {
    Self {
      registry,
      labels: Mutex::new(HashMap::new()),
      events: Mutex::new(Vec::new()),
      fail_compile: HashSet::new(),
    }
  }

  /// Make compilation of the named check directories fail.
  pub fn failing_compile(mut self, checks: &[&str]) -> Self {
    self.fail_compile = checks.iter().map(|c| c.to_string()).collect();
    self
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }

  pub fn pushes(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| e.strip_prefix("push ").map(str::to_string))
      .collect()
  }
}

impl Builder for FakeBuilder<'_> {
  async fn compile(&self, dir: &Path) -> Result<String, BuildError> {
    let name = dir.file_name().unwrap().to_string_lossy().to_string();
    self.events.lock().unwrap().push(format!("compile {}", name));
    if self.fail_compile.contains(&name) {
      return Err(BuildError::Compile {
        dir: dir.to_path_buf(),
        code: Some(2),
        output: "syntax error".to_string(),
      });
    }
    Ok(String::new())
  }

  async fn package_filesystem(&self, _dir: &Path) -> Result<Vec<u8>, BuildError> {
    Ok(Vec::new())
  }

  async fn build_image(
    &self,
    _context: Vec<u8>,
    tags: &[String],
    labels: &BTreeMap<String, String>,
  ) -> Result<String, BuildError> {
    for tag in tags {
      self.events.lock().unwrap().push(format!("image {}", tag));
      self.labels.lock().unwrap().insert(tag.clone(), labels.clone());
    }
    Ok(String::new())
  }

  async fn push(&self, image_ref: &str) -> Result<String, BuildError> {
    self.events.lock().unwrap().push(format!("push {}", image_ref));

    let labels = self.labels.lock().unwrap().get(image_ref).cloned().unwrap_or_default();
    let (path, tag) = image_ref.rsplit_once(':').unwrap();
    let name = path.rsplit('/').next().unwrap();
    self.registry.deploy(
      name,
      tag,
      &labels["commit"],
      &labels["sdk-version"],
      Some(Manifest::from_label(&labels["manifest"]).unwrap()),
    );
    Ok(String::new())
  }
}

/// Persistence services by endpoint.
#[derive(Default)]
pub struct Persistence {
  calls: Mutex<Vec<(String, Checktype)>>,
  failing: HashSet<String>,
}

impl Persistence {
  pub fn failing(endpoints: &[&str]) -> Self {
    Self {
      failing: endpoints.iter().map(|e| e.to_string()).collect(),
      ..Default::default()
    }
  }

  pub fn endpoints_called(&self) -> Vec<String> {
    self.calls.lock().unwrap().iter().map(|(e, _)| e.clone()).collect()
  }

  pub fn checktypes(&self) -> Vec<Checktype> {
    self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
  }
}

impl ChecktypeAnnouncer for Persistence {
  async fn announce(&self, endpoint: &str, checktype: &Checktype) -> Result<PublishedChecktype, PersistenceError> {
    self
      .calls
      .lock()
      .unwrap()
      .push((endpoint.to_string(), checktype.clone()));
    if self.failing.contains(endpoint) {
      return Err(PersistenceError::Status {
        url: format!("{}/v1/checktypes", endpoint),
        status: StatusCode::BAD_GATEWAY,
        body: String::new(),
      });
    }
    Ok(PublishedChecktype {
      id: format!("{}-id", checktype.name),
      name: checktype.name.clone(),
      image: checktype.image.clone(),
      enabled: true,
      ..Default::default()
    })
  }
}

/// A directory of checks, each with a valid manifest.
pub fn checks_dir(names: &[&str]) -> TempDir {
  let temp = TempDir::new().unwrap();
  for name in names {
    let dir = temp.path().join(name);
    fs::create_dir(&dir).unwrap();
    fs::write(
      dir.join("manifest.toml"),
      format!(
        "description = \"Check {}\"\ntimeout = 60\nasset_types = [\"Hostname\"]\n",
        name
      ),
    )
    .unwrap();
  }
  temp
}

pub fn check_path(base: &TempDir, name: &str) -> PathBuf {
  base.path().join(name)
}

pub fn settings(branch: BranchClass, toolchain: &str) -> BuildSettings {
  BuildSettings {
    branch,
    dev_suffix: "-experimental".to_string(),
    manifest_file: "manifest.toml".to_string(),
    registry: REGISTRY.to_string(),
    checks_repo: REPO.to_string(),
    toolchain_version: toolchain.to_string(),
  }
}

pub fn environments(primary: &[&str], secondary: &[&str]) -> EnvironmentSet {
  EnvironmentSet {
    primary: primary
      .iter()
      .map(|url| Environment::new(*url, Tier::Primary, BranchClass::Master))
      .collect(),
    secondary: secondary
      .iter()
      .map(|url| Environment::new(*url, Tier::Secondary, BranchClass::Master))
      .collect(),
  }
}
