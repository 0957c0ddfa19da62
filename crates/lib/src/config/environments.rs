//! Announcement environments and their selection by branch class.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a build comes from the production branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchClass {
  /// The production branch.
  Master,
  /// Any other branch, including a detached HEAD.
  Dev,
}

impl fmt::Display for BranchClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BranchClass::Master => f.write_str("master"),
      BranchClass::Dev => f.write_str("dev"),
    }
  }
}

/// Announcement tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
  /// Every announcement must succeed.
  Primary,
  /// Best effort.
  Secondary,
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tier::Primary => f.write_str("primary"),
      Tier::Secondary => f.write_str("secondary"),
    }
  }
}

/// A persistence service that gets told about new builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  pub endpoint_url: String,
  pub tier: Tier,
  /// Which branch's environment list this one was configured in.
  pub branch_class: BranchClass,
}

impl Environment {
  pub fn new(endpoint_url: impl Into<String>, tier: Tier, branch_class: BranchClass) -> Self {
    Self {
      endpoint_url: endpoint_url.into(),
      tier,
      branch_class,
    }
  }

  /// Environments without an endpoint are placeholders and never addressed.
  pub fn is_addressable(&self) -> bool {
    !self.endpoint_url.is_empty()
  }
}

/// The four configured environment lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentsConfig {
  pub primary_master: Vec<String>,
  pub secondary_master: Vec<String>,
  pub primary_dev: Vec<String>,
  pub secondary_dev: Vec<String>,
}

/// The environments addressed for one build, split by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSet {
  pub primary: Vec<Environment>,
  pub secondary: Vec<Environment>,
}

impl EnvironmentSet {
  /// Number of environments with an endpoint, across both tiers.
  pub fn addressable_count(&self) -> usize {
    self
      .primary
      .iter()
      .chain(&self.secondary)
      .filter(|e| e.is_addressable())
      .count()
  }
}

impl EnvironmentsConfig {
  fn list(urls: &[String], tier: Tier, branch_class: BranchClass) -> impl Iterator<Item = Environment> + '_ {
    urls.iter().map(move |url| Environment::new(url.clone(), tier, branch_class))
  }

  /// Select the environments a build on `branch` is announced to.
  ///
  /// Production builds go to the master and dev lists of each tier, master
  /// first. Dev builds only go to the primary dev environments; there is no
  /// best-effort pass for them.
  pub fn select(&self, branch: BranchClass) -> EnvironmentSet {
    match branch {
      BranchClass::Master => EnvironmentSet {
        primary: Self::list(&self.primary_master, Tier::Primary, BranchClass::Master)
          .chain(Self::list(&self.primary_dev, Tier::Primary, BranchClass::Dev))
          .collect(),
        secondary: Self::list(&self.secondary_master, Tier::Secondary, BranchClass::Master)
          .chain(Self::list(&self.secondary_dev, Tier::Secondary, BranchClass::Dev))
          .collect(),
      },
      BranchClass::Dev => EnvironmentSet {
        primary: Self::list(&self.primary_dev, Tier::Primary, BranchClass::Dev).collect(),
        secondary: Vec::new(),
      },
    }
  }
}
