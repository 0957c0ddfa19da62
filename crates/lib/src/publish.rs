//! Publication: pushing a built image and announcing it, tier by tier.
//!
//! The image is pushed once. Its checktype is then announced to every primary
//! environment, stopping at the first failure, and afterwards to every
//! secondary environment, where failures are logged and skipped.

use thiserror::Error;
use tracing::{info, warn};

use crate::build::{BuildError, Builder};
use crate::config::{Environment, EnvironmentSet};
use crate::manifest::Manifest;
use crate::persistence::{Checktype, ChecktypeAnnouncer, PersistenceError};

#[derive(Debug, Error)]
pub enum PublishError {
  #[error("failed to push '{image}': {source}")]
  Push {
    image: String,
    #[source]
    source: BuildError,
  },

  #[error("failed to announce '{name}' to {endpoint}: {source}")]
  Announce {
    name: String,
    endpoint: String,
    #[source]
    source: PersistenceError,
  },
}

/// A built image waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
  /// Checktype name.
  pub name: String,
  pub image_ref: String,
  pub manifest: Manifest,
}

/// Outcome of a publication that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
  /// Endpoints that accepted the announcement, in order.
  pub announced: Vec<String>,
  /// Secondary endpoints that rejected it, with the error.
  pub skipped_failures: Vec<(String, String)>,
}

pub struct PublicationCoordinator<'a, B, A> {
  builder: &'a B,
  announcer: &'a A,
  environments: EnvironmentSet,
}

impl<'a, B, A> PublicationCoordinator<'a, B, A>
where
  B: Builder,
  A: ChecktypeAnnouncer,
{
  pub fn new(builder: &'a B, announcer: &'a A, environments: EnvironmentSet) -> Self {
    Self {
      builder,
      announcer,
      environments,
    }
  }

  /// Push the image, then announce it.
  pub async fn publish(&self, artifact: &BuiltArtifact) -> Result<PublishReport, PublishError> {
    self
      .builder
      .push(&artifact.image_ref)
      .await
      .map_err(|source| PublishError::Push {
        image: artifact.image_ref.clone(),
        source,
      })?;
    info!(image = %artifact.image_ref, "image pushed");

    let checktype = Checktype::from_manifest(&artifact.name, &artifact.image_ref, &artifact.manifest);
    self.announce(&checktype).await
  }

  /// Announce a checktype to the primary tier, then the secondary tier.
  pub async fn announce(&self, checktype: &Checktype) -> Result<PublishReport, PublishError> {
    let mut report = PublishReport::default();

    for env in self.environments.primary.iter().filter(|e| e.is_addressable()) {
      self
        .announce_one(env, checktype)
        .await
        .map_err(|source| PublishError::Announce {
          name: checktype.name.clone(),
          endpoint: env.endpoint_url.clone(),
          source,
        })?;
      report.announced.push(env.endpoint_url.clone());
    }

    for env in self.environments.secondary.iter().filter(|e| e.is_addressable()) {
      match self.announce_one(env, checktype).await {
        Ok(()) => report.announced.push(env.endpoint_url.clone()),
        Err(e) => {
          warn!(
            name = %checktype.name,
            endpoint = %env.endpoint_url,
            error = %e,
            "failed to announce to secondary environment, continuing"
          );
          report.skipped_failures.push((env.endpoint_url.clone(), e.to_string()));
        }
      }
    }

    Ok(report)
  }

  async fn announce_one(&self, env: &Environment, checktype: &Checktype) -> Result<(), PersistenceError> {
    let stored = self.announcer.announce(&env.endpoint_url, checktype).await?;
    info!(
      name = %checktype.name,
      endpoint = %env.endpoint_url,
      tier = %env.tier,
      id = %stored.id,
      "checktype announced"
    );
    Ok(())
  }
}
