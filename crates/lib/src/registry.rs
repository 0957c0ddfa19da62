//! Deployed state: what the artifact registry knows about published builds.
//!
//! Two APIs are used. The registry API lists repositories and tags; the
//! extended API exposes an image's labels as `docker.label.<key>` properties,
//! which is where a build's provenance (commit, toolchain version, manifest)
//! is recorded.
//!
//! A 404 for a name or tag means "nothing deployed" and is returned as an
//! empty value. Any other non-success status is an error.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::LAST_MODIFIED;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::consts::{LABEL_COMMIT, LABEL_MANIFEST, LABEL_TOOLCHAIN_VERSION, REGISTRY_LABEL_PREFIX};
use crate::manifest::Manifest;

/// Errors that can occur while querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("failed to create HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("error returned by query {url}, status: {status}")]
  Status { url: String, status: StatusCode },

  #[error("failed to decode response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("invalid Last-Modified header from {url}: {value:?}")]
  InvalidLastModified { url: String, value: String },

  #[error("invalid manifest label on {name}:{tag}: {source}")]
  ManifestLabel {
    name: String,
    tag: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Tags published for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList {
  /// Repository-qualified name, e.g. `vulcan-checks/vulcan-nessus`.
  pub name: String,
  pub tags: Vec<String>,
}

/// Provenance recorded when a tag was built. Absent labels are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployedState {
  pub tag: String,
  pub commit: Option<String>,
  pub toolchain_version: Option<String>,
  pub manifest: Option<Manifest>,
  pub last_modified: Option<DateTime<Utc>>,
}

/// Read access to published artifacts.
#[allow(async_fn_in_trait)]
pub trait DeployedStateReader {
  /// Tags published under `name`. Unknown names yield an empty list.
  async fn list_tags(&self, name: &str) -> Result<TagList, RegistryError>;

  /// Provenance of `name:tag`. Unknown tags yield a state with no labels.
  async fn tag_info(&self, name: &str, tag: &str) -> Result<DeployedState, RegistryError>;

  /// Names of every artifact in the checks namespace.
  async fn list_artifacts(&self) -> Result<Vec<String>, RegistryError>;
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
  name: String,
  tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
  repositories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PropertiesResponse {
  #[serde(default, alias = "Properties")]
  properties: HashMap<String, Vec<String>>,
}

impl PropertiesResponse {
  /// First value of a label; only the first one is meaningful.
  fn label(&self, key: &str) -> Option<&str> {
    self
      .properties
      .get(&format!("{}{}", REGISTRY_LABEL_PREFIX, key))
      .and_then(|values| values.first())
      .map(String::as_str)
  }
}

/// HTTP client for the artifact registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
  http: reqwest::Client,
  api_url: String,
  extended_api_url: String,
  repo: String,
  credentials: Option<(String, String)>,
}

impl RegistryClient {
  pub fn new(
    api_url: &str,
    extended_api_url: &str,
    repo: &str,
    credentials: Option<(String, String)>,
  ) -> Result<Self, RegistryError> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("checkbuild/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(RegistryError::Client)?;

    Ok(Self {
      http,
      api_url: api_url.trim_end_matches('/').to_string(),
      extended_api_url: extended_api_url.trim_end_matches('/').to_string(),
      repo: repo.to_string(),
      credentials,
    })
  }

  pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
    Self::new(
      &config.registry_api_url,
      &config.registry_extended_api_url,
      &config.checks_repo,
      config
        .registry_credentials()
        .map(|(user, password)| (user.to_string(), password.to_string())),
    )
  }

  async fn get(&self, url: &str) -> Result<reqwest::Response, RegistryError> {
    debug!(url, "registry request");
    let mut request = self.http.get(url);
    if let Some((user, password)) = &self.credentials {
      request = request.basic_auth(user, Some(password));
    }
    request.send().await.map_err(|source| RegistryError::Request {
      url: url.to_string(),
      source,
    })
  }

  async fn decode<T: serde::de::DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, RegistryError> {
    response.json::<T>().await.map_err(|source| RegistryError::Decode {
      url: url.to_string(),
      source,
    })
  }
}

impl DeployedStateReader for RegistryClient {
  async fn list_tags(&self, name: &str) -> Result<TagList, RegistryError> {
    let url = format!("{}/{}/{}/tags/list", self.api_url, self.repo, name);
    let response = self.get(&url).await?;

    match response.status() {
      StatusCode::OK => {
        let body: TagsResponse = Self::decode(&url, response).await?;
        Ok(TagList {
          name: body.name,
          tags: body.tags.unwrap_or_default(),
        })
      }
      StatusCode::NOT_FOUND => Ok(TagList {
        name: format!("{}/{}", self.repo, name),
        tags: Vec::new(),
      }),
      status => Err(RegistryError::Status { url, status }),
    }
  }

  async fn tag_info(&self, name: &str, tag: &str) -> Result<DeployedState, RegistryError> {
    let url = format!(
      "{}/{}/{}/{}/manifest.json?properties",
      self.extended_api_url, self.repo, name, tag
    );
    let response = self.get(&url).await?;

    match response.status() {
      StatusCode::OK => {}
      StatusCode::NOT_FOUND => {
        return Ok(DeployedState {
          tag: tag.to_string(),
          ..Default::default()
        });
      }
      status => return Err(RegistryError::Status { url, status }),
    }

    let last_modified = match response.headers().get(LAST_MODIFIED) {
      None => None,
      Some(value) => {
        let text = value.to_str().unwrap_or_default();
        let parsed = DateTime::parse_from_rfc2822(text).map_err(|_| RegistryError::InvalidLastModified {
          url: url.clone(),
          value: text.to_string(),
        })?;
        Some(parsed.with_timezone(&Utc))
      }
    };

    let body: PropertiesResponse = Self::decode(&url, response).await?;

    let commit = body.label(LABEL_COMMIT).map(str::to_string);
    if commit.is_none() {
      debug!(name, tag, "image has no commit label");
    }
    let toolchain_version = body.label(LABEL_TOOLCHAIN_VERSION).map(str::to_string);
    if toolchain_version.is_none() {
      debug!(name, tag, "image has no toolchain version label");
    }
    let manifest = match body.label(LABEL_MANIFEST) {
      Some(raw) => Some(Manifest::from_label(raw).map_err(|source| RegistryError::ManifestLabel {
        name: name.to_string(),
        tag: tag.to_string(),
        source,
      })?),
      None => {
        debug!(name, tag, "image has no manifest label");
        None
      }
    };

    Ok(DeployedState {
      tag: tag.to_string(),
      commit,
      toolchain_version,
      manifest,
      last_modified,
    })
  }

  async fn list_artifacts(&self) -> Result<Vec<String>, RegistryError> {
    let url = format!("{}/_catalog", self.api_url);
    let response = self.get(&url).await?;

    let repositories = match response.status() {
      StatusCode::OK => {
        let body: CatalogResponse = Self::decode(&url, response).await?;
        body.repositories.unwrap_or_default()
      }
      StatusCode::NOT_FOUND => {
        warn!(url = %url, "registry catalog not found");
        Vec::new()
      }
      status => return Err(RegistryError::Status { url, status }),
    };

    // The catalog covers every namespace; keep ours.
    let prefix = format!("{}/", self.repo);
    Ok(
      repositories
        .iter()
        .filter_map(|repo| repo.strip_prefix(&prefix))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .map(str::to_string)
        .collect(),
    )
  }
}
