//! Persistence service client: announcing checktypes.
//!
//! Every published image is registered as a checktype with the persistence
//! service of each environment it is rolled out to.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::manifest::Manifest;

const CHECKTYPES_PATH: &str = "v1/checktypes";

#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("failed to create HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("error posting checktype to {url}, status: {status}: {body}")]
  Status {
    url: String,
    status: StatusCode,
    body: String,
  },

  #[error("failed to decode checktype returned by {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },
}

/// Checktype as announced to the persistence service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checktype {
  pub name: String,
  pub description: String,
  #[serde(default, skip_serializing_if = "is_zero")]
  pub timeout: u64,
  pub image: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub options: String,
  pub required_vars: Vec<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub queue_name: String,
  pub assets: Vec<String>,
}

fn is_zero(value: &u64) -> bool {
  *value == 0
}

impl Checktype {
  /// Checktype for the image `image` of the check `name`.
  pub fn from_manifest(name: &str, image: &str, manifest: &Manifest) -> Self {
    Self {
      name: name.to_string(),
      description: manifest.description.clone(),
      timeout: manifest.timeout,
      image: image.to_string(),
      options: manifest.options.clone(),
      required_vars: manifest.required_vars.clone(),
      queue_name: manifest.queue_name.clone(),
      assets: manifest.asset_type_strings(),
    }
  }
}

#[derive(Debug, Serialize)]
struct ChecktypeRequest<'a> {
  checktype: &'a Checktype,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChecktypeLinks {
  #[serde(rename = "self", default)]
  pub self_link: String,
}

/// Checktype as stored by the persistence service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PublishedChecktype {
  pub id: String,
  pub name: String,
  pub description: String,
  pub timeout: u64,
  pub enabled: bool,
  pub options: serde_json::Value,
  pub required_vars: Option<Vec<String>>,
  pub queue_name: String,
  pub image: String,
  pub links: ChecktypeLinks,
  pub assets: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChecktypeResponse {
  checktype: PublishedChecktype,
}

/// Announces checktypes to persistence services.
#[allow(async_fn_in_trait)]
pub trait ChecktypeAnnouncer {
  async fn announce(&self, endpoint: &str, checktype: &Checktype) -> Result<PublishedChecktype, PersistenceError>;
}

/// HTTP [`ChecktypeAnnouncer`].
#[derive(Debug, Clone)]
pub struct PersistenceClient {
  http: reqwest::Client,
}

impl PersistenceClient {
  pub fn new() -> Result<Self, PersistenceError> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("checkbuild/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(PersistenceError::Client)?;
    Ok(Self { http })
  }
}

impl ChecktypeAnnouncer for PersistenceClient {
  async fn announce(&self, endpoint: &str, checktype: &Checktype) -> Result<PublishedChecktype, PersistenceError> {
    let url = format!("{}/{}", endpoint.trim_end_matches('/'), CHECKTYPES_PATH);
    debug!(url = %url, name = %checktype.name, "posting checktype");

    let response = self
      .http
      .post(&url)
      .json(&ChecktypeRequest { checktype })
      .send()
      .await
      .map_err(|source| PersistenceError::Request { url: url.clone(), source })?;

    let status = response.status();
    if status != StatusCode::CREATED {
      let body = response.text().await.unwrap_or_default();
      return Err(PersistenceError::Status { url, status, body });
    }

    let created: ChecktypeResponse = response
      .json()
      .await
      .map_err(|source| PersistenceError::Decode { url, source })?;
    Ok(created.checktype)
  }
}
