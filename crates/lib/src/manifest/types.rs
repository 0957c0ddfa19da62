//! Check manifest types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The kinds of asset a check can accept as its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
  #[serde(rename = "IP")]
  Ip,
  Hostname,
  DomainName,
  #[serde(rename = "AWSAccount")]
  AwsAccount,
  #[serde(rename = "IPRange")]
  IpRange,
  DockerImage,
  WebAddress,
  GitRepository,
  #[serde(rename = "GCPProject")]
  GcpProject,
}

impl AssetType {
  /// Wire name of the asset type.
  pub fn as_str(&self) -> &'static str {
    match self {
      AssetType::Ip => "IP",
      AssetType::Hostname => "Hostname",
      AssetType::DomainName => "DomainName",
      AssetType::AwsAccount => "AWSAccount",
      AssetType::IpRange => "IPRange",
      AssetType::DockerImage => "DockerImage",
      AssetType::WebAddress => "WebAddress",
      AssetType::GitRepository => "GitRepository",
      AssetType::GcpProject => "GCPProject",
    }
  }
}

impl fmt::Display for AssetType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Static metadata bound to a check at build time.
///
/// Read from the `manifest.toml` in the check's directory, recorded as an
/// image label, and announced to the persistence service. Keys are accepted
/// in snake_case or in the legacy PascalCase form; serialization always uses
/// PascalCase so labels stay readable by older tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
  #[serde(default, alias = "description")]
  pub description: String,

  /// Execution timeout in seconds. Zero means "service default".
  #[serde(default, alias = "timeout")]
  pub timeout: u64,

  /// Default check options as raw JSON text.
  #[serde(default, alias = "options")]
  pub options: String,

  #[serde(default, alias = "required_vars", deserialize_with = "null_as_default")]
  pub required_vars: Vec<String>,

  #[serde(default, alias = "queue_name")]
  pub queue_name: String,

  #[serde(default, alias = "asset_types", deserialize_with = "null_as_default")]
  pub asset_types: Vec<AssetType>,
}

impl Manifest {
  /// Asset types as their wire strings.
  pub fn asset_type_strings(&self) -> Vec<String> {
    self.asset_types.iter().map(|a| a.as_str().to_string()).collect()
  }

  /// Encode the manifest for the image label.
  pub fn to_label(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }

  /// Decode a manifest recorded as an image label.
  pub fn from_label(label: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(label)
  }
}

// Labels written by older tooling encode empty lists as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
