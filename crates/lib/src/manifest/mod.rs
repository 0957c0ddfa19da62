//! Check manifests.
//!
//! Every check directory carries a `manifest.toml` describing the check to
//! the persistence service. It is validated when read: `description` is
//! mandatory and `options`, when given, must be a JSON object.

mod types;

pub use types::*;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur when reading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("manifest '{path}': description field is mandatory")]
  MissingDescription { path: PathBuf },

  #[error("manifest '{path}': options field is not a valid JSON object: {source}")]
  InvalidOptions {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Read and validate a manifest file.
pub fn read_manifest(path: &Path) -> Result<Manifest, ManifestError> {
  let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  parse_manifest(&content, path)
}

/// Parse and validate manifest content. `path` is only used for error context.
pub fn parse_manifest(content: &str, path: &Path) -> Result<Manifest, ManifestError> {
  let parse_err = |source| ManifestError::Parse {
    path: path.to_path_buf(),
    source,
  };

  let table: toml::Table = toml::from_str(content).map_err(parse_err)?;
  let has_key = |snake: &str, pascal: &str| table.contains_key(snake) || table.contains_key(pascal);

  if !has_key("description", "Description") {
    return Err(ManifestError::MissingDescription {
      path: path.to_path_buf(),
    });
  }
  let has_options = has_key("options", "Options");

  let manifest: Manifest = toml::Value::Table(table).try_into().map_err(parse_err)?;

  if has_options {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&manifest.options).map_err(|source| {
      ManifestError::InvalidOptions {
        path: path.to_path_buf(),
        source,
      }
    })?;
  }

  Ok(manifest)
}
