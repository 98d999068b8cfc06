//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Trait for remote resources that can be cached.
///
/// A resource has two representations: the live value handed to the UI and a
/// serialization-friendly shape used both on the wire and in storage. The
/// conversion from the stored shape may fail when the schema has drifted
/// since the value was written.
pub trait Resource: Send + Sync + 'static {
  /// In-memory value shown to consumers
  type Live: Clone + Send + Sync + 'static;

  /// Wire and storage shape
  type Stored: Serialize + DeserializeOwned + Send + 'static;

  /// Storage key namespace (e.g., "events")
  const KEY: &'static str;

  /// Endpoint path below the instance (e.g., "events")
  const ENDPOINT: &'static str;

  fn to_cache(value: &Self::Live) -> Self::Stored;

  fn from_cache(stored: Self::Stored) -> Result<Self::Live, CacheDecodeError>;
}

/// A stored value could not be turned back into its live representation.
#[derive(Debug, Error)]
pub enum CacheDecodeError {
  #[error("invalid timestamp in field {field}: {value}")]
  Timestamp { field: &'static str, value: String },

  #[error("unexpected shape: {0}")]
  Shape(#[from] serde_json::Error),
}

/// Persisted envelope for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue<S> {
  /// Instance the value belongs to
  pub instance: String,
  /// Revalidation token returned with the value
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub etag: Option<String>,
  pub value: S,
}

impl<S> StoredValue<S> {
  pub fn new(instance: impl Into<String>, etag: Option<String>, value: S) -> Self {
    Self {
      instance: instance.into(),
      etag,
      value,
    }
  }

  /// An envelope is only usable for the instance it was written for.
  pub fn is_valid_for(&self, instance: &str) -> bool {
    self.instance == instance
  }
}

/// Envelope fields without the payload, used to read the etag cheaply.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMeta {
  pub instance: String,
  #[serde(default)]
  pub etag: Option<String>,
}
