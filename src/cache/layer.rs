//! Typed envelope cache on top of a record store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::RecordStore;
use super::traits::{StoredMeta, StoredValue};

/// Prefix applied to every resource key in the record store.
const KEY_PREFIX: &str = "consched:cache:";

/// Cache layer that reads and writes [`StoredValue`] envelopes.
///
/// Every failure in here is swallowed and logged: a record that cannot be
/// read or parsed is reported as absent, and a write that fails leaves the
/// caller's in-memory state untouched. Validity against the current instance
/// is judged by the caller.
pub struct ResourceCache<S: RecordStore> {
  storage: Arc<S>,
}

impl<S: RecordStore> ResourceCache<S> {
  /// Create a cache layer sharing an existing storage backend.
  pub fn from_shared(storage: Arc<S>) -> Self {
    Self { storage }
  }

  fn record_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
  }

  fn read(&self, key: &str) -> Option<String> {
    match self.storage.get_item(&Self::record_key(key)) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(resource = key, error = %e, "Failed to read cache record");
        None
      }
    }
  }

  /// Load the envelope stored for `key`.
  pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<StoredValue<V>> {
    let raw = self.read(key)?;
    match serde_json::from_str(&raw) {
      Ok(stored) => Some(stored),
      Err(e) => {
        debug!(resource = key, error = %e, "Discarding malformed cache record");
        None
      }
    }
  }

  /// Load only the instance and etag of the envelope stored for `key`.
  pub fn meta(&self, key: &str) -> Option<StoredMeta> {
    let raw = self.read(key)?;
    match serde_json::from_str(&raw) {
      Ok(meta) => Some(meta),
      Err(e) => {
        debug!(resource = key, error = %e, "Discarding malformed cache record");
        None
      }
    }
  }

  /// Store an envelope, replacing whatever was there. Returns whether the
  /// write reached the store.
  pub fn put<V: Serialize>(&self, key: &str, stored: &StoredValue<V>) -> bool {
    let raw = match serde_json::to_string(stored) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(resource = key, error = %e, "Failed to serialize cache record");
        return false;
      }
    };

    match self.storage.set_item(&Self::record_key(key), &raw) {
      Ok(()) => true,
      Err(e) => {
        warn!(resource = key, error = %e, "Failed to persist cache record");
        false
      }
    }
  }

  /// Remove the envelope stored for `key`.
  pub fn remove(&self, key: &str) {
    if let Err(e) = self.storage.remove_item(&Self::record_key(key)) {
      warn!(resource = key, error = %e, "Failed to remove cache record");
    }
  }
}

impl<S: RecordStore> Clone for ResourceCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}
