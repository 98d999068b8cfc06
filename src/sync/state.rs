use std::fmt;

/// What consumers observe for a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult<T> {
  /// Nothing loaded yet
  Pending,
  /// Last known-good value and the etag that produced it
  Success { value: T, etag: Option<String> },
  /// Last fetch failed and there was nothing to fall back to
  Error { code: u16 },
}

/// Status tag of a [`FetchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Pending,
  Success,
  Error,
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let tag = match self {
      Status::Pending => "pending",
      Status::Success => "success",
      Status::Error => "error",
    };
    f.write_str(tag)
  }
}

impl<T> FetchResult<T> {
  pub fn status(&self) -> Status {
    match self {
      FetchResult::Pending => Status::Pending,
      FetchResult::Success { .. } => Status::Success,
      FetchResult::Error { .. } => Status::Error,
    }
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      FetchResult::Success { value, .. } => Some(value),
      _ => None,
    }
  }

  pub fn is_success(&self) -> bool {
    matches!(self, FetchResult::Success { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, FetchResult::Error { code: 404 })
  }
}

impl<T: Clone> FetchResult<T> {
  /// The success value, or `default` while pending or failed.
  pub fn unwrap_or(&self, default: T) -> T {
    self.value().cloned().unwrap_or(default)
  }
}
