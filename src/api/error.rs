use thiserror::Error;

/// Code reported for failures that never produced an HTTP status
/// (connection errors, unreadable bodies).
pub const TRANSPORT_ERROR_CODE: u16 = 0;

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("Resource not found")]
  NotFound,

  #[error("Unexpected status: {0}")]
  Status(u16),

  #[error("Network error: {0}")]
  NetworkError(#[from] reqwest::Error),

  #[error("Invalid request URL: {0}")]
  InvalidUrl(String),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),
}

impl ApiError {
  pub fn from_status(status: reqwest::StatusCode) -> Self {
    match status.as_u16() {
      404 => ApiError::NotFound,
      code => ApiError::Status(code),
    }
  }

  /// Numeric code exposed to consumers through `FetchResult::Error`.
  pub fn code(&self) -> u16 {
    match self {
      ApiError::NotFound => 404,
      ApiError::Status(code) => *code,
      ApiError::NetworkError(e) => e
        .status()
        .map(|s| s.as_u16())
        .unwrap_or(TRANSPORT_ERROR_CODE),
      ApiError::InvalidUrl(_) | ApiError::InvalidResponse(_) => TRANSPORT_ERROR_CODE,
    }
  }
}
