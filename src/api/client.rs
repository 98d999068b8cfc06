use std::future::Future;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;

use super::api_types::WireEnvelope;
use super::error::ApiError;

/// Classified result of a conditional request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
  /// 2xx with a body
  Success {
    value: T,
    etag: Option<String>,
    /// Server believes the payload may already be outdated
    stale: bool,
  },
  /// 304, reuse the cached value
  NotModified,
  /// Any other status, or a transport failure
  Error { code: u16 },
}

/// Something that can fetch a resource of an instance, optionally
/// conditional on a previously seen etag.
pub trait Fetcher: Send + Sync + 'static {
  fn fetch(
    &self,
    endpoint: &str,
    instance: &str,
    etag: Option<&str>,
  ) -> impl Future<Output = FetchOutcome<serde_json::Value>> + Send;
}

/// API client for the con backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("API base URL cannot have paths: {}", config.base_url));
    }

    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  /// Build `{base}/{instance}/{endpoint}`, escaping the instance segment.
  fn endpoint_url(&self, instance: &str, endpoint: &str) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
      .pop_if_empty()
      .push(instance)
      .push(endpoint);
    Ok(url)
  }

  /// Issue a GET, attaching `If-None-Match` when an etag is known.
  pub async fn get_conditional(
    &self,
    endpoint: &str,
    instance: &str,
    etag: Option<&str>,
  ) -> Result<FetchOutcome<serde_json::Value>, ApiError> {
    let url = self.endpoint_url(instance, endpoint)?;

    let mut request = self
      .client
      .get(url)
      .header(header::ACCEPT, "application/json");
    if let Some(etag) = etag {
      request = request.header(header::IF_NONE_MATCH, etag);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_MODIFIED {
      return Ok(FetchOutcome::NotModified);
    }
    if !status.is_success() {
      return Err(ApiError::from_status(status));
    }

    let new_etag = response
      .headers()
      .get(header::ETAG)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let body = response.bytes().await?;
    let envelope: WireEnvelope = serde_json::from_slice(&body)
      .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", endpoint, e)))?;

    Ok(FetchOutcome::Success {
      value: envelope.value,
      etag: new_etag,
      stale: envelope.stale,
    })
  }
}

impl Fetcher for ApiClient {
  async fn fetch(
    &self,
    endpoint: &str,
    instance: &str,
    etag: Option<&str>,
  ) -> FetchOutcome<serde_json::Value> {
    match self.get_conditional(endpoint, instance, etag).await {
      Ok(outcome) => outcome,
      Err(e) => {
        debug!(endpoint, instance, error = %e, "Fetch failed");
        FetchOutcome::Error { code: e.code() }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// Helper function to start a mock server and create a client pointing to it
  async fn setup_test_client() -> (MockServer, ApiClient) {
    let mock_server = MockServer::start().await;
    let client = ApiClient::new(&ApiConfig {
      base_url: mock_server.uri(),
      timeout_secs: 5,
    })
    .unwrap();
    (mock_server, client)
  }

  #[tokio::test]
  async fn test_full_fetch_without_etag() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
      .and(path("/con-a/events"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("ETag", "\"v1\"")
          .set_body_json(json!({ "value": [1, 2] })),
      )
      .mount(&mock_server)
      .await;

    let outcome = client.fetch("events", "con-a", None).await;
    assert_eq!(
      outcome,
      FetchOutcome::Success {
        value: json!([1, 2]),
        etag: Some("\"v1\"".to_string()),
        stale: false,
      }
    );

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("if-none-match").is_none());
  }

  #[tokio::test]
  async fn test_conditional_fetch_not_modified() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
      .and(path("/con-a/info"))
      .and(header("If-None-Match", "\"v1\""))
      .respond_with(ResponseTemplate::new(304))
      .mount(&mock_server)
      .await;

    let outcome = client.fetch("info", "con-a", Some("\"v1\"")).await;
    assert_eq!(outcome, FetchOutcome::NotModified);
  }

  #[tokio::test]
  async fn test_stale_flag_is_reported() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
      .and(path("/con-a/pages"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "value": [], "stale": true })),
      )
      .mount(&mock_server)
      .await;

    match client.fetch("pages", "con-a", None).await {
      FetchOutcome::Success { etag, stale, .. } => {
        assert!(stale);
        assert_eq!(etag, None);
      }
      other => panic!("Expected success, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_error_statuses_keep_code() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
      .and(path("/missing/events"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&mock_server)
      .await;
    Mock::given(method("GET"))
      .and(path("/broken/events"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&mock_server)
      .await;

    assert_eq!(
      client.fetch("events", "missing", None).await,
      FetchOutcome::Error { code: 404 }
    );
    assert_eq!(
      client.fetch("events", "broken", None).await,
      FetchOutcome::Error { code: 503 }
    );
  }

  #[tokio::test]
  async fn test_body_without_envelope_is_error() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
      .and(path("/con-a/events"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
      .mount(&mock_server)
      .await;

    assert_eq!(
      client.fetch("events", "con-a", None).await,
      FetchOutcome::Error { code: 0 }
    );
  }

  #[tokio::test]
  async fn test_unreachable_server_is_transport_error() {
    let client = ApiClient::new(&ApiConfig {
      base_url: "http://127.0.0.1:1".to_string(),
      timeout_secs: 1,
    })
    .unwrap();

    assert_eq!(
      client.fetch("events", "con-a", None).await,
      FetchOutcome::Error { code: 0 }
    );
  }

  #[test]
  fn test_instance_segment_is_escaped() {
    let client = ApiClient::new(&ApiConfig {
      base_url: "https://api.example.org/v1/".to_string(),
      timeout_secs: 5,
    })
    .unwrap();

    let url = client.endpoint_url("con a/2026", "events").unwrap();
    assert_eq!(url.as_str(), "https://api.example.org/v1/con%20a%2F2026/events");
  }

  #[test]
  fn test_rejects_non_base_url() {
    let result = ApiClient::new(&ApiConfig {
      base_url: "mailto:events@example.org".to_string(),
      timeout_secs: 5,
    });
    assert!(result.is_err());
  }
}
