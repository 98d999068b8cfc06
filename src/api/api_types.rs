//! Serde types matching API responses.
//!
//! These are also the shapes persisted in the cache: timestamps stay as
//! RFC 3339 strings and are only parsed when converting to domain types.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every endpoint response.
#[derive(Debug, Deserialize)]
pub struct WireEnvelope {
  pub value: serde_json::Value,
  /// Server signals the payload is already outdated and should be re-checked
  #[serde(default)]
  pub stale: bool,
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
  pub id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  pub start_time: String,
  pub end_time: String,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub hosts: Vec<String>,
}

// ============================================================================
// Con information
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConInfo {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timezone: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_date: Option<String>,
  #[serde(default)]
  pub links: Vec<ApiLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLink {
  pub title: String,
  pub url: String,
}

// ============================================================================
// Pages and announcements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPage {
  pub id: String,
  pub title: String,
  pub slug: String,
  #[serde(default)]
  pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAnnouncement {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub body: String,
  pub posted_at: String,
}
