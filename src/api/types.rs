use chrono::{DateTime, Utc};

/// A scheduled event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub id: String,
  pub title: String,
  pub description: Option<String>,
  pub location: Option<String>,
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
  pub tags: Vec<String>,
  pub hosts: Vec<String>,
}

impl Event {
  /// Whether the event has not finished yet at `now`.
  pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
    self.end > now
  }
}

/// General information about the con
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConInfo {
  pub name: String,
  pub description: Option<String>,
  pub timezone: Option<String>,
  pub start: Option<DateTime<Utc>>,
  pub end: Option<DateTime<Utc>>,
  pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
  pub title: String,
  pub url: String,
}

/// Informational page (markdown body)
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
  pub id: String,
  pub title: String,
  pub slug: String,
  pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
  pub id: String,
  pub title: String,
  pub body: String,
  pub posted_at: DateTime<Utc>,
}
