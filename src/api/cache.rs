//! Caching implementations for con resources.

use chrono::{DateTime, Utc};

use crate::cache::{CacheDecodeError, Resource};

use super::api_types::{ApiAnnouncement, ApiConInfo, ApiEvent, ApiLink, ApiPage};
use super::types::{Announcement, ConInfo, Event, Link, Page};

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, CacheDecodeError> {
  DateTime::parse_from_rfc3339(value)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|_| CacheDecodeError::Timestamp {
      field,
      value: value.to_string(),
    })
}

fn parse_optional(
  field: &'static str,
  value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, CacheDecodeError> {
  value.map(|v| parse_timestamp(field, v)).transpose()
}

// ============================================================================
// Resource markers
// ============================================================================

/// The event schedule
pub struct Events;

/// Con name, dates and links
pub struct Info;

/// Informational pages
pub struct Pages;

pub struct Announcements;

impl Resource for Events {
  type Live = Vec<Event>;
  type Stored = Vec<ApiEvent>;

  const KEY: &'static str = "events";
  const ENDPOINT: &'static str = "events";

  fn to_cache(value: &Self::Live) -> Self::Stored {
    value
      .iter()
      .map(|e| ApiEvent {
        id: e.id.clone(),
        title: e.title.clone(),
        description: e.description.clone(),
        location: e.location.clone(),
        start_time: e.start.to_rfc3339(),
        end_time: e.end.to_rfc3339(),
        tags: e.tags.clone(),
        hosts: e.hosts.clone(),
      })
      .collect()
  }

  fn from_cache(stored: Self::Stored) -> Result<Self::Live, CacheDecodeError> {
    stored
      .into_iter()
      .map(|e| {
        Ok(Event {
          start: parse_timestamp("startTime", &e.start_time)?,
          end: parse_timestamp("endTime", &e.end_time)?,
          id: e.id,
          title: e.title,
          description: e.description,
          location: e.location,
          tags: e.tags,
          hosts: e.hosts,
        })
      })
      .collect()
  }
}

impl Resource for Info {
  type Live = ConInfo;
  type Stored = ApiConInfo;

  const KEY: &'static str = "info";
  const ENDPOINT: &'static str = "info";

  fn to_cache(value: &Self::Live) -> Self::Stored {
    ApiConInfo {
      name: value.name.clone(),
      description: value.description.clone(),
      timezone: value.timezone.clone(),
      start_date: value.start.map(|d| d.to_rfc3339()),
      end_date: value.end.map(|d| d.to_rfc3339()),
      links: value
        .links
        .iter()
        .map(|l| ApiLink {
          title: l.title.clone(),
          url: l.url.clone(),
        })
        .collect(),
    }
  }

  fn from_cache(stored: Self::Stored) -> Result<Self::Live, CacheDecodeError> {
    Ok(ConInfo {
      start: parse_optional("startDate", stored.start_date.as_deref())?,
      end: parse_optional("endDate", stored.end_date.as_deref())?,
      name: stored.name,
      description: stored.description,
      timezone: stored.timezone,
      links: stored
        .links
        .into_iter()
        .map(|l| Link {
          title: l.title,
          url: l.url,
        })
        .collect(),
    })
  }
}

impl Resource for Pages {
  type Live = Vec<Page>;
  type Stored = Vec<ApiPage>;

  const KEY: &'static str = "pages";
  const ENDPOINT: &'static str = "pages";

  fn to_cache(value: &Self::Live) -> Self::Stored {
    value
      .iter()
      .map(|p| ApiPage {
        id: p.id.clone(),
        title: p.title.clone(),
        slug: p.slug.clone(),
        body: p.body.clone(),
      })
      .collect()
  }

  fn from_cache(stored: Self::Stored) -> Result<Self::Live, CacheDecodeError> {
    Ok(
      stored
        .into_iter()
        .map(|p| Page {
          id: p.id,
          title: p.title,
          slug: p.slug,
          body: p.body,
        })
        .collect(),
    )
  }
}

impl Resource for Announcements {
  type Live = Vec<Announcement>;
  type Stored = Vec<ApiAnnouncement>;

  const KEY: &'static str = "announcements";
  const ENDPOINT: &'static str = "announcements";

  fn to_cache(value: &Self::Live) -> Self::Stored {
    value
      .iter()
      .map(|a| ApiAnnouncement {
        id: a.id.clone(),
        title: a.title.clone(),
        body: a.body.clone(),
        posted_at: a.posted_at.to_rfc3339(),
      })
      .collect()
  }

  fn from_cache(stored: Self::Stored) -> Result<Self::Live, CacheDecodeError> {
    stored
      .into_iter()
      .map(|a| {
        Ok(Announcement {
          posted_at: parse_timestamp("postedAt", &a.posted_at)?,
          id: a.id,
          title: a.title,
          body: a.body,
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn api_event(start: &str) -> ApiEvent {
    ApiEvent {
      id: "e1".to_string(),
      title: "Opening".to_string(),
      description: None,
      location: Some("Main Hall".to_string()),
      start_time: start.to_string(),
      end_time: "2026-07-01T11:00:00Z".to_string(),
      tags: vec!["panel".to_string()],
      hosts: vec![],
    }
  }

  #[test]
  fn test_event_from_cache_parses_offsets() {
    let events = Events::from_cache(vec![api_event("2026-07-01T12:00:00+02:00")]).unwrap();
    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap());
    assert_eq!(events[0].location.as_deref(), Some("Main Hall"));
  }

  #[test]
  fn test_event_bad_timestamp_is_decode_error() {
    let err = Events::from_cache(vec![api_event("next tuesday")]).unwrap_err();
    assert!(matches!(
      err,
      CacheDecodeError::Timestamp {
        field: "startTime",
        ..
      }
    ));
  }

  #[test]
  fn test_event_cache_shape_survives_conversion() {
    let live = Events::from_cache(vec![api_event("2026-07-01T10:00:00Z")]).unwrap();
    let again = Events::from_cache(Events::to_cache(&live)).unwrap();
    assert_eq!(live, again);
  }

  #[test]
  fn test_info_optional_dates() {
    let stored = ApiConInfo {
      name: "TestCon".to_string(),
      description: None,
      timezone: Some("Europe/Berlin".to_string()),
      start_date: None,
      end_date: Some("2026-07-03T18:00:00Z".to_string()),
      links: vec![ApiLink {
        title: "Site".to_string(),
        url: "https://example.org".to_string(),
      }],
    };
    let info = Info::from_cache(stored).unwrap();
    assert_eq!(info.start, None);
    assert!(info.end.is_some());
    assert_eq!(info.links[0].title, "Site");
  }

  #[test]
  fn test_stored_shape_uses_camel_case() {
    let json = serde_json::to_value(api_event("2026-07-01T10:00:00Z")).unwrap();
    assert!(json.get("startTime").is_some());
    assert!(json.get("description").is_none());
  }
}
