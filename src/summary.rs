//! Plain-text summary of the synchronized con data.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::api::types::{Announcement, ConInfo, Event, Page};
use crate::api::Fetcher;
use crate::cache::RecordStore;
use crate::sync::{ConData, Status, Statuses};

/// Number of upcoming events listed
const UPCOMING_LIMIT: usize = 5;

/// Everything the summary shows, captured at one point in time.
#[derive(Debug, Clone)]
pub struct Summary {
  pub instance: String,
  pub now: DateTime<Utc>,
  pub not_found: bool,
  /// Some resource showed stale data and will be fetched again
  pub retrying: bool,
  pub statuses: Statuses,
  pub info: ConInfo,
  pub events: Vec<Event>,
  pub pages: Vec<Page>,
  pub announcements: Vec<Announcement>,
}

impl Summary {
  pub fn capture<F: Fetcher, S: RecordStore>(
    data: &ConData<F, S>,
    instance: &str,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      instance: instance.to_string(),
      now,
      not_found: data.is_not_found(),
      retrying: data.retrying(),
      statuses: data.statuses(),
      info: data.info_or(ConInfo::default()),
      events: data.events_or(Vec::new()),
      pages: data.pages_or(Vec::new()),
      announcements: data.announcements_or(Vec::new()),
    }
  }

  fn upcoming(&self) -> Vec<&Event> {
    let mut upcoming: Vec<&Event> = self
      .events
      .iter()
      .filter(|e| e.is_upcoming(self.now))
      .collect();
    upcoming.sort_by_key(|e| e.start);
    upcoming
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.not_found {
      return writeln!(f, "Convention '{}' was not found.", self.instance);
    }

    let title = if self.info.name.is_empty() {
      self.instance.as_str()
    } else {
      self.info.name.as_str()
    };
    writeln!(f, "{} ({})", title, self.instance)?;

    let upcoming = self.upcoming();
    status_line(
      f,
      "events",
      self.statuses.events,
      &format!("{} total, {} upcoming", self.events.len(), upcoming.len()),
    )?;
    status_line(f, "info", self.statuses.info, "")?;
    status_line(f, "pages", self.statuses.pages, &self.pages.len().to_string())?;
    if let Some(status) = self.statuses.announcements {
      status_line(f, "announcements", status, &self.announcements.len().to_string())?;
    }
    if self.retrying {
      writeln!(f, "  (server data is stale, retrying)")?;
    }

    if !upcoming.is_empty() {
      writeln!(f)?;
      writeln!(f, "Upcoming:")?;
      for event in upcoming.iter().take(UPCOMING_LIMIT) {
        write!(f, "  {}  {}", event.start.format("%a %H:%M"), event.title)?;
        match &event.location {
          Some(location) => writeln!(f, " @ {}", location)?,
          None => writeln!(f)?,
        }
      }
      if upcoming.len() > UPCOMING_LIMIT {
        writeln!(f, "  ... and {} more", upcoming.len() - UPCOMING_LIMIT)?;
      }
    }

    if !self.announcements.is_empty() {
      let mut announcements: Vec<&Announcement> = self.announcements.iter().collect();
      announcements.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));

      writeln!(f)?;
      writeln!(f, "Announcements:")?;
      for announcement in announcements {
        writeln!(
          f,
          "  - {} ({})",
          announcement.title,
          announcement.posted_at.format("%b %d %H:%M")
        )?;
      }
    }

    if !self.pages.is_empty() {
      writeln!(f)?;
      writeln!(f, "Pages:")?;
      for page in &self.pages {
        writeln!(f, "  - {} [{}]", page.title, page.slug)?;
      }
    }

    Ok(())
  }
}

fn status_line(f: &mut fmt::Formatter<'_>, label: &str, status: Status, detail: &str) -> fmt::Result {
  let label = format!("{}:", label);
  if detail.is_empty() {
    writeln!(f, "  {:<15}{}", label, status)
  } else {
    writeln!(f, "  {:<15}{} ({})", label, status, detail)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn event(title: &str, start: DateTime<Utc>) -> Event {
    Event {
      id: title.to_string(),
      title: title.to_string(),
      description: None,
      location: Some("Hall B".to_string()),
      start,
      end: start + Duration::hours(1),
      tags: vec![],
      hosts: vec![],
    }
  }

  fn summary() -> Summary {
    let now = Utc.with_ymd_and_hms(2026, 7, 4, 12, 0, 0).unwrap();
    Summary {
      instance: "testcon-2026".to_string(),
      now,
      not_found: false,
      retrying: false,
      statuses: Statuses {
        events: Status::Success,
        info: Status::Success,
        pages: Status::Pending,
        announcements: None,
      },
      info: ConInfo {
        name: "TestCon".to_string(),
        ..ConInfo::default()
      },
      events: vec![
        event("Closing", now + Duration::hours(3)),
        event("Breakfast", now - Duration::hours(4)),
        event("Panel", now + Duration::hours(1)),
      ],
      pages: vec![],
      announcements: vec![],
    }
  }

  #[test]
  fn test_lists_upcoming_events_in_order() {
    let text = summary().to_string();

    assert!(text.starts_with("TestCon (testcon-2026)\n"));
    assert!(text.contains("events:        success (3 total, 2 upcoming)"));
    assert!(text.contains("pages:         pending (0)"));
    assert!(!text.contains("announcements:"));
    assert!(!text.contains("Breakfast"));

    let panel = text.find("Sat 13:00  Panel @ Hall B").unwrap();
    let closing = text.find("Sat 15:00  Closing @ Hall B").unwrap();
    assert!(panel < closing);
  }

  #[test]
  fn test_retrying_is_mentioned() {
    let mut summary = summary();
    assert!(!summary.to_string().contains("retrying"));
    summary.retrying = true;
    assert!(summary.to_string().contains("(server data is stale, retrying)"));
  }

  #[test]
  fn test_not_found_replaces_everything() {
    let mut summary = summary();
    summary.not_found = true;

    assert_eq!(
      summary.to_string(),
      "Convention 'testcon-2026' was not found.\n"
    );
  }

  #[test]
  fn test_falls_back_to_instance_name() {
    let mut summary = summary();
    summary.info = ConInfo::default();
    assert!(summary.to_string().starts_with("testcon-2026 (testcon-2026)\n"));
  }
}
