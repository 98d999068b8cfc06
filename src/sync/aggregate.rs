//! One facade over every resource of a con.

use std::sync::Arc;

use futures::future::OptionFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::types::{Announcement, ConInfo, Event, Page};
use crate::api::{Announcements, Events, Fetcher, Info, Pages};
use crate::cache::{RecordStore, ResourceCache};

use super::retry::RetryPolicy;
use super::state::Status;
use super::synchronizer::{Activation, Reload, ResourceSync};

/// Per-resource status tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statuses {
  pub events: Status,
  pub info: Status,
  pub pages: Status,
  /// `None` when the con has no announcements feed
  pub announcements: Option<Status>,
}

/// Result of an aggregate reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
  pub events: Reload,
  pub info: Reload,
  pub pages: Reload,
  pub announcements: Option<Reload>,
}

/// All synchronized data of the current con.
///
/// Owns one [`ResourceSync`] per resource. Cheap to clone.
pub struct ConData<F: Fetcher, S: RecordStore> {
  pub events: ResourceSync<Events, F, S>,
  pub info: ResourceSync<Info, F, S>,
  pub pages: ResourceSync<Pages, F, S>,
  pub announcements: Option<ResourceSync<Announcements, F, S>>,
}

impl<F: Fetcher, S: RecordStore> Clone for ConData<F, S> {
  fn clone(&self) -> Self {
    Self {
      events: self.events.clone(),
      info: self.info.clone(),
      pages: self.pages.clone(),
      announcements: self.announcements.clone(),
    }
  }
}

impl<F: Fetcher, S: RecordStore> ConData<F, S> {
  pub fn new(
    fetcher: Arc<F>,
    storage: Arc<S>,
    policy: RetryPolicy,
    with_announcements: bool,
  ) -> Self {
    let cache = ResourceCache::from_shared(storage);
    Self {
      events: ResourceSync::new(Arc::clone(&fetcher), cache.clone(), policy),
      info: ResourceSync::new(Arc::clone(&fetcher), cache.clone(), policy),
      pages: ResourceSync::new(Arc::clone(&fetcher), cache.clone(), policy),
      announcements: with_announcements
        .then(|| ResourceSync::new(Arc::clone(&fetcher), cache.clone(), policy)),
    }
  }

  /// Run the activation protocol of every resource for `instance`.
  ///
  /// Returns the background revalidations started by cache hits.
  pub async fn activate(&self, instance: &str) -> Vec<JoinHandle<Reload>> {
    info!(instance, "Activating instance");
    let announcements: OptionFuture<_> = self
      .announcements
      .as_ref()
      .map(|a| a.activate(instance))
      .into();
    let (events, info, pages, announcements) = tokio::join!(
      self.events.activate(instance),
      self.info.activate(instance),
      self.pages.activate(instance),
      announcements,
    );

    [Some(events), Some(info), Some(pages), announcements]
      .into_iter()
      .flatten()
      .filter_map(|activation| match activation {
        Activation::Cached { revalidation } => revalidation,
        Activation::Fetched(_) | Activation::Unchanged => None,
      })
      .collect()
  }

  /// Reload every resource concurrently; each one succeeds or fails on its
  /// own.
  pub async fn reload(&self) -> ReloadSummary {
    let announcements: OptionFuture<_> = self.announcements.as_ref().map(|a| a.reload()).into();
    let (events, info, pages, announcements) = tokio::join!(
      self.events.reload(),
      self.info.reload(),
      self.pages.reload(),
      announcements,
    );
    debug!(?events, ?info, ?pages, ?announcements, "Reload finished");

    ReloadSummary {
      events,
      info,
      pages,
      announcements,
    }
  }

  /// Activate `instance` and take every resource to the network once.
  pub async fn refresh(&self, instance: &str) -> ReloadSummary {
    info!(instance, "Refreshing instance");
    let announcements: OptionFuture<_> = self
      .announcements
      .as_ref()
      .map(|a| a.refresh(instance))
      .into();
    let (events, info, pages, announcements) = tokio::join!(
      self.events.refresh(instance),
      self.info.refresh(instance),
      self.pages.refresh(instance),
      announcements,
    );

    ReloadSummary {
      events,
      info,
      pages,
      announcements,
    }
  }

  /// Remove every persisted entry.
  pub fn clear(&self) {
    self.events.clear();
    self.info.clear();
    self.pages.clear();
    if let Some(announcements) = &self.announcements {
      announcements.clear();
    }
  }

  /// True when any resource reported 404 for the current instance.
  pub fn is_not_found(&self) -> bool {
    self.events.is_not_found()
      || self.info.is_not_found()
      || self.pages.is_not_found()
      || self
        .announcements
        .as_ref()
        .is_some_and(|a| a.is_not_found())
  }

  /// True while any resource waits to retry stale data.
  pub fn retrying(&self) -> bool {
    self.events.retry_pending()
      || self.info.retry_pending()
      || self.pages.retry_pending()
      || self
        .announcements
        .as_ref()
        .is_some_and(|a| a.retry_pending())
  }

  pub fn statuses(&self) -> Statuses {
    Statuses {
      events: self.events.status(),
      info: self.info.status(),
      pages: self.pages.status(),
      announcements: self.announcements.as_ref().map(|a| a.status()),
    }
  }

  pub fn events_or(&self, default: Vec<Event>) -> Vec<Event> {
    self.events.data_or(default)
  }

  pub fn info_or(&self, default: ConInfo) -> ConInfo {
    self.info.data_or(default)
  }

  pub fn pages_or(&self, default: Vec<Page>) -> Vec<Page> {
    self.pages.data_or(default)
  }

  pub fn announcements_or(&self, default: Vec<Announcement>) -> Vec<Announcement> {
    match &self.announcements {
      Some(announcements) => announcements.data_or(default),
      None => default,
    }
  }

  /// Stop pending stale retries of every resource.
  pub fn shutdown(&self) {
    self.events.shutdown();
    self.info.shutdown();
    self.pages.shutdown();
    if let Some(announcements) = &self.announcements {
      announcements.shutdown();
    }
  }

  /// Follow the instance identifier: activate the current value and again
  /// on every change. The task ends when the sender is dropped.
  pub fn follow(&self, mut instance: watch::Receiver<String>) -> JoinHandle<()> {
    let data = self.clone();
    tokio::spawn(async move {
      loop {
        let current = instance.borrow_and_update().clone();
        // Revalidations keep running detached
        data.activate(&current).await;
        if instance.changed().await.is_err() {
          break;
        }
      }
      debug!("Instance sender dropped, no longer following");
    })
  }
}
