use std::sync::Arc;

use chrono::Utc;
use color_eyre::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::{MemoryStorage, NoopStorage, RecordStore, SqliteStorage};
use crate::commands::{self, Action};
use crate::config::{CacheBackend, Config};
use crate::event::{Event, EventHandler};
use crate::summary::Summary;
use crate::sync::{ConData, Reload, ReloadSummary};

type Store = Box<dyn RecordStore>;

/// Main application state
pub struct App {
  data: ConData<ApiClient, Store>,
  instance: String,
}

impl App {
  pub fn new(config: &Config, instance: String) -> Result<Self> {
    let client = ApiClient::new(&config.api)?;
    let storage = open_storage(config)?;

    let data = ConData::new(
      Arc::new(client),
      Arc::new(storage),
      config.retry.policy(),
      config.announcements,
    );

    Ok(Self { data, instance })
  }

  /// Print the summary once. Waits for background revalidation so an online
  /// run shows current data.
  pub async fn show(&self) -> Result<()> {
    let revalidations = self.data.activate(&self.instance).await;
    for handle in revalidations {
      match handle.await {
        Ok(outcome) => debug!(?outcome, "Revalidation finished"),
        Err(e) => warn!(error = %e, "Revalidation task failed"),
      }
    }
    self.print_summary();
    Ok(())
  }

  /// Force a network round for every resource.
  pub async fn reload(&self) -> Result<()> {
    let summary = self.data.refresh(&self.instance).await;
    print_reload(&summary);
    self.print_summary();
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    self.data.clear();
    println!("Cache cleared.");
    Ok(())
  }

  /// Interactive mode: follow state changes and take commands from stdin.
  pub async fn watch(&mut self) -> Result<()> {
    let mut events = EventHandler::new();
    events.forward_changes("events", self.data.events.subscribe());
    events.forward_changes("info", self.data.info.subscribe());
    events.forward_changes("pages", self.data.pages.subscribe());
    if let Some(announcements) = &self.data.announcements {
      events.forward_changes("announcements", announcements.subscribe());
    }
    events.read_stdin();

    let (instance_tx, instance_rx) = watch::channel(self.instance.clone());
    let follower = self.data.follow(instance_rx);

    println!("Watching {}. Type 'help' for commands.", self.instance);

    while let Some(event) = events.next().await {
      match event {
        Event::Changed(resources) => {
          debug!(?resources, "State changed");
          println!("-- updated: {}", resources.join(", "));
          self.print_summary();
        }
        Event::Input(line) => match commands::parse(&line) {
          Ok(Action::Use(instance)) => {
            info!(from = %self.instance, to = %instance, "Switching instance");
            self.instance = instance.clone();
            instance_tx.send_replace(instance);
          }
          Ok(Action::Reload) => print_reload(&self.data.reload().await),
          Ok(Action::Clear) => {
            self.data.clear();
            println!("Cache cleared.");
          }
          Ok(Action::Status) => self.print_summary(),
          Ok(Action::Help) => println!("{}", commands::help_text()),
          Ok(Action::Quit) => break,
          Err(commands::ParseError::Empty) => {}
          Err(e) => println!("{}", e),
        },
        Event::InputClosed => break,
      }
    }

    follower.abort();
    self.data.shutdown();
    Ok(())
  }

  fn print_summary(&self) {
    print!("{}", Summary::capture(&self.data, &self.instance, Utc::now()));
  }
}

fn open_storage(config: &Config) -> Result<Store> {
  if !config.cache.enabled {
    debug!("Cache disabled");
    return Ok(Box::new(NoopStorage));
  }

  match config.cache.backend {
    CacheBackend::Memory => {
      debug!(quota = ?config.cache.quota_bytes, "Using in-memory cache");
      Ok(match config.cache.quota_bytes {
        Some(bytes) => Box::new(MemoryStorage::with_quota(bytes)),
        None => Box::new(MemoryStorage::new()),
      })
    }
    CacheBackend::Sqlite => {
      let path = match &config.cache.path {
        Some(path) => path.clone(),
        None => SqliteStorage::default_path()?,
      };
      debug!(path = %path.display(), "Opening cache");
      Ok(Box::new(SqliteStorage::open(&path)?))
    }
  }
}

fn describe(outcome: Reload) -> String {
  match outcome {
    Reload::Updated { stale: false } => "updated".to_string(),
    Reload::Updated { stale: true } => "updated (stale, retrying)".to_string(),
    Reload::NotModified => "not modified".to_string(),
    Reload::Failed { code: 0 } => "failed (unreachable)".to_string(),
    Reload::Failed { code } => format!("failed ({})", code),
    Reload::Superseded => "superseded".to_string(),
    Reload::NoInstance => "no instance".to_string(),
  }
}

fn print_reload(summary: &ReloadSummary) {
  println!("events:        {}", describe(summary.events));
  println!("info:          {}", describe(summary.info));
  println!("pages:         {}", describe(summary.pages));
  if let Some(announcements) = summary.announcements {
    println!("announcements: {}", describe(announcements));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{ApiConfig, CacheConfig, LogConfig, RetryConfig};

  fn cache_config(enabled: bool, backend: CacheBackend) -> CacheConfig {
    CacheConfig {
      enabled,
      backend,
      path: None,
      quota_bytes: None,
    }
  }

  fn config(cache: CacheConfig) -> Config {
    Config {
      api: ApiConfig {
        base_url: "http://localhost:8080/api".to_string(),
        timeout_secs: 5,
      },
      default_instance: None,
      cache,
      retry: RetryConfig::default(),
      announcements: true,
      log: LogConfig::default(),
    }
  }

  #[test]
  fn test_disabled_cache_never_stores() {
    let store = open_storage(&config(cache_config(false, CacheBackend::Sqlite))).unwrap();
    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);
  }

  #[test]
  fn test_cache_opens_at_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let store = open_storage(&config(CacheConfig {
      path: Some(path.clone()),
      ..cache_config(true, CacheBackend::Sqlite)
    }))
    .unwrap();
    store.set_item("k", "v").unwrap();
    assert!(path.exists());
  }

  #[test]
  fn test_memory_backend_honors_quota() {
    let store = open_storage(&config(CacheConfig {
      quota_bytes: Some(16),
      ..cache_config(true, CacheBackend::Memory)
    }))
    .unwrap();

    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
    assert!(store.set_item("big", &"x".repeat(64)).is_err());
  }

  #[test]
  fn test_describe_reload() {
    assert_eq!(describe(Reload::Failed { code: 0 }), "failed (unreachable)");
    assert_eq!(describe(Reload::Failed { code: 404 }), "failed (404)");
    assert_eq!(
      describe(Reload::Updated { stale: true }),
      "updated (stale, retrying)"
    );
  }
}
