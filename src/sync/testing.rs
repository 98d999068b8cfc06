//! Scripted fetcher shared by the synchronizer and aggregate tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::api::{FetchOutcome, Fetcher};

#[derive(Debug, Clone)]
pub struct Call {
  pub instance: String,
  pub etag: Option<String>,
  pub at: Instant,
}

#[derive(Default)]
struct Script {
  queued: HashMap<String, VecDeque<(Duration, FetchOutcome<Value>)>>,
  defaults: HashMap<String, FetchOutcome<Value>>,
  calls: HashMap<String, Vec<Call>>,
}

/// Fetcher that answers from per-endpoint queues, falling back to a default
/// outcome (or a transport error) once a queue runs dry.
#[derive(Default)]
pub struct ScriptedFetcher {
  script: Mutex<Script>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, endpoint: &str, outcome: FetchOutcome<Value>) {
    self.push_delayed(endpoint, Duration::ZERO, outcome);
  }

  pub fn push_delayed(&self, endpoint: &str, delay: Duration, outcome: FetchOutcome<Value>) {
    let mut script = self.script.lock().unwrap();
    script
      .queued
      .entry(endpoint.to_string())
      .or_default()
      .push_back((delay, outcome));
  }

  pub fn set_default(&self, endpoint: &str, outcome: FetchOutcome<Value>) {
    let mut script = self.script.lock().unwrap();
    script.defaults.insert(endpoint.to_string(), outcome);
  }

  pub fn calls(&self, endpoint: &str) -> Vec<Call> {
    let script = self.script.lock().unwrap();
    script.calls.get(endpoint).cloned().unwrap_or_default()
  }
}

impl Fetcher for ScriptedFetcher {
  async fn fetch(
    &self,
    endpoint: &str,
    instance: &str,
    etag: Option<&str>,
  ) -> FetchOutcome<Value> {
    let (delay, outcome) = {
      let mut script = self.script.lock().unwrap();
      script.calls.entry(endpoint.to_string()).or_default().push(Call {
        instance: instance.to_string(),
        etag: etag.map(String::from),
        at: Instant::now(),
      });

      let queued = script.queued.get_mut(endpoint).and_then(VecDeque::pop_front);
      let next = match queued {
        Some(next) => next,
        None => (
          Duration::ZERO,
          script
            .defaults
            .get(endpoint)
            .cloned()
            .unwrap_or(FetchOutcome::Error { code: 0 }),
        ),
      };
      next
    };

    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    outcome
  }
}

pub fn ok(value: Value, etag: Option<&str>) -> FetchOutcome<Value> {
  FetchOutcome::Success {
    value,
    etag: etag.map(String::from),
    stale: false,
  }
}

pub fn stale(value: Value) -> FetchOutcome<Value> {
  FetchOutcome::Success {
    value,
    etag: None,
    stale: true,
  }
}

/// Page payload in wire shape.
pub fn page(title: &str) -> Value {
  json!({
    "id": title,
    "title": title,
    "slug": title.to_lowercase().replace(' ', "-"),
    "body": "",
  })
}
