//! Per-resource state machine tying the cache and the fetcher together.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::error::TRANSPORT_ERROR_CODE;
use crate::api::{FetchOutcome, Fetcher};
use crate::cache::{CacheDecodeError, RecordStore, Resource, ResourceCache, StoredValue};

use super::retry::{RetryPolicy, StaleRetry};
use super::state::{FetchResult, Status};

/// How a single `reload()` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
  /// Fresh value applied
  Updated { stale: bool },
  /// Server confirmed the cached value
  NotModified,
  /// Fetch failed; the last good value (if any) is still shown
  Failed { code: u16 },
  /// A newer fetch was issued while this one was in flight; result dropped
  Superseded,
  /// No instance has been activated yet
  NoInstance,
}

/// How an activation was served.
#[derive(Debug)]
pub enum Activation {
  /// Same instance as before and its value is already shown; nothing ran
  Unchanged,
  /// No usable cache entry, a full reload ran
  Fetched(Reload),
  /// Served from cache; the first such activation also revalidates in the
  /// background
  Cached {
    revalidation: Option<JoinHandle<Reload>>,
  },
}

struct Control {
  /// Instance currently selected
  instance: Option<String>,
  /// Instance the displayed success value belongs to
  shown_instance: Option<String>,
  /// Instance the published state (success or error) belongs to
  owner: Option<String>,
  /// Sequence number of the most recently issued fetch
  issued: u64,
  revalidated_once: bool,
}

struct Inner<R: Resource, F: Fetcher, S: RecordStore> {
  fetcher: Arc<F>,
  cache: ResourceCache<S>,
  state: watch::Sender<FetchResult<R::Live>>,
  control: Mutex<Control>,
  retry: StaleRetry,
  retry_trigger: mpsc::UnboundedSender<()>,
  _resource: PhantomData<fn() -> R>,
}

/// Synchronizer for one resource.
///
/// Cheap to clone; all clones share the same state. The canonical
/// [`FetchResult`] lives here and observers get read-only
/// [`watch::Receiver`]s through [`ResourceSync::subscribe`].
///
/// Must be created inside a tokio runtime: it spawns the task that performs
/// stale retries.
pub struct ResourceSync<R: Resource, F: Fetcher, S: RecordStore> {
  inner: Arc<Inner<R, F, S>>,
}

impl<R: Resource, F: Fetcher, S: RecordStore> Clone for ResourceSync<R, F, S> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<R: Resource, F: Fetcher, S: RecordStore> ResourceSync<R, F, S> {
  pub fn new(fetcher: Arc<F>, cache: ResourceCache<S>, policy: RetryPolicy) -> Self {
    let (state, _) = watch::channel(FetchResult::Pending);
    let (retry_trigger, mut retry_rx) = mpsc::unbounded_channel();

    let inner = Arc::new(Inner {
      fetcher,
      cache,
      state,
      control: Mutex::new(Control {
        instance: None,
        shown_instance: None,
        owner: None,
        issued: 0,
        revalidated_once: false,
      }),
      retry: StaleRetry::new(R::KEY, policy),
      retry_trigger,
      _resource: PhantomData,
    });

    // Runs retries fired by the scheduler. Holds only a weak reference so
    // dropping the last handle ends the loop.
    let weak: Weak<Inner<R, F, S>> = Arc::downgrade(&inner);
    tokio::spawn(async move {
      while retry_rx.recv().await.is_some() {
        let Some(inner) = weak.upgrade() else { break };
        ResourceSync { inner }.reload().await;
      }
    });

    Self { inner }
  }

  fn control(&self) -> MutexGuard<'_, Control> {
    self
      .inner
      .control
      .lock()
      .unwrap_or_else(|e| e.into_inner())
  }

  /// Read-only view of the state for observers.
  pub fn subscribe(&self) -> watch::Receiver<FetchResult<R::Live>> {
    self.inner.state.subscribe()
  }

  /// Raw published state, regardless of which instance it belongs to.
  #[cfg(test)]
  pub fn snapshot(&self) -> FetchResult<R::Live> {
    self.inner.state.borrow().clone()
  }

  /// Read the state if it belongs to the selected instance. While a switch
  /// is in flight the previous instance's state is not usable.
  fn current<T>(&self, read: impl FnOnce(&FetchResult<R::Live>) -> T) -> Option<T> {
    let control = self.control();
    if control.owner != control.instance {
      return None;
    }
    let state = self.inner.state.borrow();
    Some(read(&state))
  }

  /// Status tag for the selected instance; `Pending` mid-switch.
  pub fn status(&self) -> Status {
    self.current(FetchResult::status).unwrap_or(Status::Pending)
  }

  pub fn is_not_found(&self) -> bool {
    self.current(FetchResult::is_not_found).unwrap_or(false)
  }

  /// The success value for the selected instance, or `default` while
  /// pending, failed or switching.
  pub fn data_or(&self, default: R::Live) -> R::Live {
    let control = self.control();
    if control.owner != control.instance {
      return default;
    }
    self.inner.state.borrow().unwrap_or(default)
  }

  /// Instance most recently passed to [`ResourceSync::activate`].
  #[cfg(test)]
  pub fn instance(&self) -> Option<String> {
    self.control().instance.clone()
  }

  /// Whether a stale retry is waiting to fire.
  pub fn retry_pending(&self) -> bool {
    self.inner.retry.is_pending()
  }

  /// Run the activation protocol for `instance`.
  ///
  /// A valid cache entry for the same instance is shown immediately; anything
  /// else (no entry, other instance, undecodable entry) goes to the network.
  pub async fn activate(&self, instance: &str) -> Activation {
    let switched = {
      let mut control = self.control();
      let switched = control.instance.as_deref() != Some(instance);
      if !switched
        && control.owner.as_deref() == Some(instance)
        && self.inner.state.borrow().is_success()
      {
        // Serving the cache again would drop a newer value or an in-flight
        // stale retry
        return Activation::Unchanged;
      }
      control.instance = Some(instance.to_string());
      switched
    };
    if switched {
      // Pending retries belong to the previous instance
      self.inner.retry.reset();
    }

    let stored = match self.inner.cache.get::<R::Stored>(R::KEY) {
      Some(stored) if stored.is_valid_for(instance) => stored,
      Some(stored) => {
        debug!(
          resource = R::KEY,
          cached = %stored.instance,
          instance,
          "Cached value belongs to another instance"
        );
        return Activation::Fetched(self.reload().await);
      }
      None => {
        debug!(resource = R::KEY, instance, "Cache miss");
        return Activation::Fetched(self.reload().await);
      }
    };

    let value = match R::from_cache(stored.value) {
      Ok(value) => value,
      Err(e) => {
        debug!(resource = R::KEY, error = %e, "Cached value no longer decodes");
        return Activation::Fetched(self.reload().await);
      }
    };

    let revalidate = {
      let mut control = self.control();
      // Anything still in flight was issued before this activation
      control.issued += 1;
      control.shown_instance = Some(instance.to_string());
      control.owner = Some(instance.to_string());
      self.inner.state.send_replace(FetchResult::Success {
        value,
        etag: stored.etag,
      });
      !std::mem::replace(&mut control.revalidated_once, true)
    };
    debug!(resource = R::KEY, instance, "Serving cached value");

    let revalidation = revalidate.then(|| {
      let sync = self.clone();
      tokio::spawn(async move { sync.reload().await })
    });
    Activation::Cached { revalidation }
  }

  /// Activate `instance` and make sure the resource goes to the network
  /// exactly once, reusing the background revalidation when one started.
  pub async fn refresh(&self, instance: &str) -> Reload {
    match self.activate(instance).await {
      Activation::Fetched(outcome) => outcome,
      Activation::Cached {
        revalidation: Some(handle),
      } => match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
          warn!(resource = R::KEY, error = %e, "Revalidation task failed");
          self.reload().await
        }
      },
      Activation::Cached { revalidation: None } | Activation::Unchanged => self.reload().await,
    }
  }

  /// Fetch the resource for the current instance and apply the outcome.
  pub async fn reload(&self) -> Reload {
    let (instance, seq) = {
      let mut control = self.control();
      let Some(instance) = control.instance.clone() else {
        return Reload::NoInstance;
      };
      control.issued += 1;
      (instance, control.issued)
    };
    self.inner.retry.cancel_pending();

    // The etag comes from storage so a fresh process can still revalidate
    let mut etag = self
      .inner
      .cache
      .meta(R::KEY)
      .filter(|meta| meta.instance == instance)
      .and_then(|meta| meta.etag);

    loop {
      let outcome = self
        .inner
        .fetcher
        .fetch(R::ENDPOINT, &instance, etag.as_deref())
        .await;

      match outcome {
        FetchOutcome::Success { value, etag, stale } => {
          let decoded = serde_json::from_value::<R::Stored>(value)
            .map_err(CacheDecodeError::from)
            .and_then(R::from_cache);
          return match decoded {
            Ok(live) => self.apply_success(seq, &instance, live, etag, stale),
            Err(e) => {
              warn!(resource = R::KEY, instance = %instance, error = %e, "Response payload did not decode");
              self.apply_failure(seq, &instance, TRANSPORT_ERROR_CODE)
            }
          };
        }
        FetchOutcome::NotModified => {
          let cached = self
            .inner
            .cache
            .get::<R::Stored>(R::KEY)
            .filter(|stored| stored.is_valid_for(&instance))
            .and_then(|stored| {
              let etag = stored.etag;
              R::from_cache(stored.value).ok().map(|value| (value, etag))
            });

          match cached {
            Some((value, etag)) => return self.apply_not_modified(seq, &instance, value, etag),
            None if etag.is_some() => {
              // Server confirmed an entry we can no longer read; start over
              debug!(resource = R::KEY, "Not modified but cache unusable, refetching");
              self.inner.cache.remove(R::KEY);
              etag = None;
            }
            None => return self.apply_failure(seq, &instance, 304),
          }
        }
        FetchOutcome::Error { code } => return self.apply_failure(seq, &instance, code),
      }
    }
  }

  /// Remove the persisted entry. The displayed state is left alone.
  pub fn clear(&self) {
    self.inner.cache.remove(R::KEY);
  }

  /// Stop any pending stale retry.
  pub fn shutdown(&self) {
    self.inner.retry.reset();
  }

  /// Lock the control block if `seq` is still the latest issued fetch.
  fn latest(&self, seq: u64) -> Option<MutexGuard<'_, Control>> {
    let control = self.control();
    if control.issued == seq {
      Some(control)
    } else {
      debug!(resource = R::KEY, seq, latest = control.issued, "Discarding superseded fetch");
      None
    }
  }

  fn apply_success(
    &self,
    seq: u64,
    instance: &str,
    value: R::Live,
    etag: Option<String>,
    stale: bool,
  ) -> Reload {
    {
      let Some(mut control) = self.latest(seq) else {
        return Reload::Superseded;
      };

      // Stale payloads are shown but not persisted, so the next attempt
      // still revalidates against the last fresh etag
      if !stale {
        let stored = StoredValue::new(instance, etag.clone(), R::to_cache(&value));
        self.inner.cache.put(R::KEY, &stored);
      }

      control.shown_instance = Some(instance.to_string());
      control.owner = Some(instance.to_string());
      self.inner.state.send_replace(FetchResult::Success { value, etag });
    }

    if stale {
      self.inner.retry.on_stale(&self.inner.retry_trigger);
    } else {
      self.inner.retry.reset();
    }
    debug!(resource = R::KEY, instance, stale, "Applied fresh value");
    Reload::Updated { stale }
  }

  fn apply_not_modified(
    &self,
    seq: u64,
    instance: &str,
    value: R::Live,
    etag: Option<String>,
  ) -> Reload {
    {
      let Some(mut control) = self.latest(seq) else {
        return Reload::Superseded;
      };
      control.shown_instance = Some(instance.to_string());
      control.owner = Some(instance.to_string());
      self.inner.state.send_replace(FetchResult::Success { value, etag });
    }

    self.inner.retry.reset();
    debug!(resource = R::KEY, instance, "Not modified, kept cached value");
    Reload::NotModified
  }

  fn apply_failure(&self, seq: u64, instance: &str, code: u16) -> Reload {
    {
      let Some(mut control) = self.latest(seq) else {
        return Reload::Superseded;
      };

      control.owner = Some(instance.to_string());
      let has_fallback = self.inner.state.borrow().is_success()
        && control.shown_instance.as_deref() == Some(instance);
      if has_fallback {
        info!(resource = R::KEY, instance, code, "Fetch failed, keeping last good value");
      } else {
        warn!(resource = R::KEY, instance, code, "Fetch failed");
        control.shown_instance = None;
        self.inner.state.send_replace(FetchResult::Error { code });
      }
    }

    self.inner.retry.reset();
    Reload::Failed { code }
  }
}
