//! Bounded exponential re-fetch after the server reports stale data.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Backoff schedule for stale retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Delay before the first retry; doubled for every following attempt
  pub base_delay: Duration,
  /// Retries allowed before giving up
  pub max_attempts: u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      base_delay: Duration::from_millis(1500),
      max_attempts: 5,
    }
  }
}

impl RetryPolicy {
  /// Delay before attempt `attempt` (1-based): `base * 2^(attempt - 1)`.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    self.base_delay.saturating_mul(1u32 << exponent)
  }
}

#[derive(Default)]
struct RetryState {
  attempt: u32,
  timer: Option<JoinHandle<()>>,
}

impl RetryState {
  fn cancel_timer(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

/// Per-resource stale retry scheduler.
///
/// At most one timer is outstanding. When it fires it sends on the trigger
/// channel; whoever owns the receiving end performs the actual reload, so the
/// timer itself never runs fetch code and can always be aborted safely.
pub struct StaleRetry {
  resource: &'static str,
  policy: RetryPolicy,
  state: Mutex<RetryState>,
}

impl StaleRetry {
  pub fn new(resource: &'static str, policy: RetryPolicy) -> Self {
    Self {
      resource,
      policy,
      state: Mutex::new(RetryState::default()),
    }
  }

  fn with_state<T>(&self, f: impl FnOnce(&mut RetryState) -> T) -> T {
    let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut state)
  }

  /// Record a stale result and schedule the next attempt.
  ///
  /// Returns the scheduled delay, or `None` once the attempt cap is
  /// spent, in which case the retry state is dropped and the stale value
  /// simply stays in place.
  pub fn on_stale(&self, trigger: &mpsc::UnboundedSender<()>) -> Option<Duration> {
    self.with_state(|state| {
      state.cancel_timer();

      if state.attempt >= self.policy.max_attempts {
        warn!(
          resource = self.resource,
          attempts = state.attempt,
          "Data still stale, giving up on retries"
        );
        state.attempt = 0;
        return None;
      }

      state.attempt += 1;
      let delay = self.policy.delay_for(state.attempt);
      info!(
        resource = self.resource,
        attempt = state.attempt,
        delay_ms = delay.as_millis() as u64,
        "Server reported stale data, scheduling retry"
      );

      let trigger = trigger.clone();
      state.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = trigger.send(());
      }));
      Some(delay)
    })
  }

  /// Cancel any pending timer and forget the attempt count.
  pub fn reset(&self) {
    self.with_state(|state| {
      if state.attempt > 0 {
        debug!(resource = self.resource, "Fresh data received, stale retries reset");
      }
      state.cancel_timer();
      state.attempt = 0;
    });
  }

  /// Cancel the pending timer but keep counting attempts.
  pub fn cancel_pending(&self) {
    self.with_state(RetryState::cancel_timer);
  }

  #[cfg(test)]
  pub fn attempt(&self) -> u32 {
    self.with_state(|state| state.attempt)
  }

  /// Whether a retry timer is still waiting to fire.
  pub fn is_pending(&self) -> bool {
    self.with_state(|state| state.timer.as_ref().is_some_and(|t| !t.is_finished()))
  }
}

impl Drop for StaleRetry {
  fn drop(&mut self) {
    self.with_state(RetryState::cancel_timer);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::time::Instant;

  #[test]
  fn test_delay_schedule() {
    let policy = RetryPolicy::default();
    let delays: Vec<u128> = (1..=5).map(|k| policy.delay_for(k).as_millis()).collect();
    assert_eq!(delays, vec![1500, 3000, 6000, 12000, 24000]);
  }

  #[test]
  fn test_delay_does_not_overflow() {
    let policy = RetryPolicy {
      base_delay: Duration::from_secs(u64::MAX / 2),
      max_attempts: 100,
    };
    assert_eq!(policy.delay_for(64), Duration::MAX);
  }

  #[tokio::test(start_paused = true)]
  async fn test_timer_fires_after_delay() {
    let retry = StaleRetry::new("events", RetryPolicy::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let start = Instant::now();
    assert_eq!(retry.on_stale(&tx), Some(Duration::from_millis(1500)));
    assert!(retry.is_pending());

    rx.recv().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(1500));
    assert_eq!(retry.attempt(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_gives_up_after_max_attempts() {
    let retry = StaleRetry::new("events", RetryPolicy::default());
    let (tx, _rx) = mpsc::unbounded_channel();

    for _ in 0..5 {
      assert!(retry.on_stale(&tx).is_some());
    }
    assert_eq!(retry.attempt(), 5);
    assert_eq!(retry.on_stale(&tx), None);
    assert_eq!(retry.attempt(), 0);
    assert!(!retry.is_pending());
  }

  #[tokio::test(start_paused = true)]
  async fn test_reset_cancels_timer() {
    let retry = StaleRetry::new("info", RetryPolicy::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    retry.on_stale(&tx);
    retry.reset();
    assert!(!retry.is_pending());
    assert_eq!(retry.attempt(), 0);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_only_one_timer_outstanding() {
    let retry = StaleRetry::new("pages", RetryPolicy::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    retry.on_stale(&tx);
    retry.on_stale(&tx);

    // The first timer was replaced by the second (3000ms) one
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(rx.try_recv().is_err());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
  }
}
