//! Keeps the cached con data in step with the API.
//!
//! Each resource has a `ResourceSync` that decides between the cached
//! envelope and the network, revalidates with etags, and retries with
//! backoff while the server reports stale data. [`ConData`] groups them.

mod aggregate;
mod retry;
mod state;
mod synchronizer;

#[cfg(test)]
mod testing;

pub use aggregate::{ConData, ReloadSummary, Statuses};
pub use retry::RetryPolicy;
pub use state::Status;
pub use synchronizer::Reload;
