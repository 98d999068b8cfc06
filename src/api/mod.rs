//! REST client and data types for the con API.
//!
//! Every endpoint lives below `{base_url}/{instance}/` and wraps its payload
//! as `{ "value": ..., "stale": bool }`.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod error;
pub mod types;

pub use cache::{Announcements, Events, Info, Pages};
pub use client::{ApiClient, FetchOutcome, Fetcher};
