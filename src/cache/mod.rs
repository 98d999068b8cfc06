//! Generic caching layer for data persistence and offline support.
//!
//! This module provides an API-agnostic caching mechanism that:
//! - Persists one envelope per resource, tagged with the instance it belongs to
//! - Keeps the etag that produced the value for conditional revalidation
//! - Treats unreadable or drifted records as cache misses

mod layer;
mod storage;
mod traits;

pub use layer::ResourceCache;
pub use storage::{MemoryStorage, NoopStorage, RecordStore, SqliteStorage};
pub use traits::{CacheDecodeError, Resource, StoredValue};
