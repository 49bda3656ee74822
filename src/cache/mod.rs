//! Time-based local cache for rate-limited third-party APIs.
//!
//! This module provides:
//! - A namespaced key-value `CacheStore` with per-service TTL policies
//! - `CachedFetcher`, a read-first write-through wrapper around HTTP calls
//! - `CacheTimer`, a countdown of the longest-lived entry for the UI
//!
//! Stale entries are deleted lazily on read, never swept in the background.

mod clock;
mod fetcher;
mod policy;
mod storage;
mod store;
mod timer;

pub use fetcher::{Auth, CachedFetcher, HttpTransport, Request, RequestOptions, Transport};
pub use policy::{PolicyTable, Service};
pub use storage::{KeyValueStore, MemoryStorage, NoopStorage, SqliteStorage};
pub use store::CacheStore;
pub use timer::{CacheTimer, TimerDisplay};

#[cfg(test)]
pub(crate) use fetcher::tests as fetcher_tests;
