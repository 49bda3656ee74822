//! Namespaced TTL cache over a key-value storage port.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::policy::{CacheEntry, PolicyTable, Service};
use super::storage::KeyValueStore;

/// Favicon entries kept before a failed write triggers eviction.
const FAVICON_EVICTION_THRESHOLD: usize = 100;
/// Oldest favicon entries dropped by one eviction pass.
const FAVICON_EVICTION_COUNT: usize = 50;

/// Notification emitted after every cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheChange {
  Read,
  Written(Service),
  Cleared(Service),
  FetchFailed(Service),
}

/// Freshest-entry summary of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
  /// Write time (epoch ms) of the entry with the most time left.
  pub last_updated: Option<i64>,
  /// Whether that entry is still within its TTL.
  pub is_valid: bool,
  /// Parsable entries found under the service prefix.
  pub entries: usize,
}

impl ServiceStatus {
  pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
    self.last_updated.and_then(DateTime::<Utc>::from_timestamp_millis)
  }
}

/// A data-service key and its parsed entry, `None` when the stored value is corrupt.
pub type ScannedEntry = (String, Option<CacheEntry>);

/// Cache store shared by the fetcher, the timer and the dashboard.
///
/// Cloning is cheap; clones share storage and the change channel.
#[derive(Clone)]
pub struct CacheStore {
  storage: Arc<dyn KeyValueStore>,
  policies: Arc<PolicyTable>,
  clock: Arc<dyn Clock>,
  changes: broadcast::Sender<CacheChange>,
}

impl CacheStore {
  pub fn new(storage: Arc<dyn KeyValueStore>, policies: PolicyTable) -> Self {
    let (changes, _) = broadcast::channel(64);
    Self {
      storage,
      policies: Arc::new(policies),
      clock: Arc::new(SystemClock),
      changes,
    }
  }

  /// Replace the time source.
  #[cfg(test)]
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn policies(&self) -> &PolicyTable {
    &self.policies
  }

  pub fn now_ms(&self) -> i64 {
    self.clock.now_ms()
  }

  /// Subscribe to change notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
    self.changes.subscribe()
  }

  pub(crate) fn notify(&self, change: CacheChange) {
    // No receivers is fine
    let _ = self.changes.send(change);
  }

  /// Storage key for `endpoint` under `service`.
  pub fn key(&self, endpoint: &str, service: Service) -> String {
    format!("{}{}", self.policies.policy(service).prefix, endpoint)
  }

  /// Read and parse the raw entry. Corrupt or unreadable entries read as absent.
  fn read_entry(&self, key: &str) -> Option<CacheEntry> {
    let raw = match self.storage.get_item(key) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!("Cache read failed for {}: {}", key, e);
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        debug!("Ignoring malformed cache entry {}: {}", key, e);
        None
      }
    }
  }

  fn valid_entry(&self, key: &str, service: Service) -> Option<CacheEntry> {
    let entry = self.read_entry(key)?;
    // An entry whose tag is unknown has no resolvable TTL
    self.policies.resolve(&entry.service)?;
    let policy = self.policies.policy(service);
    (entry.remaining_ms(policy, self.now_ms()) > 0).then_some(entry)
  }

  /// Whether `key` holds an entry still inside `service`'s TTL. Never mutates storage.
  pub fn is_valid(&self, key: &str, service: Service) -> bool {
    self.valid_entry(key, service).is_some()
  }

  /// Cached payload for `key`, deleting the stored entry if it is expired or corrupt.
  pub fn get(&self, key: &str, service: Service) -> Option<Value> {
    let data = match self.valid_entry(key, service) {
      Some(entry) => Some(entry.data),
      None => {
        self.remove(key);
        None
      }
    };
    self.notify(CacheChange::Read);
    data
  }

  /// Write `data` under `key`. Storage failures are logged, never returned.
  pub fn set(&self, key: &str, data: Value, service: Service) {
    if let Err(e) = self.write_entry(key, data, service) {
      warn!("Cache storage error for {}: {}", key, e);
    }
    self.notify(CacheChange::Written(service));
  }

  fn write_entry(&self, key: &str, data: Value, service: Service) -> color_eyre::Result<()> {
    let entry = CacheEntry {
      timestamp: self.now_ms(),
      data,
      service: service.as_str().to_string(),
    };
    let raw = serde_json::to_string(&entry)?;
    self.storage.set_item(key, &raw)
  }

  fn remove(&self, key: &str) {
    if let Err(e) = self.storage.remove_item(key) {
      warn!("Failed to remove cache entry {}: {}", key, e);
    }
  }

  fn keys_for(&self, service: Service) -> Vec<String> {
    let policy = self.policies.policy(service);
    match self.storage.keys() {
      Ok(keys) => keys.into_iter().filter(|k| policy.owns(k)).collect(),
      Err(e) => {
        warn!("Failed to list cache keys: {}", e);
        Vec::new()
      }
    }
  }

  /// Delete every entry under `service`'s prefix.
  pub fn clear_service(&self, service: Service) {
    let keys = self.keys_for(service);
    debug!("Clearing {} {} cache entries", keys.len(), service);
    for key in keys {
      self.remove(&key);
    }
    self.notify(CacheChange::Cleared(service));
  }

  /// Clear every data service. The favicon namespace is left alone.
  pub fn clear_all(&self) {
    for service in Service::DATA {
      self.clear_service(service);
    }
  }

  /// Per data-service summary of the entry with the most time remaining.
  pub fn status(&self) -> BTreeMap<Service, ServiceStatus> {
    let now = self.now_ms();
    Service::DATA
      .iter()
      .map(|&service| {
        let policy = self.policies.policy(service);
        let mut status = ServiceStatus::default();
        let mut best: Option<i64> = None;

        for key in self.keys_for(service) {
          // Unknown service tags never match
          let Some(entry) = self
            .read_entry(&key)
            .filter(|e| self.policies.resolve(&e.service).is_some())
          else {
            continue;
          };
          status.entries += 1;
          let remaining = entry.remaining_ms(policy, now);
          if best.map_or(true, |b| remaining > b) {
            best = Some(remaining);
            status.last_updated = Some(entry.timestamp);
            status.is_valid = remaining > 0;
          }
        }

        (service, status)
      })
      .collect()
  }

  /// Every key under a data-service prefix with its parsed entry.
  pub fn scan_data_entries(&self) -> Vec<ScannedEntry> {
    let keys = match self.storage.keys() {
      Ok(keys) => keys,
      Err(e) => {
        warn!("Failed to list cache keys: {}", e);
        return Vec::new();
      }
    };

    keys
      .into_iter()
      .filter(|k| self.policies.is_data_key(k))
      .map(|k| {
        let entry = self.read_entry(&k);
        (k, entry)
      })
      .collect()
  }

  /// Cached favicon URL for `hostname`, regardless of age.
  pub fn cached_favicon(&self, hostname: &str) -> Option<String> {
    let key = self.key(hostname, Service::Favicon);
    let raw = self.storage.get_item(&key).ok()??;
    match serde_json::from_str::<CacheEntry>(&raw) {
      Ok(entry) => entry.data.as_str().map(String::from),
      Err(e) => {
        debug!("Dropping corrupt favicon entry {}: {}", key, e);
        self.remove(&key);
        None
      }
    }
  }

  /// Remember `favicon_url` for `hostname`. On a failed write, evict old favicons and retry once.
  pub fn cache_favicon(&self, hostname: &str, favicon_url: &str) {
    if hostname.is_empty() || favicon_url.is_empty() {
      return;
    }

    let key = self.key(hostname, Service::Favicon);
    let data = Value::String(favicon_url.to_string());

    if let Err(e) = self.write_entry(&key, data.clone(), Service::Favicon) {
      warn!("Favicon cache storage error for {}: {}", hostname, e);
      self.evict_old_favicons();
      if let Err(e) = self.write_entry(&key, data, Service::Favicon) {
        warn!("Favicon cache storage retry error for {}: {}", hostname, e);
      }
    }
  }

  /// Drop every favicon entry.
  pub fn clear_favicon_cache(&self) {
    self.clear_service(Service::Favicon);
  }

  /// When more than the threshold of favicons is stored, remove the oldest batch.
  fn evict_old_favicons(&self) {
    let keys = self.keys_for(Service::Favicon);
    if keys.len() <= FAVICON_EVICTION_THRESHOLD {
      return;
    }

    let mut aged: Vec<(i64, String)> = keys
      .into_iter()
      .map(|key| {
        let timestamp = self.read_entry(&key).map_or(0, |e| e.timestamp);
        (timestamp, key)
      })
      .collect();
    aged.sort();

    debug!("Evicting {} old favicon entries", FAVICON_EVICTION_COUNT);
    for (_, key) in aged.into_iter().take(FAVICON_EVICTION_COUNT) {
      self.remove(&key);
    }
  }
}
