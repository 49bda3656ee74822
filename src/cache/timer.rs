//! Countdown of the longest-lived cache entry across data services.

use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::store::CacheStore;

/// What the TTL indicator shows.
///
/// `Unknown` when no data-service key exists, `Empty` when keys exist but all are
/// expired or unreadable, `Counting` with the largest remaining lifetime otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDisplay {
  #[default]
  Unknown,
  Empty,
  Counting(i64),
}

impl TimerDisplay {
  /// Text for the indicator.
  pub fn label(&self) -> String {
    match self {
      TimerDisplay::Unknown => "ttl No cache".to_string(),
      TimerDisplay::Empty => String::new(),
      TimerDisplay::Counting(ms) => format!("ttl {}", format_remaining(*ms)),
    }
  }

  pub fn is_italic(&self) -> bool {
    !matches!(self, TimerDisplay::Empty)
  }
}

/// `minutes:seconds` with zero-padded seconds.
pub fn format_remaining(ms: i64) -> String {
  let ms = ms.max(0);
  format!("{}:{:02}", ms / 60_000, (ms % 60_000) / 1_000)
}

/// Scan the store and work out what the indicator should show.
pub fn compute_display(store: &CacheStore) -> TimerDisplay {
  let entries = store.scan_data_entries();
  if entries.is_empty() {
    return TimerDisplay::Unknown;
  }

  let now = store.now_ms();
  let longest = entries
    .iter()
    .filter_map(|(_, entry)| {
      let entry = entry.as_ref()?;
      let policy = store.policies().resolve(&entry.service)?;
      let left = entry.remaining_ms(policy, now);
      (left > 0).then_some(left)
    })
    .max();

  match longest {
    Some(ms) => TimerDisplay::Counting(ms),
    None => TimerDisplay::Empty,
  }
}

/// Publishes `TimerDisplay` updates for the UI to watch.
pub struct CacheTimer {
  store: CacheStore,
  display: watch::Sender<TimerDisplay>,
}

impl CacheTimer {
  pub fn new(store: CacheStore) -> Self {
    let (display, _) = watch::channel(TimerDisplay::default());
    Self { store, display }
  }

  pub fn subscribe(&self) -> watch::Receiver<TimerDisplay> {
    self.display.subscribe()
  }

  /// Recompute and publish the indicator.
  pub fn update(&self) -> TimerDisplay {
    let display = compute_display(&self.store);
    self.display.send_replace(display);
    display
  }

  /// Refresh every `period` and after every cache change until the handle stops.
  pub fn spawn(self, period: Duration) -> TimerHandle {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let mut changes = self.store.subscribe();

    let task = tokio::spawn(async move {
      // First tick fires immediately
      let mut interval = tokio::time::interval(period);

      loop {
        tokio::select! {
          _ = interval.tick() => {
            self.update();
          }
          change = changes.recv() => match change {
            Ok(_) | Err(RecvError::Lagged(_)) => {
              self.update();
            }
            Err(RecvError::Closed) => break,
          },
          _ = shutdown_rx.recv() => {
            break;
          }
        }
      }
    });

    TimerHandle { shutdown_tx, task }
  }
}

/// Owner of a running timer task. Dropping it cancels the task.
pub struct TimerHandle {
  shutdown_tx: mpsc::Sender<()>,
  task: JoinHandle<()>,
}

impl TimerHandle {
  /// Stop the task and wait for it to exit.
  pub async fn stop(&mut self) {
    let _ = self.shutdown_tx.send(()).await;
    let _ = (&mut self.task).await;
  }
}

impl Drop for TimerHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::cache::policy::{PolicyTable, Service};
  use crate::cache::storage::{KeyValueStore, MemoryStorage};
  use serde_json::json;
  use std::sync::Arc;

  const T0: i64 = 1_700_000_000_000;

  fn store() -> (CacheStore, Arc<ManualClock>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::at(T0));
    let store =
      CacheStore::new(storage.clone(), PolicyTable::default()).with_clock(clock.clone());
    (store, clock, storage)
  }

  #[test]
  fn test_format_remaining() {
    assert_eq!(format_remaining(200_000), "3:20");
    assert_eq!(format_remaining(300_000), "5:00");
    assert_eq!(format_remaining(59_999), "0:59");
    assert_eq!(format_remaining(5_000), "0:05");
  }

  #[test]
  fn test_no_keys_shows_no_cache() {
    let (store, _, _) = store();
    let display = compute_display(&store);
    assert_eq!(display, TimerDisplay::Unknown);
    assert_eq!(display.label(), "ttl No cache");
    assert!(display.is_italic());
  }

  #[test]
  fn test_lapsed_key_shows_empty() {
    let (store, clock, _) = store();
    store.set(&store.key("a", Service::Jira), json!(1), Service::Jira);
    clock.advance(300_000);

    let display = compute_display(&store);
    assert_eq!(display, TimerDisplay::Empty);
    assert_eq!(display.label(), "");
    assert!(!display.is_italic());
  }

  #[test]
  fn test_longest_remaining_wins_across_services() {
    let (store, clock, _) = store();
    store.set(&store.key("a", Service::Jira), json!(1), Service::Jira);
    clock.advance(150_000);
    store.set(&store.key("b", Service::GitHub), json!(2), Service::GitHub);
    // Jira has 50s left, GitHub 200s
    clock.advance(100_000);

    let display = compute_display(&store);
    assert_eq!(display, TimerDisplay::Counting(200_000));
    assert_eq!(display.label(), "ttl 3:20");
  }

  #[test]
  fn test_malformed_entry_does_not_abort_scan() {
    let (store, _, storage) = store();
    storage.set_item("github_cache_broken", "{{{").unwrap();
    store.set(&store.key("ok", Service::Jira), json!(1), Service::Jira);

    assert_eq!(compute_display(&store), TimerDisplay::Counting(300_000));
  }

  #[test]
  fn test_unknown_tag_counts_as_expired() {
    let (store, _, storage) = store();
    let raw = json!({"timestamp": T0, "data": null, "service": "gitlab"}).to_string();
    storage.set_item("jira_cache_x", &raw).unwrap();

    assert_eq!(compute_display(&store), TimerDisplay::Empty);
  }

  #[test]
  fn test_favicons_are_ignored() {
    let (store, _, _) = store();
    store.cache_favicon("github.com", "https://github.com/favicon.ico");
    assert_eq!(compute_display(&store), TimerDisplay::Unknown);
  }

  #[test]
  fn test_state_transitions() {
    let (store, clock, _) = store();
    let timer = CacheTimer::new(store.clone());
    let rx = timer.subscribe();

    assert_eq!(timer.update(), TimerDisplay::Unknown);

    let key = store.key("a", Service::GitHub);
    store.set(&key, json!(1), Service::GitHub);
    assert_eq!(timer.update(), TimerDisplay::Counting(300_000));

    clock.advance(300_000);
    assert_eq!(timer.update(), TimerDisplay::Empty);

    store.clear_all();
    assert_eq!(timer.update(), TimerDisplay::Unknown);
    assert_eq!(*rx.borrow(), TimerDisplay::Unknown);
  }

  #[tokio::test]
  async fn test_spawned_timer_follows_cache_changes() {
    let (store, _, _) = store();
    let timer = CacheTimer::new(store.clone());
    let mut rx = timer.subscribe();
    let mut handle = timer.spawn(Duration::from_secs(3600));

    store.set(&store.key("a", Service::Jira), json!(1), Service::Jira);

    let seen = tokio::time::timeout(
      Duration::from_secs(5),
      rx.wait_for(|d| matches!(d, TimerDisplay::Counting(_))),
    )
    .await
    .expect("timer did not react")
    .map(|d| *d)
    .unwrap();
    assert_eq!(seen, TimerDisplay::Counting(300_000));

    handle.stop().await;
    assert!(handle.task.is_finished());
  }
}
