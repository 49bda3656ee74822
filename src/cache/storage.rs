//! Key-value storage port and its SQLite and in-memory implementations.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// String key-value persistence the cache is layered on.
///
/// Writes replace whole values; readers observe a complete value or nothing.
pub trait KeyValueStore: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Remove `key`. Removing a missing key is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// All keys currently stored.
  fn keys(&self) -> Result<Vec<String>>;
}

/// Storage implementation that doesn't keep anything.
/// Used when caching is disabled - every read misses.
pub struct NoopStorage;

impl KeyValueStore for NoopStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove_item(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// In-process storage with an optional byte quota.
///
/// The quota counts key and value bytes; a write that would exceed it fails
/// and leaves the previous value in place.
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<BTreeMap<String, String>>,
  quota_bytes: Option<usize>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub fn with_quota(quota_bytes: usize) -> Self {
    Self {
      items: Mutex::new(BTreeMap::new()),
      quota_bytes: Some(quota_bytes),
    }
  }
}

impl KeyValueStore for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(quota) = self.quota_bytes {
      let used: usize = items
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
      if used + key.len() + value.len() > quota {
        return Err(eyre!(
          "Storage quota exceeded writing '{}' ({} of {} bytes used)",
          key,
          used,
          quota
        ));
      }
    }

    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.keys().cloned().collect())
  }
}

/// SQLite-based key-value storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the storage at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Storage that lives only as long as the process.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tabdash").join("cache.db"))
  }
}

impl KeyValueStore for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache key '{}': {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store cache key '{}': {}", key, e))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove cache key '{}': {}", key, e))?;

    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT key FROM kv_store")
      .map_err(|e| eyre!("Failed to prepare key scan: {}", e))?;

    let keys: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to scan cache keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_storage_set_get_remove() {
    let storage = MemoryStorage::new();
    storage.set_item("a", "1").unwrap();
    assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
    storage.remove_item("a").unwrap();
    assert_eq!(storage.get_item("a").unwrap(), None);
    // Removing twice is fine
    storage.remove_item("a").unwrap();
  }

  #[test]
  fn test_memory_storage_quota() {
    let storage = MemoryStorage::with_quota(10);
    storage.set_item("k", "12345").unwrap();
    assert!(storage.set_item("j", "123456789").is_err());
    // Replacing an existing key only counts the new value
    storage.set_item("k", "123456789").unwrap();
    assert_eq!(storage.keys().unwrap(), vec!["k".to_string()]);
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.set_item("a", "1").unwrap();
    assert_eq!(storage.get_item("a").unwrap(), None);
    assert!(storage.keys().unwrap().is_empty());
  }

  #[test]
  fn test_sqlite_storage_in_memory() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.set_item("github_cache_x", "{}").unwrap();
    storage.set_item("github_cache_x", "[]").unwrap();
    assert_eq!(
      storage.get_item("github_cache_x").unwrap().as_deref(),
      Some("[]")
    );
    assert_eq!(storage.keys().unwrap(), vec!["github_cache_x".to_string()]);
    storage.remove_item("github_cache_x").unwrap();
    assert_eq!(storage.get_item("github_cache_x").unwrap(), None);
  }

  #[test]
  fn test_sqlite_storage_persists_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage.set_item("jira_cache_q", "{\"a\":1}").unwrap();
    }
    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(
      reopened.get_item("jira_cache_q").unwrap().as_deref(),
      Some("{\"a\":1}")
    );
  }
}
