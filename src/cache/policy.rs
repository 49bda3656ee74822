//! Service namespaces, their TTL policies and the persisted entry shape.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// TTL applied to data services unless configured otherwise.
pub const DEFAULT_DATA_TTL: Duration = Duration::minutes(5);

/// TTL of the favicon namespace. Effectively permanent.
pub const FAVICON_TTL: Duration = Duration::days(365);

/// Logical namespace of a cached data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
  GitHub,
  Jira,
  /// Long-lived auxiliary namespace, never swept by `clear_all`.
  Favicon,
}

impl Service {
  /// Services whose entries drive the countdown and get swept on refresh.
  pub const DATA: [Service; 2] = [Service::GitHub, Service::Jira];

  pub fn as_str(&self) -> &'static str {
    match self {
      Service::GitHub => "github",
      Service::Jira => "jira",
      Service::Favicon => "favicon",
    }
  }

  pub fn is_data(&self) -> bool {
    Self::DATA.contains(self)
  }
}

impl fmt::Display for Service {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Service {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "github" => Ok(Service::GitHub),
      "jira" => Ok(Service::Jira),
      "favicon" => Ok(Service::Favicon),
      other => Err(format!("unknown cache service '{}'", other)),
    }
  }
}

/// Key prefix and lifetime for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePolicy {
  pub prefix: &'static str,
  pub duration: Duration,
}

impl ServicePolicy {
  pub fn duration_ms(&self) -> i64 {
    self.duration.num_milliseconds()
  }

  pub fn owns(&self, key: &str) -> bool {
    key.starts_with(self.prefix)
  }
}

/// Lookup from service to policy. Every `Service` variant has an entry.
#[derive(Debug, Clone)]
pub struct PolicyTable {
  policies: BTreeMap<Service, ServicePolicy>,
}

impl Default for PolicyTable {
  fn default() -> Self {
    Self::with_data_ttl(DEFAULT_DATA_TTL)
  }
}

impl PolicyTable {
  /// Build the table with a custom TTL for the data services.
  pub fn with_data_ttl(ttl: Duration) -> Self {
    let mut policies = BTreeMap::new();
    policies.insert(
      Service::GitHub,
      ServicePolicy {
        prefix: "github_cache_",
        duration: ttl,
      },
    );
    policies.insert(
      Service::Jira,
      ServicePolicy {
        prefix: "jira_cache_",
        duration: ttl,
      },
    );
    policies.insert(
      Service::Favicon,
      ServicePolicy {
        prefix: "favicon_cache_",
        duration: FAVICON_TTL,
      },
    );
    Self { policies }
  }

  pub fn policy(&self, service: Service) -> &ServicePolicy {
    // Populated for every variant in `with_data_ttl`.
    &self.policies[&service]
  }

  /// Resolve a persisted service tag. Unknown tags resolve to nothing.
  pub fn resolve(&self, tag: &str) -> Option<&ServicePolicy> {
    tag
      .parse::<Service>()
      .ok()
      .and_then(|service| self.policies.get(&service))
  }

  /// True when `key` lives under any data-service prefix.
  pub fn is_data_key(&self, key: &str) -> bool {
    self
      .policies
      .iter()
      .any(|(service, policy)| service.is_data() && policy.owns(key))
  }
}

/// A persisted cache record. Always written as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Write time in epoch milliseconds.
  pub timestamp: i64,
  pub data: serde_json::Value,
  /// Service tag as written; may be unknown to this build.
  pub service: String,
}

impl CacheEntry {
  /// Milliseconds of life left at `now_ms` under `policy`. Zero or negative means expired.
  pub fn remaining_ms(&self, policy: &ServicePolicy, now_ms: i64) -> i64 {
    policy.duration_ms() - (now_ms - self.timestamp)
  }
}
