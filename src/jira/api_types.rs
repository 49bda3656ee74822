//! Serde-deserializable types matching Jira search responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{Issue, Priority};

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPriority {
  pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiIssueFields {
  #[serde(default)]
  pub summary: String,
  pub status: Option<ApiStatus>,
  pub priority: Option<ApiPriority>,
  #[serde(default)]
  pub created: String,
  #[serde(default)]
  pub updated: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
  #[serde(default)]
  pub total: u64,
}

impl ApiIssue {
  pub fn into_issue(self, domain: &str) -> Issue {
    let priority_name = self.fields.priority.map(|p| p.name).unwrap_or_default();
    Issue {
      url: format!("https://{}/browse/{}", domain, self.key),
      key: self.key,
      summary: self.fields.summary,
      status: self
        .fields
        .status
        .map(|s| s.name)
        .unwrap_or_else(|| "Unknown".to_string()),
      priority: Priority::classify(&priority_name),
      priority_name,
      created: parse_jira_datetime(&self.fields.created),
      updated: parse_jira_datetime(&self.fields.updated),
    }
  }
}

/// Parse Jira's timestamp format ("2024-01-15T10:30:00.000+0000"), falling back to RFC 3339.
pub fn parse_jira_datetime(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
    .or_else(|_| DateTime::parse_from_rfc3339(s))
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
}
