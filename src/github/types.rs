//! GitHub search payloads and the pull-request view model built from them.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub total_count: u64,
  #[serde(default)]
  pub items: Vec<ApiPullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPullRequest {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  pub html_url: String,
  pub repository_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ApiPullRequest> for PullRequest {
  fn from(api: ApiPullRequest) -> Self {
    let repo = extract_repo_name(api.repository_url.as_deref().unwrap_or(&api.html_url));
    Self {
      id: api.id,
      title: api.title,
      url: api.html_url,
      repo,
      created_at: api.created_at,
      updated_at: api.updated_at,
    }
  }
}

/// An open pull request as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
  pub id: u64,
  pub title: String,
  pub url: String,
  /// "owner/repo"
  pub repo: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Freshness bucket of a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrAge {
  /// Under two days
  New,
  /// Under a week
  Recent,
  Old,
}

impl PullRequest {
  pub fn days_since_created(&self, now: DateTime<Utc>) -> i64 {
    (now - self.created_at).num_days()
  }

  pub fn age(&self, now: DateTime<Utc>) -> PrAge {
    match self.days_since_created(now) {
      d if d < 2 => PrAge::New,
      d if d < 7 => PrAge::Recent,
      _ => PrAge::Old,
    }
  }
}

/// Every category of pull request the dashboard shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequests {
  pub owned: Vec<PullRequest>,
  pub assigned: Vec<PullRequest>,
  pub to_review: Vec<PullRequest>,
  pub mentions_count: u64,
}

impl PullRequests {
  pub fn total(&self) -> usize {
    self.owned.len() + self.assigned.len() + self.to_review.len()
  }

  /// Authored pull requests that are not also assigned to the user.
  pub fn owned_only(&self) -> Vec<&PullRequest> {
    self
      .owned
      .iter()
      .filter(|pr| !self.assigned.iter().any(|a| a.id == pr.id))
      .collect()
  }
}

/// "owner/repo" from an API repository URL or a pull request page URL.
pub fn extract_repo_name(url: &str) -> String {
  if let Some((_, rest)) = url.split_once("api.github.com/repos/") {
    let mut parts = rest.split('/');
    if let (Some(owner), Some(repo)) = (parts.next(), parts.next()) {
      if !owner.is_empty() && !repo.is_empty() {
        return format!("{}/{}", owner, repo);
      }
    }
  }

  if let Some((_, rest)) = url.split_once("github.com/") {
    let path = rest.split("/pull/").next().unwrap_or_default();
    if path.contains('/') {
      return path.to_string();
    }
  }

  "Unknown".to_string()
}
