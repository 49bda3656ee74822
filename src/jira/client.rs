use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Url;

use crate::cache::{Auth, CachedFetcher, Request, RequestOptions, Service, Transport};
use crate::config::JiraConfig;
use crate::jira::api_types::ApiSearchResponse;
use crate::jira::types::{sort_issues, Issue};

/// Open issues assigned to the authenticated user
pub const ASSIGNED_JQL: &str = "assignee=currentUser() AND status!=Done AND status!=Closed AND status!=Resolved ORDER BY priority DESC, updated DESC";

/// Check that `domain` looks like "<site>.atlassian.net".
pub fn validate_domain(domain: &str) -> bool {
  let Some(site) = domain.strip_suffix(".atlassian.net") else {
    return false;
  };
  let mut chars = site.chars();
  match chars.next() {
    Some(first) if first.is_ascii_alphanumeric() => {
      chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
    _ => false,
  }
}

/// Jira client for the dashboard; every request goes through the cache.
#[derive(Clone)]
pub struct JiraClient<T: Transport> {
  fetcher: CachedFetcher<T>,
  domain: String,
  email: String,
  token: String,
}

impl<T: Transport> JiraClient<T> {
  pub fn new(fetcher: CachedFetcher<T>, config: &JiraConfig, token: impl Into<String>) -> Result<Self> {
    let domain = config.domain();
    if !validate_domain(domain) {
      return Err(eyre!(
        "Invalid Jira domain format. Please use your-domain.atlassian.net"
      ));
    }

    Ok(Self {
      fetcher,
      domain: domain.to_string(),
      email: config.email.clone(),
      token: token.into(),
    })
  }

  /// Search endpoint URL for the assigned-issues query.
  pub fn search_url(&self) -> Result<String> {
    let base = format!("https://{}/rest/api/2/search", self.domain);
    let url = Url::parse_with_params(&base, &[("jql", ASSIGNED_JQL)])
      .map_err(|e| eyre!("Failed to build Jira search URL: {}", e))?;
    Ok(url.to_string())
  }

  /// Get open issues assigned to the current user, most urgent first.
  pub async fn assigned_issues(&self) -> Result<Vec<Issue>> {
    let options = RequestOptions::default()
      .header("Accept", "application/json")
      .auth(Auth::Basic {
        user: self.email.clone(),
        password: self.token.clone(),
      });
    let request = Request::get(self.search_url()?, Service::Jira).with_options(options);

    let response = self
      .fetcher
      .fetch_with_cache(&request)
      .await
      .map_err(|e| eyre!("Jira API error: {}", e))?;

    let search: ApiSearchResponse = response
      .json()
      .map_err(|e| eyre!("Failed to parse Jira response: {}", e))?;

    let mut issues: Vec<Issue> = search
      .issues
      .into_iter()
      .map(|issue| issue.into_issue(&self.domain))
      .collect();
    sort_issues(&mut issues);

    debug!("Loaded {} of {} Jira issues", issues.len(), search.total);
    Ok(issues)
  }
}
