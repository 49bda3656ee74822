use color_eyre::{eyre::eyre, Result};
use tracing::{debug, warn};

use crate::cache::{Auth, CachedFetcher, Request, RequestOptions, Service, Transport};
use crate::github::types::{ApiSearchResponse, PullRequest, PullRequests};

const SEARCH_URL: &str = "https://api.github.com/search/issues";

/// Which pull requests a search selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrQuery {
  Authored,
  Assigned,
  ReviewRequested,
  Mentions,
}

impl PrQuery {
  /// Search API URL for `username`. Also the cache endpoint, so it must be stable.
  pub fn url(&self, username: &str) -> String {
    let q = match self {
      PrQuery::Authored => format!("is:pr+author:{}+is:open", username),
      PrQuery::Assigned => format!("is:pr+assignee:{}+is:open", username),
      PrQuery::ReviewRequested => format!("is:pr+review-requested:{}+is:open", username),
      PrQuery::Mentions => format!("is:open+is:pr+mentions:{}", username),
    };
    format!("{}?q={}&sort=updated&order=desc", SEARCH_URL, q)
  }
}

/// GitHub pull-request client; every request goes through the cache.
#[derive(Clone)]
pub struct GitHubClient<T: Transport> {
  fetcher: CachedFetcher<T>,
  username: String,
  token: String,
}

impl<T: Transport> GitHubClient<T> {
  pub fn new(fetcher: CachedFetcher<T>, username: impl Into<String>, token: impl Into<String>) -> Self {
    Self {
      fetcher,
      username: username.into(),
      token: token.into(),
    }
  }

  pub fn username(&self) -> &str {
    &self.username
  }

  fn request(&self, query: PrQuery) -> Request {
    let options = RequestOptions::default()
      .header("Accept", "application/vnd.github.v3+json")
      .auth(Auth::Token(self.token.clone()));
    Request::get(query.url(&self.username), Service::GitHub).with_options(options)
  }

  async fn search(&self, query: PrQuery) -> Result<ApiSearchResponse> {
    let response = self
      .fetcher
      .fetch_with_cache(&self.request(query))
      .await
      .map_err(|e| eyre!("GitHub API request failed: {}", e))?;

    response
      .json()
      .map_err(|e| eyre!("Failed to parse GitHub response: {}", e))
  }

  /// Fetch all pull-request categories in parallel.
  ///
  /// Authored, assigned and review-requested searches must all succeed; a failed
  /// mentions search only zeroes the mention count.
  pub async fn pull_requests(&self) -> Result<PullRequests> {
    let (owned, assigned, to_review, mentions) = futures::join!(
      self.search(PrQuery::Authored),
      self.search(PrQuery::Assigned),
      self.search(PrQuery::ReviewRequested),
      self.search(PrQuery::Mentions),
    );

    let mentions_count = match mentions {
      Ok(m) => m.total_count,
      Err(e) => {
        warn!("Ignoring failed mentions search: {}", e);
        0
      }
    };

    let into_prs =
      |r: ApiSearchResponse| r.items.into_iter().map(PullRequest::from).collect::<Vec<_>>();

    let prs = PullRequests {
      owned: into_prs(owned?),
      assigned: into_prs(assigned?),
      to_review: into_prs(to_review?),
      mentions_count,
    };
    debug!("Loaded {} pull requests for {}", prs.total(), self.username);
    Ok(prs)
  }
}
