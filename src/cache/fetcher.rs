//! Read-first, write-through HTTP fetching over the cache store.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, error};

use super::policy::Service;
use super::store::{CacheChange, CacheStore};

/// Errors surfaced by `fetch_with_cache`.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The server answered with a non-success status
  #[error("HTTP error! status: {0}")]
  Status(u16),

  /// The request never produced a response
  #[error("Request failed: {0}")]
  Transport(String),

  /// The body was not valid JSON or did not match the expected shape
  #[error("Failed to parse response: {0}")]
  Parse(#[from] serde_json::Error),
}

/// Credentials attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
  /// `Authorization: token <value>`
  Token(String),
  /// HTTP Basic with user and password
  Basic { user: String, password: String },
}

/// Method, headers and credentials of a request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub headers: Vec<(String, String)>,
  pub auth: Option<Auth>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::GET,
      headers: Vec::new(),
      auth: None,
    }
  }
}

impl RequestOptions {
  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn auth(mut self, auth: Auth) -> Self {
    self.auth = Some(auth);
    self
  }
}

/// A request descriptor: where to go, how, and which cache namespace owns the answer.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: String,
  pub options: RequestOptions,
  pub service: Service,
}

impl Request {
  pub fn get(url: impl Into<String>, service: Service) -> Self {
    Self {
      url: url.into(),
      options: RequestOptions::default(),
      service,
    }
  }

  pub fn with_options(mut self, options: RequestOptions) -> Self {
    self.options = options;
    self
  }
}

/// Status and body as received from the network.
#[derive(Debug, Clone)]
pub struct RawResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl RawResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Something that can perform one HTTP exchange.
pub trait Transport: Send + Sync {
  fn send(
    &self,
    url: &str,
    options: &RequestOptions,
  ) -> impl Future<Output = Result<RawResponse, FetchError>> + Send;
}

/// `Transport` backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> color_eyre::Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("tabdash/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }
}

impl Transport for HttpTransport {
  async fn send(&self, url: &str, options: &RequestOptions) -> Result<RawResponse, FetchError> {
    let mut request = self.client.request(options.method.clone(), url);
    for (name, value) in &options.headers {
      request = request.header(name.as_str(), value.as_str());
    }
    request = match &options.auth {
      Some(Auth::Token(token)) => request.header("Authorization", format!("token {}", token)),
      Some(Auth::Basic { user, password }) => request.basic_auth(user, Some(password)),
      None => request,
    };

    let response = request
      .send()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;

    Ok(RawResponse {
      status,
      body: body.to_vec(),
    })
  }
}

/// Response shape handed back to callers, identical for hits and fresh fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
  pub ok: bool,
  pub status: u16,
  body: Value,
}

impl CachedResponse {
  fn from_payload(body: Value) -> Self {
    Self {
      ok: true,
      status: 200,
      body,
    }
  }

  /// Decode the payload into `T`.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
    Ok(T::deserialize(&self.body)?)
  }
}

/// Wraps a `Transport` with the cache store.
///
/// Each call performs at most one network request. Concurrent misses on the same
/// key are not collapsed; each one goes to the network.
#[derive(Clone)]
pub struct CachedFetcher<T: Transport> {
  store: CacheStore,
  transport: T,
}

impl<T: Transport> CachedFetcher<T> {
  pub fn new(store: CacheStore, transport: T) -> Self {
    Self { store, transport }
  }

  #[cfg(test)]
  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Serve `request` from cache, or fetch it and populate the cache.
  pub async fn fetch_with_cache(&self, request: &Request) -> Result<CachedResponse, FetchError> {
    let key = self.store.key(&request.url, request.service);

    if let Some(data) = self.store.get(&key, request.service) {
      debug!("Cache hit for {}", key);
      return Ok(CachedResponse::from_payload(data));
    }

    match self.fetch_fresh(request).await {
      Ok(data) => {
        self.store.set(&key, data.clone(), request.service);
        Ok(CachedResponse::from_payload(data))
      }
      Err(e) => {
        error!("Fetch error for {}: {}", request.url, e);
        self.store.notify(CacheChange::FetchFailed(request.service));
        Err(e)
      }
    }
  }

  async fn fetch_fresh(&self, request: &Request) -> Result<Value, FetchError> {
    let response = self.transport.send(&request.url, &request.options).await?;
    if !response.is_success() {
      return Err(FetchError::Status(response.status));
    }
    Ok(serde_json::from_slice(&response.body)?)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::cache::policy::PolicyTable;
  use crate::cache::storage::MemoryStorage;
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  /// Transport answering from a fixed table and counting calls.
  #[derive(Default)]
  pub struct MockTransport {
    pub calls: AtomicUsize,
    routes: Mutex<HashMap<String, (u16, String)>>,
    pub seen: Mutex<Vec<RequestOptions>>,
  }

  impl MockTransport {
    pub fn route(self, url: &str, status: u16, body: &str) -> Self {
      self
        .routes
        .lock()
        .unwrap()
        .insert(url.to_string(), (status, body.to_string()));
      self
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl Transport for MockTransport {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<RawResponse, FetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.seen.lock().unwrap().push(options.clone());
      let route = self.routes.lock().unwrap().get(url).cloned();
      match route {
        Some((status, body)) => Ok(RawResponse {
          status,
          body: body.into_bytes(),
        }),
        None => Err(FetchError::Transport(format!("connection refused: {}", url))),
      }
    }
  }

  impl Transport for Arc<MockTransport> {
    async fn send(&self, url: &str, options: &RequestOptions) -> Result<RawResponse, FetchError> {
      self.as_ref().send(url, options).await
    }
  }

  pub fn fetcher(transport: MockTransport) -> (CachedFetcher<Arc<MockTransport>>, Arc<MockTransport>) {
    let store = CacheStore::new(Arc::new(MemoryStorage::new()), PolicyTable::default())
      .with_clock(Arc::new(ManualClock::at(1_700_000_000_000)));
    let transport = Arc::new(transport);
    (CachedFetcher::new(store, transport.clone()), transport)
  }

  const URL: &str = "https://api.github.com/search/issues?q=is:pr";

  #[tokio::test]
  async fn test_second_call_is_served_from_cache() {
    let (fetcher, transport) =
      fetcher(MockTransport::default().route(URL, 200, r#"{"total_count":2}"#));
    let request = Request::get(URL, Service::GitHub);

    let first = fetcher.fetch_with_cache(&request).await.unwrap();
    let second = fetcher.fetch_with_cache(&request).await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert!(second.ok);
    assert_eq!(second.status, 200);
    assert_eq!(first, second);
    assert_eq!(second.json::<Value>().unwrap(), json!({"total_count": 2}));
  }

  #[tokio::test]
  async fn test_error_status_is_not_cached() {
    let (fetcher, transport) = fetcher(MockTransport::default().route(URL, 401, "{}"));
    let request = Request::get(URL, Service::GitHub);

    let err = fetcher.fetch_with_cache(&request).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(401)));
    assert_eq!(err.to_string(), "HTTP error! status: 401");

    let key = fetcher.store().key(URL, Service::GitHub);
    assert_eq!(fetcher.store().get(&key, Service::GitHub), None);

    // Next call goes to the network again
    let _ = fetcher.fetch_with_cache(&request).await;
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_transport_failure_notifies_and_propagates() {
    let (fetcher, _) = fetcher(MockTransport::default());
    let mut rx = fetcher.store().subscribe();

    let err = fetcher
      .fetch_with_cache(&Request::get("https://nowhere", Service::Jira))
      .await
      .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));

    // Read from the miss, then the failure
    assert_eq!(rx.try_recv().unwrap(), CacheChange::Read);
    assert_eq!(rx.try_recv().unwrap(), CacheChange::FetchFailed(Service::Jira));
  }

  #[tokio::test]
  async fn test_unparsable_body_is_not_cached() {
    let (fetcher, transport) = fetcher(MockTransport::default().route(URL, 200, "<html>"));
    let request = Request::get(URL, Service::GitHub);

    assert!(matches!(
      fetcher.fetch_with_cache(&request).await,
      Err(FetchError::Parse(_))
    ));
    let _ = fetcher.fetch_with_cache(&request).await;
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_services_do_not_share_entries() {
    let (fetcher, transport) = fetcher(MockTransport::default().route(URL, 200, "[]"));

    fetcher
      .fetch_with_cache(&Request::get(URL, Service::GitHub))
      .await
      .unwrap();
    fetcher
      .fetch_with_cache(&Request::get(URL, Service::Jira))
      .await
      .unwrap();

    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_options_reach_transport() {
    let (fetcher, transport) = fetcher(MockTransport::default().route(URL, 200, "{}"));
    let options = RequestOptions::default()
      .header("Accept", "application/json")
      .auth(Auth::Token("abc".into()));

    fetcher
      .fetch_with_cache(&Request::get(URL, Service::GitHub).with_options(options))
      .await
      .unwrap();

    let seen = transport.seen.lock().unwrap();
    assert_eq!(
      seen[0].headers,
      vec![("Accept".to_string(), "application/json".to_string())]
    );
    assert_eq!(seen[0].auth, Some(Auth::Token("abc".into())));
  }

  #[test]
  fn test_json_decodes_payload() {
    #[derive(serde::Deserialize)]
    struct Count {
      total_count: u32,
    }
    let response = CachedResponse::from_payload(json!({"total_count": 7}));
    assert_eq!(response.json::<Count>().unwrap().total_count, 7);
    assert!(response.json::<Vec<u8>>().is_err());
  }
}
