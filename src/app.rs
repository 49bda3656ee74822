use crate::cache::{CacheStore, CacheTimer, CachedFetcher, HttpTransport, TimerDisplay, Transport};
use crate::config::Config;
use crate::event::{DataEvent, Event, EventHandler};
use crate::github::client::GitHubClient;
use crate::github::types::PullRequests;
use crate::jira::client::JiraClient;
use crate::jira::types::Issue;
use crate::links::{resolve_favicon, Favicon, Link};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Issues revealed per "more" request
const JIRA_LOAD_MORE_COUNT: usize = 10;

/// Connection state of a data section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionStatus {
  Loading,
  Connected,
  Error(String),
  /// Credentials or settings are missing; the message says what to set
  Unconfigured(String),
}

fn initial_limit(config: &Config) -> usize {
  config.jira.as_ref().map_or(6, |j| j.initial_limit)
}

/// API tokens, each either present or the reason it is missing
pub struct Credentials {
  pub github: Result<String>,
  pub jira: Result<String>,
}

impl Credentials {
  pub fn from_env() -> Self {
    Self {
      github: Config::get_github_token(),
      jira: Config::get_jira_token(),
    }
  }
}

/// Main application state
pub struct App<T: Transport = HttpTransport> {
  /// Application configuration
  config: Config,

  /// Shared cache behind both clients
  store: CacheStore,

  github: Option<GitHubClient<T>>,
  github_status: SectionStatus,
  pull_requests: PullRequests,

  jira: Option<JiraClient<T>>,
  jira_status: SectionStatus,
  issues: Vec<Issue>,
  /// How many issues are currently revealed
  jira_shown: usize,

  links: Vec<(Link, Favicon)>,

  /// Latest TTL indicator
  timer: watch::Receiver<TimerDisplay>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, store: CacheStore) -> Result<Self> {
    Ok(Self::with_transport(
      config,
      store,
      HttpTransport::new()?,
      Credentials::from_env(),
    ))
  }
}

impl<T: Transport + Clone + 'static> App<T> {
  pub fn with_transport(config: Config, store: CacheStore, transport: T, credentials: Credentials) -> Self {
    let fetcher = CachedFetcher::new(store.clone(), transport);

    let (github, github_status) = match &config.github {
      None => (
        None,
        SectionStatus::Unconfigured(
          "Please configure your GitHub credentials to see your pull requests".to_string(),
        ),
      ),
      Some(gh) => match credentials.github {
        Ok(token) => (
          Some(GitHubClient::new(fetcher.clone(), &gh.username, token)),
          SectionStatus::Loading,
        ),
        Err(e) => (None, SectionStatus::Unconfigured(e.to_string())),
      },
    };

    let (jira, jira_status) = match &config.jira {
      None => (
        None,
        SectionStatus::Unconfigured(
          "Please configure your Jira credentials to see your issues".to_string(),
        ),
      ),
      Some(j) if !j.visible => (None, SectionStatus::Unconfigured("Jira is hidden".to_string())),
      Some(j) => match credentials.jira {
        Ok(token) => match JiraClient::new(fetcher, j, token) {
          Ok(client) => (Some(client), SectionStatus::Loading),
          Err(e) => (None, SectionStatus::Error(e.to_string())),
        },
        Err(e) => (None, SectionStatus::Unconfigured(e.to_string())),
      },
    };

    let jira_shown = initial_limit(&config);
    let links = config
      .links
      .iter()
      .map(|link| (link.clone(), resolve_favicon(&store, link)))
      .collect();
    let (tx, _rx) = mpsc::unbounded_channel();
    let (_, timer) = watch::channel(TimerDisplay::default());

    Self {
      config,
      store,
      github,
      github_status,
      pull_requests: PullRequests::default(),
      jira,
      jira_status,
      issues: Vec::new(),
      jira_shown,
      links,
      timer,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Countdown runs every second and after every cache change
    let timer = CacheTimer::new(self.store.clone());
    self.timer = timer.subscribe();
    let mut timer_handle = timer.spawn(Duration::from_secs(1));

    // Initial data load
    self.load_github();
    self.load_jira();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    timer_handle.stop().await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  fn load_github(&self) {
    if let Some(github) = &self.github {
      let github = github.clone();
      let tx = self.event_tx.clone();

      tokio::spawn(async move {
        let event = match github.pull_requests().await {
          Ok(prs) => DataEvent::GitHubLoaded(prs),
          Err(e) => DataEvent::GitHubFailed(format!("Error fetching PRs: {}", e)),
        };
        let _ = tx.send(Event::Data(event));
      });
    }
  }

  fn load_jira(&self) {
    if let Some(jira) = &self.jira {
      let jira = jira.clone();
      let tx = self.event_tx.clone();

      tokio::spawn(async move {
        let event = match jira.assigned_issues().await {
          Ok(issues) => DataEvent::JiraLoaded(issues),
          Err(e) => DataEvent::JiraFailed(format!("Error fetching issues: {}", e)),
        };
        let _ = tx.send(Event::Data(event));
      });
    }
  }

  /// Drop cached data and reload every configured section independently.
  pub fn refresh(&mut self) {
    info!("Manual refresh requested");
    self.store.clear_all();

    if self.github.is_some() {
      self.github_status = SectionStatus::Loading;
      self.load_github();
    }
    if self.jira.is_some() {
      self.jira_status = SectionStatus::Loading;
      self.load_jira();
    }
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Data(data) => self.handle_data_event(data),
    }
  }

  fn handle_data_event(&mut self, event: DataEvent) {
    match event {
      DataEvent::GitHubLoaded(prs) => {
        self.pull_requests = prs;
        self.github_status = SectionStatus::Connected;
      }
      DataEvent::GitHubFailed(msg) => {
        warn!("{}", msg);
        self.github_status = SectionStatus::Error(msg);
      }
      DataEvent::JiraLoaded(issues) => {
        self.issues = issues;
        self.jira_status = SectionStatus::Connected;
        self.jira_shown = initial_limit(&self.config);
      }
      DataEvent::JiraFailed(msg) => {
        warn!("{}", msg);
        self.jira_status = SectionStatus::Error(msg);
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('m') => self.show_more_issues(),
      _ => {}
    }
  }

  pub fn show_more_issues(&mut self) {
    if self.jira_shown < self.issues.len() {
      self.jira_shown = (self.jira_shown + JIRA_LOAD_MORE_COUNT).min(self.issues.len());
    }
  }
}

// Accessors for UI
impl<T: Transport> App<T> {
  pub fn title(&self) -> &str {
    self.config.title.as_deref().unwrap_or("tabdash")
  }

  pub fn timer_display(&self) -> TimerDisplay {
    *self.timer.borrow()
  }

  pub fn github_status(&self) -> &SectionStatus {
    &self.github_status
  }

  pub fn github_username(&self) -> Option<&str> {
    self.github.as_ref().map(|g| g.username())
  }

  pub fn pull_requests(&self) -> &PullRequests {
    &self.pull_requests
  }

  pub fn jira_status(&self) -> &SectionStatus {
    &self.jira_status
  }

  /// Issues revealed so far and how many remain hidden.
  pub fn visible_issues(&self) -> (&[Issue], usize) {
    let shown = self.jira_shown.min(self.issues.len());
    (&self.issues[..shown], self.issues.len() - shown)
  }

  pub fn links(&self) -> &[(Link, Favicon)] {
    &self.links
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fetcher_tests::MockTransport;
  use crate::cache::{MemoryStorage, PolicyTable, Service};
  use crate::config::{GitHubConfig, JiraConfig};
  use crate::github::client::PrQuery;
  use crate::jira::client::ASSIGNED_JQL;
  use crate::jira::types::Priority;
  use std::sync::Arc;

  fn store() -> CacheStore {
    CacheStore::new(Arc::new(MemoryStorage::new()), PolicyTable::default())
  }

  fn issue(n: usize) -> Issue {
    Issue {
      key: format!("A-{}", n),
      summary: String::new(),
      status: "To Do".into(),
      priority: Priority::Other,
      priority_name: String::new(),
      created: None,
      updated: None,
      url: String::new(),
    }
  }

  #[test]
  fn test_unconfigured_sections() {
    let app = App::new(Config::default(), store()).unwrap();
    assert!(matches!(app.github_status(), SectionStatus::Unconfigured(_)));
    assert!(matches!(app.jira_status(), SectionStatus::Unconfigured(_)));
    assert_eq!(app.links().len(), 2);
    assert_eq!(app.title(), "tabdash");
  }

  #[test]
  fn test_show_more_issues() {
    let config = Config {
      jira: Some(JiraConfig {
        domain: "acme.atlassian.net".into(),
        email: "me@acme.com".into(),
        initial_limit: 3,
        visible: false,
      }),
      ..Config::default()
    };
    let mut app = App::new(config, store()).unwrap();
    app.handle_data_event(DataEvent::JiraLoaded((0..15).map(issue).collect()));

    assert_eq!(app.jira_status(), &SectionStatus::Connected);
    let (shown, remaining) = app.visible_issues();
    assert_eq!((shown.len(), remaining), (3, 12));

    app.show_more_issues();
    assert_eq!(app.visible_issues().1, 2);

    app.show_more_issues();
    assert_eq!(app.visible_issues(), (&app.issues[..], 0));
  }

  #[test]
  fn test_failed_load_sets_error_status() {
    let mut app = App::new(Config::default(), store()).unwrap();
    app.handle_data_event(DataEvent::GitHubFailed("Error fetching PRs: boom".into()));
    assert_eq!(
      app.github_status(),
      &SectionStatus::Error("Error fetching PRs: boom".into())
    );
  }

  #[test]
  fn test_refresh_clears_data_cache() {
    let store = store();
    let key = store.key("u", Service::GitHub);
    store.set(&key, serde_json::json!(1), Service::GitHub);

    let mut app = App::new(Config::default(), store.clone()).unwrap();
    app.handle_key(KeyEvent::from(KeyCode::Char('r')));

    assert_eq!(store.get(&key, Service::GitHub), None);
    // Unconfigured sections are not flipped to loading
    assert!(matches!(app.github_status(), SectionStatus::Unconfigured(_)));
  }

  #[tokio::test]
  async fn test_refresh_resolves_sections_independently() {
    let jira_url = url::Url::parse_with_params(
      "https://acme.atlassian.net/rest/api/2/search",
      &[("jql", ASSIGNED_JQL)],
    )
    .unwrap()
    .to_string();
    let jira_body = r#"{"total":1,"issues":[{"key":"ACME-1","fields":{"summary":"Fix it","status":{"name":"To Do"},"priority":{"name":"High"}}}]}"#;
    let transport = Arc::new(
      MockTransport::default()
        .route(&PrQuery::Authored.url("octocat"), 500, "{}")
        .route(&jira_url, 200, jira_body),
    );

    let config = Config {
      github: Some(GitHubConfig {
        username: "octocat".into(),
      }),
      jira: Some(JiraConfig {
        domain: "acme.atlassian.net".into(),
        email: "me@acme.com".into(),
        initial_limit: 6,
        visible: true,
      }),
      ..Config::default()
    };
    let credentials = Credentials {
      github: Ok("gh-token".into()),
      jira: Ok("jira-token".into()),
    };

    let store = store();
    let stale = store.key("stale", Service::Jira);
    store.set(&stale, serde_json::json!(1), Service::Jira);

    let mut app = App::with_transport(config, store.clone(), transport, credentials);
    let (tx, mut rx) = mpsc::unbounded_channel();
    app.event_tx = tx;
    app.handle_data_event(DataEvent::GitHubFailed("earlier failure".into()));

    app.refresh();
    assert_eq!(app.github_status(), &SectionStatus::Loading);
    assert_eq!(app.jira_status(), &SectionStatus::Loading);
    assert_eq!(store.get(&stale, Service::Jira), None);

    for _ in 0..2 {
      let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("section did not report")
        .unwrap();
      app.handle_event(event);
    }

    assert!(matches!(app.github_status(), SectionStatus::Error(msg) if msg.contains("500")));
    assert_eq!(app.jira_status(), &SectionStatus::Connected);
    let (issues, remaining) = app.visible_issues();
    assert_eq!(remaining, 0);
    assert_eq!(issues[0].key, "ACME-1");
  }

  #[test]
  fn test_quit_keys() {
    let mut app = App::new(Config::default(), store()).unwrap();
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }
}
