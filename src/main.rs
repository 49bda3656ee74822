mod app;
mod cache;
mod config;
mod event;
mod github;
mod jira;
mod links;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::cache::{CacheStore, KeyValueStore, MemoryStorage, NoopStorage, Service, SqliteStorage};
use crate::config::{CacheBackend, Config};

#[derive(Parser, Debug)]
#[command(name = "tabdash")]
#[command(about = "A terminal dashboard for your pull requests, Jira issues and links")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./tabdash.yaml or $XDG_CONFIG_HOME/tabdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Inspect or clear the response cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show per-service cache freshness
  Status,
  /// Remove cached entries
  Clear {
    /// Only clear this service (github, jira or favicon); data services otherwise
    #[arg(short, long)]
    service: Option<Service>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let store = open_store(&config)?;

  match args.command {
    Some(Command::Cache { action }) => run_cache_command(&store, action),
    None => {
      // Initialize and run the app
      let mut app = app::App::new(config, store)?;
      app.run().await
    }
  }
}

/// Log to a file in the data directory; the terminal belongs to the dashboard.
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("tabdash");
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "tabdash.log"));
  let filter = EnvFilter::try_from_env("TABDASH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  Registry::default()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn open_store(config: &Config) -> Result<CacheStore> {
  let storage: Arc<dyn KeyValueStore> = match config.cache.backend {
    CacheBackend::Sqlite => Arc::new(SqliteStorage::open()?),
    CacheBackend::Memory => Arc::new(MemoryStorage::new()),
    CacheBackend::None => Arc::new(NoopStorage),
  };
  info!("Using {:?} cache backend", config.cache.backend);
  Ok(CacheStore::new(storage, config.cache.policies()))
}

fn run_cache_command(store: &CacheStore, action: CacheAction) -> Result<()> {
  match action {
    CacheAction::Status => {
      for (service, status) in store.status() {
        let updated = status
          .last_updated_at()
          .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
          .unwrap_or_else(|| "never".to_string());
        let state = if status.is_valid { "valid" } else { "stale" };
        println!(
          "{:<8} {:>3} entries  last updated {}  ({})",
          service, status.entries, updated, state
        );
      }
    }
    CacheAction::Clear { service: Some(Service::Favicon) } => {
      store.clear_favicon_cache();
      println!("Cleared favicon cache");
    }
    CacheAction::Clear { service: Some(service) } => {
      store.clear_service(service);
      println!("Cleared {} cache", service);
    }
    CacheAction::Clear { service: None } => {
      store.clear_all();
      println!("Cleared github and jira caches");
    }
  }
  Ok(())
}
