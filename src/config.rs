use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cache::PolicyTable;
use crate::links::{default_links, Link};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Custom title for header (defaults to "tabdash")
  pub title: Option<String>,
  pub github: Option<GitHubConfig>,
  pub jira: Option<JiraConfig>,
  #[serde(default = "default_links")]
  pub links: Vec<Link>,
  #[serde(default)]
  pub cache: CacheConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      title: None,
      github: None,
      jira: None,
      links: default_links(),
      cache: CacheConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
  pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  /// Site domain, e.g. "your-domain.atlassian.net". Scheme and trailing slash are ignored.
  pub domain: String,
  pub email: String,
  /// Issues shown before "more" is requested (1-100)
  #[serde(default = "default_initial_limit", deserialize_with = "deserialize_limit")]
  pub initial_limit: usize,
  /// Whether the Jira section is shown at all
  #[serde(default = "default_true")]
  pub visible: bool,
}

impl JiraConfig {
  /// Domain with any scheme and trailing slash stripped.
  pub fn domain(&self) -> &str {
    let domain = self.domain.trim();
    let domain = domain
      .strip_prefix("https://")
      .or_else(|| domain.strip_prefix("http://"))
      .unwrap_or(domain);
    domain.strip_suffix('/').unwrap_or(domain)
  }
}

fn default_initial_limit() -> usize {
  6
}

fn default_true() -> bool {
  true
}

fn deserialize_limit<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v = i64::deserialize(deserializer)?;
  Ok(v.clamp(1, 100) as usize)
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
  /// SQLite database in the data directory
  #[default]
  Sqlite,
  /// Process memory only; nothing survives a restart
  Memory,
  /// No caching - every request goes to the network
  None,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Lifetime of GitHub and Jira responses in seconds (1-86400)
  #[serde(default = "default_ttl_secs", deserialize_with = "deserialize_ttl")]
  pub ttl_secs: u64,
  #[serde(default)]
  pub backend: CacheBackend,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
      backend: CacheBackend::default(),
    }
  }
}

fn default_ttl_secs() -> u64 {
  300
}

const MAX_TTL_SECS: u64 = 86_400;

fn deserialize_ttl<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v = u64::deserialize(deserializer)?;
  Ok(v.clamp(1, MAX_TTL_SECS))
}

impl CacheConfig {
  pub fn policies(&self) -> PolicyTable {
    let secs = self.ttl_secs.clamp(1, MAX_TTL_SECS) as i64;
    let ttl = Duration::try_seconds(secs).unwrap_or_else(|| Duration::seconds(default_ttl_secs() as i64));
    PolicyTable::with_data_ttl(ttl)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tabdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tabdash/config.yaml
  ///
  /// Without any file the defaults are used and each section asks to be configured.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        info!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("tabdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tabdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
  }

  /// Get the GitHub token from environment variables.
  ///
  /// Checks TABDASH_GITHUB_TOKEN first, then GITHUB_TOKEN as fallback.
  pub fn get_github_token() -> Result<String> {
    std::env::var("TABDASH_GITHUB_TOKEN")
      .or_else(|_| std::env::var("GITHUB_TOKEN"))
      .map_err(|_| {
        eyre!("GitHub token not found. Set TABDASH_GITHUB_TOKEN or GITHUB_TOKEN environment variable.")
      })
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks TABDASH_JIRA_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_jira_token() -> Result<String> {
    std::env::var("TABDASH_JIRA_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!("Jira API token not found. Set TABDASH_JIRA_TOKEN or JIRA_API_TOKEN environment variable.")
      })
  }
}
