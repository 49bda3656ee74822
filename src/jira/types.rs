use chrono::{DateTime, Utc};

/// An issue assigned to the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
  pub key: String,
  pub summary: String,
  pub status: String,
  pub priority: Priority,
  /// Priority name as configured in Jira
  pub priority_name: String,
  pub created: Option<DateTime<Utc>>,
  pub updated: Option<DateTime<Utc>>,
  /// Browse link on the Jira site
  pub url: String,
}

/// Normalized issue priority, most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
  P0,
  P0_5,
  P1,
  P2,
  P3,
  P4,
  Highest,
  High,
  Medium,
  Low,
  Lowest,
  Other,
}

impl Priority {
  /// Classify a Jira priority name. P-levels ("P1", "P-1", "P0.5 - Urgent") win over words.
  pub fn classify(name: &str) -> Self {
    let name = name.trim();
    let normalized = name.to_ascii_uppercase().replace("P-", "P");
    let level = normalized
      .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
      .map(|token| token.trim_end_matches('.'))
      .find_map(|token| match token {
        "P0" => Some(Priority::P0),
        "P0.5" => Some(Priority::P0_5),
        "P1" => Some(Priority::P1),
        "P2" => Some(Priority::P2),
        "P3" => Some(Priority::P3),
        "P4" => Some(Priority::P4),
        _ => None,
      });
    if let Some(level) = level {
      return level;
    }

    let lower = name.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["highest", "critical", "blocker"]) {
      Priority::Highest
    } else if has(&["lowest", "trivial"]) {
      Priority::Lowest
    } else if has(&["high", "major"]) {
      Priority::High
    } else if has(&["medium", "normal"]) {
      Priority::Medium
    } else if has(&["low", "minor"]) {
      Priority::Low
    } else {
      Priority::Other
    }
  }

  /// Sort rank; P-levels and word priorities share a scale.
  pub fn rank(&self) -> u32 {
    match self {
      Priority::P0 | Priority::Highest => 0,
      Priority::P0_5 => 1,
      Priority::P1 | Priority::High => 2,
      Priority::P2 | Priority::Medium => 3,
      Priority::P3 | Priority::Low => 4,
      Priority::P4 | Priority::Lowest => 5,
      Priority::Other => 999,
    }
  }

  /// Short badge text. `None` means show the raw Jira name.
  pub fn short_label(&self) -> Option<&'static str> {
    match self {
      Priority::P0 => Some("P0"),
      Priority::P0_5 => Some("P0.5"),
      Priority::P1 => Some("P1"),
      Priority::P2 => Some("P2"),
      Priority::P3 => Some("P3"),
      Priority::P4 => Some("P4"),
      Priority::Highest => Some("Highest"),
      Priority::High => Some("High"),
      Priority::Medium => Some("Med"),
      Priority::Low => Some("Low"),
      Priority::Lowest => Some("Lowest"),
      Priority::Other => None,
    }
  }
}

/// How long ago an issue was created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAge {
  /// Today or yesterday
  Today,
  /// Within 30 days
  Recent,
  Old,
  VeryOld,
}

impl Issue {
  pub fn age_days(&self, now: DateTime<Utc>) -> Option<i64> {
    self.created.map(|c| (now - c).num_days())
  }

  pub fn age(&self, now: DateTime<Utc>) -> Option<IssueAge> {
    self.age_days(now).map(|days| match days {
      d if d <= 1 => IssueAge::Today,
      d if d <= 30 => IssueAge::Recent,
      d if d <= 356 => IssueAge::Old,
      _ => IssueAge::VeryOld,
    })
  }

  pub fn priority_label(&self) -> &str {
    self.priority.short_label().unwrap_or(self.priority_name.as_str())
  }
}

/// Order by priority rank, then most recently updated first.
pub fn sort_issues(issues: &mut [Issue]) {
  issues.sort_by(|a, b| {
    a.priority
      .rank()
      .cmp(&b.priority.rank())
      .then_with(|| b.updated.cmp(&a.updated))
  });
}
