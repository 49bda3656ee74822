use ratatui::prelude::Color;

use crate::github::types::PrAge;
use crate::jira::types::{IssueAge, Priority};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a Jira issue status
pub fn status_color(status: &str) -> Color {
  match status {
    "Done" | "Closed" | "Resolved" => Color::Green,
    "In Progress" | "In Review" => Color::Yellow,
    _ => Color::White,
  }
}

pub fn priority_color(priority: Priority) -> Color {
  match priority {
    Priority::P0 | Priority::P0_5 | Priority::Highest => Color::Red,
    Priority::P1 | Priority::High => Color::LightRed,
    Priority::P2 | Priority::Medium => Color::Yellow,
    Priority::P3 | Priority::P4 | Priority::Low | Priority::Lowest => Color::Blue,
    Priority::Other => Color::DarkGray,
  }
}

pub fn pr_age_color(age: PrAge) -> Color {
  match age {
    PrAge::New => Color::Green,
    PrAge::Recent => Color::Yellow,
    PrAge::Old => Color::Red,
  }
}

pub fn issue_age_color(age: IssueAge) -> Color {
  match age {
    IssueAge::Today => Color::Green,
    IssueAge::Recent => Color::White,
    IssueAge::Old => Color::Yellow,
    IssueAge::VeryOld => Color::Red,
  }
}

/// Compact age such as "today" or "12d"
pub fn format_days(days: i64) -> String {
  if days < 1 {
    "today".to_string()
  } else {
    format!("{}d", days)
  }
}
