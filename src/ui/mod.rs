mod renderfns;
mod views;

use crate::app::{App, SectionStatus};
use crate::cache::Transport;
use chrono::Utc;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw<T: Transport>(frame: &mut Frame, app: &App<T>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Sections
      Constraint::Length(3), // Links
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.title(), app.timer_display());

  let sections = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
    .split(chunks[1]);

  let now = Utc::now();
  views::pull_requests::draw_pull_requests(
    frame,
    sections[0],
    app.github_status(),
    app.pull_requests(),
    now,
  );

  let (issues, remaining) = app.visible_issues();
  views::issues::draw_issues(frame, sections[1], app.jira_status(), issues, remaining, now);

  views::links::draw_links(frame, chunks[2], app.links());

  draw_status_bar(frame, chunks[3], app);
}

fn draw_status_bar<T: Transport>(frame: &mut Frame, area: Rect, app: &App<T>) {
  let mut spans = Vec::new();
  for (name, status) in [("GitHub", app.github_status()), ("Jira", app.jira_status())] {
    let (text, color) = status_text(status);
    spans.push(Span::styled(format!(" {}: ", name), Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(text, Style::default().fg(color)));
    spans.push(Span::raw(" "));
  }
  if let Some(user) = app.github_username() {
    spans.push(Span::styled(format!(" @{}", user), Style::default().fg(Color::DarkGray)));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn status_text(status: &SectionStatus) -> (&'static str, Color) {
  match status {
    SectionStatus::Loading => ("loading", Color::Yellow),
    SectionStatus::Connected => ("connected", Color::Green),
    SectionStatus::Error(_) => ("error", Color::Red),
    SectionStatus::Unconfigured(_) => ("not configured", Color::DarkGray),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, MemoryStorage, PolicyTable};
  use crate::config::Config;
  use ratatui::backend::TestBackend;
  use std::sync::Arc;

  #[test]
  fn test_draw_unconfigured_dashboard() {
    let store = CacheStore::new(Arc::new(MemoryStorage::new()), PolicyTable::default());
    let app = App::new(Config::default(), store).unwrap();

    let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
    terminal.draw(|frame| draw(frame, &app)).unwrap();

    let text: String = terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|c| c.symbol())
      .collect();
    assert!(text.contains("tabdash"));
    assert!(text.contains("ttl No cache"));
    assert!(text.contains(" GitHub "));
    assert!(text.contains(" Jira "));
    assert!(text.contains("Google"));
    assert!(text.contains("GitHub: not configured"));
  }
}
