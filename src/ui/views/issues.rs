use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use crate::app::SectionStatus;
use crate::jira::types::Issue;
use crate::ui::renderfns::{format_days, issue_age_color, priority_color, status_color, truncate};

pub fn draw_issues(
  frame: &mut Frame,
  area: Rect,
  status: &SectionStatus,
  issues: &[Issue],
  remaining: usize,
  now: DateTime<Utc>,
) {
  let title = match status {
    SectionStatus::Loading => " Jira (loading...) ".to_string(),
    SectionStatus::Connected => format!(" Jira ({}) ", issues.len() + remaining),
    _ => " Jira ".to_string(),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let message = match status {
    SectionStatus::Error(msg) => Some((msg.as_str(), Color::Red)),
    SectionStatus::Unconfigured(msg) => Some((msg.as_str(), Color::DarkGray)),
    SectionStatus::Loading if issues.is_empty() => Some(("Loading...", Color::DarkGray)),
    SectionStatus::Connected if issues.is_empty() => Some(("No issues assigned to you.", Color::DarkGray)),
    _ => None,
  };
  if let Some((content, color)) = message {
    let paragraph = Paragraph::new(content)
      .block(block)
      .wrap(Wrap { trim: true })
      .style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
    return;
  }

  let width = area.width.saturating_sub(44) as usize;
  let mut items: Vec<ListItem> = issues
    .iter()
    .map(|issue| {
      let age_span = match (issue.age_days(now), issue.age(now)) {
        (Some(days), Some(age)) => Span::styled(
          format!("{:>5} ", format_days(days)),
          Style::default().fg(issue_age_color(age)),
        ),
        _ => Span::raw("      "),
      };

      let line = Line::from(vec![
        Span::styled(
          format!("{:<6}", truncate(issue.priority_label(), 6)),
          Style::default().fg(priority_color(issue.priority)),
        ),
        Span::styled(
          format!("{:<12}", issue.key),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(
          format!("{:<12} ", truncate(&issue.status, 12)),
          Style::default().fg(status_color(&issue.status)),
        ),
        age_span,
        Span::raw(truncate(&issue.summary, width)),
      ]);
      ListItem::new(line)
    })
    .collect();

  if remaining > 0 {
    items.push(ListItem::new(Line::from(Span::styled(
      format!("  {} more - press m", remaining),
      Style::default().fg(Color::DarkGray).italic(),
    ))));
  }

  frame.render_widget(List::new(items).block(block), area);
}
