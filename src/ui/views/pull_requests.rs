use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use crate::app::SectionStatus;
use crate::github::types::{PullRequest, PullRequests};
use crate::ui::renderfns::{format_days, pr_age_color, truncate};

pub fn draw_pull_requests(
  frame: &mut Frame,
  area: Rect,
  status: &SectionStatus,
  prs: &PullRequests,
  now: DateTime<Utc>,
) {
  let title = match status {
    SectionStatus::Loading => " GitHub (loading...) ".to_string(),
    SectionStatus::Connected => format!(" GitHub ({}) ", prs.total()),
    _ => " GitHub ".to_string(),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let message = match status {
    SectionStatus::Error(msg) => Some((msg.as_str(), Color::Red)),
    SectionStatus::Unconfigured(msg) => Some((msg.as_str(), Color::DarkGray)),
    SectionStatus::Loading if prs.total() == 0 => Some(("Loading...", Color::DarkGray)),
    SectionStatus::Connected if prs.total() == 0 && prs.mentions_count == 0 => {
      Some(("No open pull requests.", Color::DarkGray))
    }
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

  let width = area.width.saturating_sub(16) as usize;
  let mut items: Vec<ListItem> = Vec::new();
  let owned = prs.owned_only();
  let groups: [(&str, Vec<&PullRequest>); 3] = [
    ("Review requested", prs.to_review.iter().collect()),
    ("Assigned", prs.assigned.iter().collect()),
    ("Mine", owned),
  ];
  for (heading, group) in groups {
    if group.is_empty() {
      continue;
    }
    items.push(ListItem::new(Line::from(Span::styled(
      format!("{} ({})", heading, group.len()),
      Style::default().fg(Color::Cyan).bold(),
    ))));
    items.extend(group.into_iter().map(|pr| pr_item(pr, now, width)));
  }

  if prs.mentions_count > 0 {
    items.push(ListItem::new(Line::from(vec![
      Span::styled("Mentions ", Style::default().fg(Color::Cyan).bold()),
      Span::styled(
        prs.mentions_count.to_string(),
        Style::default().fg(Color::Yellow),
      ),
    ])));
  }

  frame.render_widget(List::new(items).block(block), area);
}

fn pr_item(pr: &PullRequest, now: DateTime<Utc>, width: usize) -> ListItem<'static> {
  let age = format_days(pr.days_since_created(now));
  let line = Line::from(vec![
    Span::styled(
      format!("  {:>5} ", age),
      Style::default().fg(pr_age_color(pr.age(now))),
    ),
    Span::styled(
      format!("{} ", truncate(&pr.repo, 24)),
      Style::default().fg(Color::DarkGray),
    ),
    Span::raw(truncate(&pr.title, width.saturating_sub(pr.repo.len().min(24)))),
  ]);
  ListItem::new(line)
}
