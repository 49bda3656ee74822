use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::links::{initials, Favicon, Link};
use crate::ui::renderfns::truncate;

/// Quick links in a single row, each with its badge or a globe marker
pub fn draw_links(frame: &mut Frame, area: Rect, links: &[(Link, Favicon)]) {
  let block = Block::default()
    .title(" Links ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let mut spans = Vec::new();
  for (link, favicon) in links {
    let icon = match favicon {
      Favicon::Badge(badge) => {
        let (r, g, b) = badge.rgb();
        Span::styled(
          format!(" {:<2} ", badge.letters),
          Style::default().fg(Color::White).bg(Color::Rgb(r, g, b)).bold(),
        )
      }
      Favicon::Url(_) => Span::styled(
        format!(" {:<2} ", initials(&link.title)),
        Style::default().fg(Color::Cyan),
      ),
    };
    spans.push(icon);
    spans.push(Span::raw(format!(" {}   ", truncate(&link.title, 20))));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
