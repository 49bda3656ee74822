use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::cache::TimerDisplay;

/// Draw the header bar with title, cache countdown, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, title: &str, timer: TimerDisplay) {
  let mut timer_style = Style::default().fg(Color::DarkGray);
  if timer.is_italic() {
    timer_style = timer_style.italic();
  }

  let mut spans = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];
  let label = timer.label();
  if !label.is_empty() {
    spans.push(Span::styled(format!(" {} ", label), timer_style));
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
  }
  spans.extend([
    Span::raw("  "),
    // Shortcuts - keys and brackets highlighted, descriptions dimmed
    Span::styled("<r>", Style::default().fg(Color::Cyan)),
    Span::styled(" refresh", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<m>", Style::default().fg(Color::Cyan)),
    Span::styled(" more issues", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" quit", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}
