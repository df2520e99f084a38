//! Subject list pane, left panel.

use chrono::Utc;
use keti_core::progress::{displayed_progress, is_due_soon, is_overdue};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::status_color;
use crate::app::App;

/// Render the subject list into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let filters = app.dashboard.filters();
  let filtered = app.filtered_subjects();
  let total = app.dashboard.subjects().len();

  let title = format!(
    " Subjects ({}/{})  {} · {} {} ",
    filtered.len(),
    total,
    filters.status,
    filters.sort_by,
    filters.sort_order,
  );
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let now = Utc::now();
  let items: Vec<ListItem> = filtered
    .iter()
    .map(|&view| {
      let subject = &view.subject;
      let badge = Span::styled(
        format!("{:<11} ", subject.status.label()),
        Style::default().fg(status_color(subject.status)),
      );
      let deadline = subject
        .deadline_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "—".into());

      let mut spans = vec![
        badge,
        Span::raw(format!("{:>4}%  ", displayed_progress(view, now))),
        Span::styled(format!("{deadline:<10}  "), Style::default().fg(Color::Gray)),
        Span::raw(subject.title.clone()),
      ];
      if is_overdue(view, now) {
        spans.push(Span::styled(" overdue", Style::default().fg(Color::Red)));
      } else if is_due_soon(view, now) {
        spans.push(Span::styled(" due soon", Style::default().fg(Color::LightRed)));
      }
      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  // Search bar at the bottom of the pane.
  let search = &filters.search;
  if (app.search_active || !search.is_empty()) && inner_area.height > 2 {
    let search_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let text = if app.search_active {
      format!("/{search}_")
    } else {
      format!("/{search}")
    };
    f.render_widget(
      Paragraph::new(text).style(Style::default().fg(Color::Yellow)),
      search_area,
    );
  }

  if filtered.is_empty() {
    f.render_widget(
      Paragraph::new("No subjects match.").style(Style::default().fg(Color::DarkGray)),
      inner_area,
    );
    return;
  }

  let mut state = ListState::default();
  state.select(Some(app.list_cursor));

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    inner_area,
    &mut state,
  );
}
