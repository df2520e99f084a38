//! TUI rendering. Header with statistics, list and detail panes, status bar.

pub mod subject_detail;
pub mod subject_list;

use chrono::Local;
use keti_core::subject::Status;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Screen};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

/// Badge colour per lifecycle state, shared by both panes.
pub fn status_color(status: Status) -> Color {
  match status {
    Status::Preparing => Color::Yellow,
    Status::Launched => Color::Green,
    Status::Finished => Color::Blue,
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let stats = app.dashboard.stats();
  let bold = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

  let mut spans = vec![
    Span::styled(" keti ", bold),
    Span::raw(format!(" {} subjects  ", stats.total)),
    Span::styled(
      format!("{} preparing  ", stats.preparing),
      Style::default().fg(status_color(Status::Preparing)),
    ),
    Span::styled(
      format!("{} in progress  ", stats.launched),
      Style::default().fg(status_color(Status::Launched)),
    ),
    Span::styled(
      format!("{} finished  ", stats.finished),
      Style::default().fg(status_color(Status::Finished)),
    ),
  ];
  if stats.due_soon > 0 {
    spans.push(Span::styled(
      format!("{} due soon", stats.due_soon),
      Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ));
  }

  let user = app
    .session
    .state()
    .user
    .as_ref()
    .map(|u| format!("{} ({})  ", u.username, u.role))
    .unwrap_or_else(|| "signed out  ".into());
  let right = format!("{user}{} ", Local::now().format("%Y-%m-%d"));

  let left_width: usize = spans.iter().map(|s| s.content.chars().count()).sum();
  let pad = (area.width as usize)
    .saturating_sub(left_width)
    .saturating_sub(right.chars().count());
  spans.push(Span::raw(" ".repeat(pad)));
  spans.push(Span::styled(right, Style::default().fg(Color::Gray)));

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
    .split(area);

  subject_list::draw(f, cols[0], app);

  if app.selected_subject().is_some() {
    subject_detail::draw(f, cols[1], app);
  } else {
    draw_empty_detail(f, cols[1]);
  }
}

fn draw_empty_detail(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Detail ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new("Select a subject and press Enter.")
      .style(Style::default().fg(Color::DarkGray)),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.screen {
    _ if app.pending_delete.is_some() => ("CONFIRM", "y delete  any other key cancels"),
    Screen::SubjectList if app.search_active => {
      ("SEARCH", "Type to filter  Esc clear  Enter keep")
    }
    Screen::SubjectList => (
      "NORMAL",
      "jk move  / search  s status  o sort  r order  p advance  x delete  R reload  q quit",
    ),
    Screen::SubjectDetail => (
      "DETAIL",
      "jk scroll  [ ] prev/next  p advance  x delete  Esc back  q quit",
    ),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let line = Line::from(vec![
    Span::styled(
      format!(" {mode_label} "),
      Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("  {status}"), Style::default().fg(Color::Gray)),
  ]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
