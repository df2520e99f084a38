//! Subject detail pane, right panel.

use chrono::Utc;
use keti_core::{
  achievement::Achievement,
  progress::{displayed_progress, is_due_soon, is_overdue},
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Gauge, Paragraph},
};

use super::status_color;
use crate::app::App;

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render the detail pane into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(view) = app.selected_subject() else {
    return;
  };
  let subject = &view.subject;
  let now = Utc::now();

  let block = Block::default()
    .title(format!(" {} ", subject.title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let mut lines = vec![
    field("status", Span::styled(
      subject.status.label(),
      Style::default().fg(status_color(subject.status)),
    )),
    field("owner", Span::raw(view.owner_name.clone().unwrap_or_else(|| "—".into()))),
    field("kickoff", Span::raw(date_or_dash(subject.kickoff_date))),
    field("deadline", deadline_span(view, now)),
    field("created", Span::raw(subject.created_at.format("%Y-%m-%d %H:%M").to_string())),
    field("version", Span::raw(subject.version.to_string())),
    Line::from(""),
  ];

  // Progress gauge sits right below the fields.
  let gauge_row = lines.len() as u16;
  lines.push(Line::from(""));
  lines.push(Line::from(""));

  lines.push(Line::from(Span::styled(
    format!("Achievements ({})", app.achievements.len()),
    Style::default().add_modifier(Modifier::BOLD),
  )));
  if app.achievements.is_empty() {
    lines.push(Line::from(Span::styled(
      "None recorded.",
      Style::default().fg(Color::DarkGray),
    )));
  }
  lines.extend(app.achievements.iter().map(achievement_line));

  f.render_widget(
    Paragraph::new(lines).scroll((app.detail_scroll as u16, 0)),
    inner,
  );

  if gauge_row >= app.detail_scroll as u16 {
    let y = inner.y + gauge_row - app.detail_scroll as u16;
    if y < inner.y + inner.height {
      let percent = displayed_progress(view, now);
      let gauge = Gauge::default()
        .gauge_style(Style::default().fg(status_color(subject.status)))
        .percent(u16::from(percent))
        .label(format!("{percent}%"));
      f.render_widget(gauge, Rect { x: inner.x, y, width: inner.width, height: 1 });
    }
  }
}

// ─── Formatting helpers ───────────────────────────────────────────────────────

fn field<'a>(label: &'static str, value: Span<'a>) -> Line<'a> {
  Line::from(vec![
    Span::styled(
      format!("{label:<10}"),
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ),
    value,
  ])
}

fn date_or_dash(date: Option<chrono::NaiveDate>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "—".into())
}

fn deadline_span(view: &keti_core::subject::SubjectView, now: chrono::DateTime<Utc>) -> Span<'static> {
  let text = date_or_dash(view.subject.deadline_date);
  if is_overdue(view, now) {
    Span::styled(format!("{text}  overdue"), Style::default().fg(Color::Red))
  } else if is_due_soon(view, now) {
    Span::styled(format!("{text}  due soon"), Style::default().fg(Color::LightRed))
  } else {
    Span::raw(text)
  }
}

fn achievement_line(a: &Achievement) -> Line<'static> {
  let mut spans = vec![
    Span::raw("• "),
    Span::raw(a.title.clone()),
  ];
  if let Some(kind) = &a.kind {
    spans.push(Span::styled(format!("  [{kind}]"), Style::default().fg(Color::Yellow)));
  }
  for path in [&a.doc_path, &a.pdf_path].into_iter().flatten() {
    spans.push(Span::styled(format!("  {path}"), Style::default().fg(Color::DarkGray)));
  }
  Line::from(spans)
}
