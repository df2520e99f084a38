//! Application state machine and event dispatcher.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use keti_core::{
  Classify, Dashboard, ErrorKind, ResearchStore,
  achievement::Achievement,
  filter::{FiltersPatch, SortKey, StatusFilter},
  subject::{Status, SubjectPatch, SubjectView},
};
use strum::IntoEnumIterator;

use crate::{client::ApiClient, session::Session};

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the subject list; the right pane shows a hint or the last
  /// opened subject.
  SubjectList,
  /// Focus on the subject detail pane.
  SubjectDetail,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Current screen / keyboard focus.
  pub screen: Screen,

  /// Local copy of the subjects, statistics and view criteria.
  pub dashboard: Dashboard<ApiClient>,

  pub session: Session,

  /// Whether keystrokes are going into the search box.
  pub search_active: bool,

  /// Cursor position within the *filtered* subject list.
  pub list_cursor: usize,

  /// Scroll offset within the detail pane.
  pub detail_scroll: usize,

  /// Id of the subject shown in the detail pane.
  pub selected_id: Option<i64>,

  /// Achievements of the selected subject.
  pub achievements: Vec<Achievement>,

  /// Subject awaiting a `y` to be deleted.
  pub pending_delete: Option<i64>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,
}

impl App {
  pub fn new(client: ApiClient, session: Session) -> Self {
    Self {
      screen: Screen::SubjectList,
      dashboard: Dashboard::new(client),
      session,
      search_active: false,
      list_cursor: 0,
      detail_scroll: 0,
      selected_id: None,
      achievements: Vec::new(),
      pending_delete: None,
      status_msg: String::new(),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch subjects and statistics.
  pub async fn reload(&mut self) -> anyhow::Result<()> {
    match self.dashboard.reload().await {
      Ok(()) => {
        self.clamp_cursor();
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e.into())
      }
    }
  }

  async fn load_achievements(&mut self, subject_id: i64) {
    match self.dashboard.store().list_achievements(Some(subject_id)).await {
      Ok(list) => self.achievements = list,
      Err(e) => {
        self.achievements.clear();
        self.status_msg = format!("Error: {e}");
      }
    }
  }

  /// Apply queued session events. Returns `false` once the server has
  /// rejected our credentials.
  pub fn poll_session(&mut self) -> anyhow::Result<bool> {
    let was_signed_in = self.session.state().is_authenticated;
    if self.session.drain()? > 0 && was_signed_in && !self.session.state().is_authenticated {
      self.status_msg = "Signed out: the server rejected our credentials".into();
      return Ok(false);
    }
    Ok(true)
  }

  // ── Filtered list ─────────────────────────────────────────────────────────

  pub fn filtered_subjects(&self) -> Vec<&SubjectView> { self.dashboard.filtered() }

  /// The subject under the list cursor in the filtered view, if any.
  pub fn cursor_subject(&self) -> Option<&SubjectView> {
    self.filtered_subjects().get(self.list_cursor).copied()
  }

  pub fn selected_subject(&self) -> Option<&SubjectView> {
    self.selected_id.and_then(|id| self.dashboard.subject(id))
  }

  fn clamp_cursor(&mut self) {
    let len = self.filtered_subjects().len();
    self.list_cursor = self.list_cursor.min(len.saturating_sub(1));
  }

  fn set_filters(&mut self, patch: FiltersPatch) {
    self.dashboard.set_filters(patch);
    self.list_cursor = 0;
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if let Some(id) = self.pending_delete.take() {
      if key.code == KeyCode::Char('y') {
        self.delete(id).await;
      } else {
        self.status_msg = "Delete cancelled".into();
      }
      return Ok(true);
    }

    if self.search_active {
      self.handle_search_key(key);
      return Ok(true);
    }

    match self.screen {
      Screen::SubjectList => self.handle_list_key(key).await,
      Screen::SubjectDetail => self.handle_detail_key(key).await,
    }
  }

  fn handle_search_key(&mut self, key: KeyEvent) {
    let mut search = self.dashboard.filters().search.clone();
    match key.code {
      KeyCode::Esc => {
        self.search_active = false;
        search.clear();
      }
      KeyCode::Enter => {
        self.search_active = false;
        return;
      }
      KeyCode::Backspace => {
        search.pop();
      }
      KeyCode::Char(c) => search.push(c),
      _ => return,
    }
    self.set_filters(FiltersPatch { search: Some(search), ..Default::default() });
  }

  async fn handle_list_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_subjects().len();
        if self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(id) = self.cursor_subject().map(|s| s.subject.id) {
          self.open_detail(id).await;
        }
      }

      KeyCode::Char('/') => self.search_active = true,
      KeyCode::Char('s') => {
        let next = cycle(StatusFilter::iter(), self.dashboard.filters().status);
        self.set_filters(FiltersPatch { status: Some(next), ..Default::default() });
      }
      KeyCode::Char('o') => {
        let next = cycle(SortKey::iter(), self.dashboard.filters().sort_by);
        self.set_filters(FiltersPatch { sort_by: Some(next), ..Default::default() });
      }
      KeyCode::Char('r') => {
        let next = self.dashboard.filters().sort_order.reversed();
        self.set_filters(FiltersPatch { sort_order: Some(next), ..Default::default() });
      }
      KeyCode::Char('R') => {
        // The message is already in the status bar.
        let _ = self.reload().await;
      }

      KeyCode::Char('p') => {
        if let Some(id) = self.cursor_subject().map(|s| s.subject.id) {
          self.advance(id).await;
        }
      }
      KeyCode::Char('x') => {
        if let Some(id) = self.cursor_subject().map(|s| s.subject.id) {
          self.request_delete(id);
        }
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_detail_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => self.close_detail(),

      KeyCode::Down | KeyCode::Char('j') => {
        if self.detail_scroll < self.achievements.len() {
          self.detail_scroll += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.detail_scroll = self.detail_scroll.saturating_sub(1);
      }

      KeyCode::Char(']') | KeyCode::PageDown => {
        let len = self.filtered_subjects().len();
        if self.list_cursor + 1 < len {
          self.list_cursor += 1;
          if let Some(id) = self.cursor_subject().map(|s| s.subject.id) {
            self.open_detail(id).await;
          }
        }
      }
      KeyCode::Char('[') | KeyCode::PageUp => {
        if self.list_cursor > 0 {
          self.list_cursor -= 1;
          if let Some(id) = self.cursor_subject().map(|s| s.subject.id) {
            self.open_detail(id).await;
          }
        }
      }

      KeyCode::Char('p') => {
        if let Some(id) = self.selected_id {
          self.advance(id).await;
        }
      }
      KeyCode::Char('x') => {
        if let Some(id) = self.selected_id {
          self.request_delete(id);
        }
      }

      _ => {}
    }
    Ok(true)
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  async fn open_detail(&mut self, id: i64) {
    self.load_achievements(id).await;
    self.selected_id = Some(id);
    self.detail_scroll = 0;
    self.screen = Screen::SubjectDetail;
  }

  fn close_detail(&mut self) {
    self.screen = Screen::SubjectList;
    self.selected_id = None;
    self.achievements.clear();
  }

  /// Move a subject one step along preparing → launched → finished.
  async fn advance(&mut self, id: i64) {
    let Some(current) = self.dashboard.subject(id).map(|s| s.subject.status) else {
      return;
    };
    let Some(next) = next_status(current) else {
      self.status_msg = "Subject is already finished".into();
      return;
    };
    let patch = SubjectPatch { status: Some(next), ..Default::default() };
    match self.dashboard.update(id, patch).await {
      Ok(subject) => {
        self.clamp_cursor();
        self.status_msg = format!("\"{}\" is now {}", subject.title, next.label());
      }
      Err(e) if e.kind() == ErrorKind::Stale => {
        let reloaded = self.dashboard.reload().await;
        self.clamp_cursor();
        self.status_msg = stale_message(&reloaded);
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  fn request_delete(&mut self, id: i64) {
    if !self.session.is_admin() {
      self.status_msg = "Only admins can delete subjects".into();
      return;
    }
    let title = self
      .dashboard
      .subject(id)
      .map(|s| s.subject.title.clone())
      .unwrap_or_default();
    self.pending_delete = Some(id);
    self.status_msg = format!("Delete \"{title}\"? [y/N]");
  }

  async fn delete(&mut self, id: i64) {
    match self.dashboard.delete(id).await {
      Ok(()) => {
        if self.selected_id == Some(id) {
          self.close_detail();
        }
        self.clamp_cursor();
        self.status_msg = "Subject deleted".into();
      }
      Err(e) if e.kind() == ErrorKind::Referenced => {
        self.status_msg = "Subject still has achievements; remove them first".into();
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }
}

/// The value after `current` in `all`, wrapping around.
fn cycle<T: PartialEq + Copy>(all: impl Iterator<Item = T> + Clone, current: T) -> T {
  all
    .clone()
    .cycle()
    .skip_while(|v| *v != current)
    .nth(1)
    .unwrap_or(current)
}

/// Status line after an update lost a version race and the list was
/// reloaded (or not).
fn stale_message<E: std::fmt::Display>(reload: &Result<(), E>) -> String {
  match reload {
    Ok(()) => "Subject was changed elsewhere; reloaded, try again".into(),
    Err(e) => format!("Subject was changed elsewhere; reload failed: {e}"),
  }
}

pub fn next_status(status: Status) -> Option<Status> {
  match status {
    Status::Preparing => Some(Status::Launched),
    Status::Launched => Some(Status::Finished),
    Status::Finished => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use keti_core::filter::SortOrder;

  #[test]
  fn filters_cycle_through_every_value() {
    assert_eq!(cycle(StatusFilter::iter(), StatusFilter::All), StatusFilter::Preparing);
    assert_eq!(cycle(StatusFilter::iter(), StatusFilter::Finished), StatusFilter::All);
    assert_eq!(cycle(SortKey::iter(), SortKey::CreatedAt), SortKey::Title);
    assert_eq!(SortOrder::Desc.reversed(), SortOrder::Asc);
  }

  #[test]
  fn stale_message_reports_a_failed_reload() {
    let ok: Result<(), &str> = Ok(());
    assert!(stale_message(&ok).contains("reloaded, try again"));

    let failed: Result<(), &str> = Err("connection refused");
    let msg = stale_message(&failed);
    assert!(msg.contains("reload failed: connection refused"), "{msg}");
    assert!(!msg.contains("reloaded"));
  }

  #[test]
  fn status_advances_until_finished() {
    assert_eq!(next_status(Status::Preparing), Some(Status::Launched));
    assert_eq!(next_status(Status::Launched), Some(Status::Finished));
    assert_eq!(next_status(Status::Finished), None);
  }
}
