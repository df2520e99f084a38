//! Sign-in state for the terminal client.
//!
//! [`SessionState`] changes only through [`SessionState::apply`], driven by
//! [`SessionEvent`]s. Events are queued on an mpsc channel and consumed by a
//! single handler, [`Session::handle`], whether they come from a command the
//! user ran or from the background [`watch`] task. The `{user,
//! is_authenticated}` slice is persisted to a JSON file so that a later run
//! starts from the last known state.

use std::{
  fs, io,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use keti_core::{Classify, ErrorKind, profile::Role};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::client::{ApiClient, ClientError};

// ─── State ────────────────────────────────────────────────────────────────────

/// The signed-in user as reported by `GET /api/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
  pub username: String,
  #[serde(default)]
  pub role:     Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
  pub user:             Option<SessionUser>,
  pub is_authenticated: bool,
  pub is_loading:       bool,
  pub is_initializing:  bool,
}

/// The slice of [`SessionState`] that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
  pub user:             Option<SessionUser>,
  pub is_authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  /// A persisted session was read from disk.
  Restored(PersistedSession),
  InitializeStarted,
  /// Startup verification finished; `None` means the credentials were
  /// rejected or absent.
  Initialized(Option<SessionUser>),
  SignInStarted,
  SignedIn(SessionUser),
  SignInFailed,
  SignedOut,
}

impl SessionState {
  /// Pure transition function.
  pub fn apply(self, event: SessionEvent) -> Self {
    match event {
      SessionEvent::Restored(p) => SessionState {
        user: p.user,
        is_authenticated: p.is_authenticated,
        ..self
      },
      SessionEvent::InitializeStarted => {
        SessionState { is_initializing: true, ..self }
      }
      SessionEvent::Initialized(user) => SessionState {
        is_authenticated: user.is_some(),
        user,
        is_initializing: false,
        ..self
      },
      SessionEvent::SignInStarted => SessionState { is_loading: true, ..self },
      SessionEvent::SignedIn(user) => SessionState {
        user:             Some(user),
        is_authenticated: true,
        is_loading:       false,
        is_initializing:  self.is_initializing,
      },
      SessionEvent::SignInFailed => SessionState { is_loading: false, ..self },
      SessionEvent::SignedOut => SessionState {
        user:             None,
        is_authenticated: false,
        is_loading:       false,
        is_initializing:  self.is_initializing,
      },
    }
  }

  pub fn persisted(&self) -> PersistedSession {
    PersistedSession {
      user:             self.user.clone(),
      is_authenticated: self.is_authenticated,
    }
  }

  pub fn has_role(&self, role: Role) -> bool {
    self.user.as_ref().is_some_and(|u| u.role == role)
  }

  pub fn is_admin(&self) -> bool { self.has_role(Role::Admin) }
}

// ─── Persistence ──────────────────────────────────────────────────────────────

/// JSON file holding a [`PersistedSession`].
#[derive(Debug, Clone)]
pub struct SessionFile {
  path: PathBuf,
}

impl SessionFile {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  /// `keti/session.json` under the platform config directory
  /// (`~/.config` on Linux).
  pub fn default_location() -> Option<Self> {
    dirs::config_dir().map(|dir| Self::new(dir.join("keti").join("session.json")))
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Read the persisted session; a missing file is an empty session.
  pub fn load(&self) -> Result<PersistedSession> {
    match fs::read_to_string(&self.path) {
      Ok(raw) => serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", self.path.display())),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PersistedSession::default()),
      Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
    }
  }

  pub fn save(&self, session: &PersistedSession) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    }
    let raw = serde_json::to_string_pretty(session)?;
    fs::write(&self.path, raw)
      .with_context(|| format!("writing {}", self.path.display()))
  }
}

// ─── Session ──────────────────────────────────────────────────────────────────

pub struct Session {
  state:  SessionState,
  file:   Option<SessionFile>,
  events: mpsc::UnboundedSender<SessionEvent>,
  inbox:  mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
  /// Open a session, restoring whatever `file` holds.
  pub fn open(file: Option<SessionFile>) -> Result<Self> {
    let (events, inbox) = mpsc::unbounded_channel();
    let mut session = Session { state: SessionState::default(), file, events, inbox };
    if let Some(file) = &session.file {
      let restored = file.load()?;
      session.dispatch(SessionEvent::Restored(restored))?;
    }
    session.persist()?;
    Ok(session)
  }

  /// Write the durable slice unconditionally.
  pub fn persist(&self) -> Result<()> {
    match &self.file {
      Some(file) => file.save(&self.state.persisted()),
      None => Ok(()),
    }
  }

  /// Handle anything still queued and write the final state.
  pub fn close(mut self) -> Result<()> {
    self.drain()?;
    self.persist()
  }

  pub fn state(&self) -> &SessionState { &self.state }

  pub fn is_admin(&self) -> bool { self.state.is_admin() }

  pub fn has_role(&self, role: Role) -> bool { self.state.has_role(role) }

  /// A sender for events raised outside the session, e.g. by [`watch`].
  pub fn sender(&self) -> mpsc::UnboundedSender<SessionEvent> { self.events.clone() }

  /// Apply one event and persist the durable slice if it changed.
  pub fn handle(&mut self, event: SessionEvent) -> Result<()> {
    tracing::debug!(?event, "session event");
    let before = self.state.persisted();
    self.state = std::mem::take(&mut self.state).apply(event);
    let after = self.state.persisted();
    if before != after
      && let Some(file) = &self.file
    {
      file.save(&after)?;
    }
    Ok(())
  }

  /// Handle every queued event. Returns how many were handled.
  pub fn drain(&mut self) -> Result<usize> {
    let mut handled = 0;
    while let Ok(event) = self.inbox.try_recv() {
      self.handle(event)?;
      handled += 1;
    }
    Ok(handled)
  }

  /// Queue `event` behind anything already pending and process the queue.
  fn dispatch(&mut self, event: SessionEvent) -> Result<()> {
    // The receiver lives in `self`, so the channel cannot be closed here.
    let _ = self.events.send(event);
    self.drain().map(|_| ())
  }

  /// Verify `client`'s credentials with the server and sign in.
  pub async fn sign_in(&mut self, client: &ApiClient) -> Result<SessionUser> {
    self.dispatch(SessionEvent::SignInStarted)?;
    match client.session().await {
      Ok(user) => {
        self.dispatch(SessionEvent::SignedIn(user.clone()))?;
        Ok(user)
      }
      Err(e) => {
        self.dispatch(SessionEvent::SignInFailed)?;
        Err(e).context("sign-in failed")
      }
    }
  }

  pub fn sign_out(&mut self) -> Result<()> { self.dispatch(SessionEvent::SignedOut) }

  /// Re-check a restored session against the server.
  ///
  /// Without credentials there is nothing to check and the session is
  /// signed out. Network failures keep the restored state.
  pub async fn initialize(&mut self, client: &ApiClient) -> Result<()> {
    self.dispatch(SessionEvent::InitializeStarted)?;
    if !client.has_credentials() {
      return self.dispatch(SessionEvent::Initialized(None));
    }
    match client.session().await {
      Ok(user) => self.dispatch(SessionEvent::Initialized(Some(user))),
      Err(e) if e.kind() == ErrorKind::Unauthorized => {
        self.dispatch(SessionEvent::Initialized(None))
      }
      Err(e) => {
        tracing::warn!(error = %e, "could not verify session");
        let user = self.state.user.clone();
        self.dispatch(SessionEvent::Initialized(user))
      }
    }
  }
}

// ─── Background watch ─────────────────────────────────────────────────────────

/// Periodically re-verify credentials, reporting changes on `events`.
///
/// Ends when the receiving [`Session`] is dropped.
pub fn watch(
  client: ApiClient,
  events: mpsc::UnboundedSender<SessionEvent>,
  every: Duration,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
      ticker.tick().await;
      let event = match client.session().await {
        Ok(user) => SessionEvent::SignedIn(user),
        Err(ClientError::Api { kind: ErrorKind::Unauthorized, .. }) => {
          SessionEvent::SignedOut
        }
        Err(e) => {
          tracing::debug!(error = %e, "session check skipped");
          continue;
        }
      };
      if events.send(event).is_err() {
        break;
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ada(role: Role) -> SessionUser { SessionUser { username: "ada".into(), role } }

  fn temp_file() -> SessionFile {
    let dir = std::env::temp_dir().join(format!("keti-session-{}", uuid::Uuid::new_v4()));
    SessionFile::new(dir.join("session.json"))
  }

  #[test]
  fn sign_in_and_out_transitions() {
    let s = SessionState::default().apply(SessionEvent::SignInStarted);
    assert!(s.is_loading);

    let s = s.apply(SessionEvent::SignedIn(ada(Role::User)));
    assert!(s.is_authenticated);
    assert!(!s.is_loading);
    assert!(s.has_role(Role::User));
    assert!(!s.is_admin());

    let s = s.apply(SessionEvent::SignedOut);
    assert_eq!(s, SessionState::default());
  }

  #[test]
  fn failed_sign_in_only_clears_loading() {
    let signed_in = SessionState::default().apply(SessionEvent::SignedIn(ada(Role::Admin)));
    let s = signed_in
      .clone()
      .apply(SessionEvent::SignInStarted)
      .apply(SessionEvent::SignInFailed);
    assert_eq!(s, signed_in);
  }

  #[test]
  fn initialize_brackets_verification() {
    let s = SessionState::default().apply(SessionEvent::InitializeStarted);
    assert!(s.is_initializing);
    let s = s.apply(SessionEvent::Initialized(Some(ada(Role::Admin))));
    assert!(!s.is_initializing);
    assert!(s.is_authenticated);
    assert!(s.is_admin());

    let s = s
      .apply(SessionEvent::InitializeStarted)
      .apply(SessionEvent::Initialized(None));
    assert!(!s.is_authenticated);
    assert_eq!(s.user, None);
  }

  #[test]
  fn persisted_slice_round_trips_through_file() {
    let file = temp_file();
    assert_eq!(file.load().unwrap(), PersistedSession::default());

    let mut session = Session::open(Some(file.clone())).unwrap();
    session.handle(SessionEvent::SignedIn(ada(Role::Admin))).unwrap();
    session.handle(SessionEvent::SignInStarted).unwrap();

    let reopened = Session::open(Some(file.clone())).unwrap();
    assert_eq!(reopened.state().user, Some(ada(Role::Admin)));
    assert!(reopened.state().is_authenticated);
    assert!(!reopened.state().is_loading);
    assert!(reopened.is_admin());

    let _ = fs::remove_dir_all(file.path().parent().unwrap());
  }

  #[test]
  fn external_events_go_through_the_queue() {
    let mut session = Session::open(None).unwrap();
    let tx = session.sender();
    tx.send(SessionEvent::SignedIn(ada(Role::User))).unwrap();
    tx.send(SessionEvent::SignedOut).unwrap();
    assert_eq!(session.drain().unwrap(), 2);
    assert!(!session.state().is_authenticated);
  }
}
