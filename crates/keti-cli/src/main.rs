//! `keti`: terminal client for the Keti research dashboard.
//!
//! # Usage
//!
//! ```
//! keti --url http://localhost:3000 --user alice --password secret
//! keti --config ~/.config/keti/config.toml list --status launched --sort-by deadline_date
//! keti login
//! keti create "Graphene batteries" --kickoff 2025-01-06 --deadline 2025-06-30
//! ```
//!
//! Without a subcommand the interactive dashboard starts.

mod app;
mod client;
mod session;
mod ui;

use std::{
  io::{self, Write},
  path::PathBuf,
  time::Duration,
};

use anyhow::{Context, Result, bail};
use app::App;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use keti_core::{
  Dashboard, ResearchStore,
  filter::{FiltersPatch, SortKey, SortOrder, StatusFilter},
  progress::{displayed_progress, is_due_soon, is_overdue},
  subject::{NewSubject, Status, SubjectPatch, SubjectView},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use session::{Session, SessionFile};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "keti", about = "Terminal client for the Keti research dashboard")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the keti server (default: http://localhost:3000).
  #[arg(long, env = "KETI_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "KETI_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "KETI_PASSWORD")]
  password: Option<String>,

  /// Where the signed-in state is kept between runs.
  #[arg(long, value_name = "FILE", env = "KETI_SESSION_FILE")]
  session_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Verify credentials with the server and remember the signed-in user.
  Login,
  /// Forget the signed-in user.
  Logout,
  /// Show the remembered user.
  Whoami,
  /// List subjects.
  List {
    /// Case-insensitive title substring.
    #[arg(short, long)]
    search:     Option<String>,
    #[arg(long, default_value_t = StatusFilter::All)]
    status:     StatusFilter,
    #[arg(long, default_value_t = SortKey::CreatedAt)]
    sort_by:    SortKey,
    #[arg(long, default_value_t = SortOrder::Desc)]
    sort_order: SortOrder,
  },
  /// Print subject statistics.
  Stats,
  /// Show one subject and its achievements.
  Show { id: i64 },
  /// Create a subject.
  Create {
    title:    String,
    #[arg(long, default_value_t = Status::Preparing)]
    status:   Status,
    #[arg(long)]
    owner:    Option<Uuid>,
    #[arg(long)]
    kickoff:  Option<NaiveDate>,
    #[arg(long)]
    deadline: Option<NaiveDate>,
  },
  /// Update a subject. Only the given fields change.
  Update {
    id:             i64,
    #[arg(long)]
    title:          Option<String>,
    #[arg(long)]
    status:         Option<Status>,
    #[arg(long)]
    kickoff:        Option<NaiveDate>,
    #[arg(long)]
    deadline:       Option<NaiveDate>,
    /// Remove the kickoff date.
    #[arg(long, conflicts_with = "kickoff")]
    clear_kickoff:  bool,
    /// Remove the deadline.
    #[arg(long, conflicts_with = "deadline")]
    clear_deadline: bool,
  },
  /// Delete a subject.
  Delete { id: i64 },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

fn non_empty(s: &str) -> Option<String> { (!s.is_empty()).then(|| s.to_owned()) }

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  init_tracing(args.command.is_some())?;

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| non_empty(&file_cfg.url))
      .unwrap_or_else(|| "http://localhost:3000".to_string()),
    username: args
      .user
      .or_else(|| non_empty(&file_cfg.username))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| non_empty(&file_cfg.password))
      .unwrap_or_default(),
  };

  let client = ApiClient::new(api_config)?;
  let session_file = args
    .session_file
    .map(SessionFile::new)
    .or_else(SessionFile::default_location);
  let session = Session::open(session_file)?;

  match args.command {
    Some(command) => run_command(command, client, session).await,
    None => run_tui(client, session).await,
  }
}

/// Subcommands log warnings to stderr. The dashboard owns the terminal, so
/// it only logs when `KETI_LOG` names a file.
fn init_tracing(subcommand: bool) -> Result<()> {
  if subcommand {
    tracing_subscriber::fmt()
      .with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
      )
      .with_writer(io::stderr)
      .init();
  } else if let Some(path) = std::env::var_os("KETI_LOG") {
    let file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .with_context(|| format!("opening log file {}", PathBuf::from(&path).display()))?;
    tracing_subscriber::fmt()
      .with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
      )
      .with_ansi(false)
      .with_writer(std::sync::Mutex::new(file))
      .init();
  }
  Ok(())
}

// ─── Subcommands ──────────────────────────────────────────────────────────────

async fn run_command(command: Command, client: ApiClient, mut session: Session) -> Result<()> {
  let mut out = io::stdout().lock();
  match command {
    Command::Login => {
      if !client.has_credentials() {
        bail!("no username given; pass --user or set KETI_USER");
      }
      let user = session.sign_in(&client).await?;
      writeln!(out, "signed in as {} ({})", user.username, user.role)?;
    }
    Command::Logout => {
      session.sign_out()?;
      writeln!(out, "signed out")?;
    }
    Command::Whoami => match &session.state().user {
      Some(user) if session.state().is_authenticated => {
        writeln!(out, "{} ({})", user.username, user.role)?;
      }
      _ => writeln!(out, "not signed in")?,
    },
    Command::List { search, status, sort_by, sort_order } => {
      let mut dashboard = Dashboard::new(client);
      dashboard.load().await?;
      dashboard.set_filters(FiltersPatch {
        search: search.or(Some(String::new())),
        status: Some(status),
        sort_by: Some(sort_by),
        sort_order: Some(sort_order),
      });
      for view in dashboard.filtered() {
        writeln!(out, "{}", subject_row(view))?;
      }
    }
    Command::Stats => {
      let stats = client.stats().await?;
      writeln!(out, "total        {}", stats.total)?;
      writeln!(out, "preparing    {}", stats.preparing)?;
      writeln!(out, "in progress  {}", stats.launched)?;
      writeln!(out, "finished     {}", stats.finished)?;
      writeln!(out, "due soon     {}", stats.due_soon)?;
    }
    Command::Show { id } => {
      let view = client
        .get_subject(id)
        .await?
        .with_context(|| format!("subject {id} not found"))?;
      writeln!(out, "{}", subject_row(&view))?;
      if let Some(owner) = &view.owner_name {
        writeln!(out, "  owner     {owner}")?;
      }
      writeln!(out, "  version   {}", view.subject.version)?;
      for a in client.list_achievements(Some(id)).await? {
        let kind = a.kind.as_deref().unwrap_or("-");
        writeln!(out, "  - [{kind}] {}", a.title)?;
      }
    }
    Command::Create { title, status, owner, kickoff, deadline } => {
      let input = NewSubject {
        title,
        status,
        owner_id: owner,
        kickoff_date: kickoff,
        deadline_date: deadline,
      };
      let subject = client.create_subject(input).await?;
      writeln!(out, "created subject {}", subject.id)?;
    }
    Command::Update {
      id,
      title,
      status,
      kickoff,
      deadline,
      clear_kickoff,
      clear_deadline,
    } => {
      let patch = SubjectPatch {
        title,
        status,
        kickoff_date: if clear_kickoff { Some(None) } else { kickoff.map(Some) },
        deadline_date: if clear_deadline { Some(None) } else { deadline.map(Some) },
        ..Default::default()
      };
      if patch.is_empty() {
        bail!("nothing to update");
      }
      let subject = client.update_subject(id, patch).await?;
      writeln!(out, "updated subject {} (version {})", subject.id, subject.version)?;
    }
    Command::Delete { id } => {
      client.delete_subject(id).await?;
      writeln!(out, "deleted subject {id}")?;
    }
  }
  session.close()
}

fn subject_row(view: &SubjectView) -> String {
  let now = Utc::now();
  let s = &view.subject;
  let deadline = s
    .deadline_date
    .map(|d| d.to_string())
    .unwrap_or_else(|| "-".into());
  let flag = if is_overdue(view, now) {
    "  overdue"
  } else if is_due_soon(view, now) {
    "  due soon"
  } else {
    ""
  };
  format!(
    "{:>5}  {:<11} {:>3}%  {:<10}  {}  ({} achievements){flag}",
    s.id,
    s.status.label(),
    displayed_progress(view, now),
    deadline,
    s.title,
    view.achievements,
  )
}

// ─── Dashboard ────────────────────────────────────────────────────────────────

async fn run_tui(client: ApiClient, mut session: Session) -> Result<()> {
  session.initialize(&client).await?;
  let watcher = session::watch(client.clone(), session.sender(), Duration::from_secs(60));
  let mut app = App::new(client, session);

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let load_result = app.reload().await;

  // Run the event loop; restore terminal even on error.
  let run_result = if load_result.is_ok() {
    run_event_loop(&mut terminal, &mut app).await
  } else {
    load_result
  };

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();
  watcher.abort();

  if !app.status_msg.is_empty() && run_result.is_ok() {
    eprintln!("{}", app.status_msg);
  }
  app.session.close()?;
  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    if !app.poll_session()? {
      break;
    }

    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key).await?
    {
      break;
    }
  }

  Ok(())
}
