//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so that lexical order matches chronological order. Dates are stored as
//! `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use keti_core::{
  achievement::Achievement,
  profile::{Profile, Role},
  subject::{Schedule, Status, Subject, SubjectView},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// The current instant, truncated to what the store can represent.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

fn decode_enum<T: FromStr>(what: &str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of a `subjects` row joined with its achievement count and
/// owner name.
pub struct RawSubjectView {
  pub id:            i64,
  pub title:         String,
  pub status:        String,
  pub owner_id:      Option<String>,
  pub kickoff_date:  Option<String>,
  pub deadline_date: Option<String>,
  pub created_at:    String,
  pub version:       i64,
  pub achievements:  i64,
  pub owner_name:    Option<String>,
}

impl RawSubjectView {
  /// Column order matches `SUBJECT_VIEW_SELECT` in the store.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawSubjectView {
      id:            row.get(0)?,
      title:         row.get(1)?,
      status:        row.get(2)?,
      owner_id:      row.get(3)?,
      kickoff_date:  row.get(4)?,
      deadline_date: row.get(5)?,
      created_at:    row.get(6)?,
      version:       row.get(7)?,
      achievements:  row.get(8)?,
      owner_name:    row.get(9)?,
    })
  }

  pub fn into_view(self) -> Result<SubjectView> {
    let subject = Subject {
      id:            self.id,
      title:         self.title,
      status:        decode_enum::<Status>("status", &self.status)?,
      owner_id:      self.owner_id.as_deref().map(decode_uuid).transpose()?,
      kickoff_date:  decode_opt_date(self.kickoff_date)?,
      deadline_date: decode_opt_date(self.deadline_date)?,
      created_at:    decode_dt(&self.created_at)?,
      version:       u32::try_from(self.version)
        .map_err(|_| Error::Decode(format!("version {}", self.version)))?,
    };
    Ok(SubjectView {
      subject,
      achievements: u32::try_from(self.achievements).unwrap_or(u32::MAX),
      owner_name: self.owner_name,
    })
  }
}

pub struct RawSchedule {
  pub status:        String,
  pub kickoff_date:  Option<String>,
  pub deadline_date: Option<String>,
}

impl RawSchedule {
  pub fn into_schedule(self) -> Result<Schedule> {
    Ok(Schedule {
      status:        decode_enum::<Status>("status", &self.status)?,
      kickoff_date:  decode_opt_date(self.kickoff_date)?,
      deadline_date: decode_opt_date(self.deadline_date)?,
    })
  }
}

pub struct RawAchievement {
  pub id:         i64,
  pub subject_id: i64,
  pub title:      String,
  pub kind:       Option<String>,
  pub doc_path:   Option<String>,
  pub pdf_path:   Option<String>,
  pub created_at: String,
}

impl RawAchievement {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawAchievement {
      id:         row.get(0)?,
      subject_id: row.get(1)?,
      title:      row.get(2)?,
      kind:       row.get(3)?,
      doc_path:   row.get(4)?,
      pdf_path:   row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_achievement(self) -> Result<Achievement> {
    Ok(Achievement {
      id:         self.id,
      subject_id: self.subject_id,
      title:      self.title,
      kind:       self.kind,
      doc_path:   self.doc_path,
      pdf_path:   self.pdf_path,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawProfile {
  pub user_id:     String,
  pub email:       String,
  pub name:        Option<String>,
  pub role:        String,
  pub avatar_path: Option<String>,
  pub created_at:  String,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(RawProfile {
      user_id:     row.get(0)?,
      email:       row.get(1)?,
      name:        row.get(2)?,
      role:        row.get(3)?,
      avatar_path: row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      user_id:     decode_uuid(&self.user_id)?,
      email:       self.email,
      name:        self.name,
      role:        decode_enum::<Role>("role", &self.role)?,
      avatar_path: self.avatar_path,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
