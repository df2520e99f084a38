//! Subjects, the research projects tracked by the dashboard.
//!
//! A subject moves through three lifecycle states and optionally carries a
//! kickoff and a deadline date. Everything shown about a subject beyond its
//! stored fields (progress, urgency, statistics) is derived on read, see
//! [`crate::progress`] and [`crate::stats`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum length of a title, in characters.
pub const TITLE_MAX_CHARS: usize = 200;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a subject.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
  #[default]
  Preparing,
  Launched,
  Finished,
}

impl Status {
  /// Human-readable label for display.
  pub fn label(self) -> &'static str {
    match self {
      Status::Preparing => "Preparing",
      Status::Launched => "In progress",
      Status::Finished => "Finished",
    }
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// A stored research project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub id:            i64,
  /// A subject without a title never matches a non-empty search.
  #[serde(default)]
  pub title:         String,
  #[serde(default)]
  pub status:        Status,
  pub owner_id:      Option<Uuid>,
  pub kickoff_date:  Option<NaiveDate>,
  pub deadline_date: Option<NaiveDate>,
  pub created_at:    DateTime<Utc>,
  /// Starts at 1 and increases by one on every successful update.
  #[serde(default = "first_version")]
  pub version:       u32,
}

fn first_version() -> u32 { 1 }

impl AsRef<Subject> for Subject {
  fn as_ref(&self) -> &Subject { self }
}

/// A subject together with the related data the dashboard displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectView {
  #[serde(flatten)]
  pub subject:      Subject,
  /// Number of achievements recorded against the subject.
  #[serde(default)]
  pub achievements: u32,
  /// Display name of the owning profile, if any.
  pub owner_name:   Option<String>,
}

impl AsRef<Subject> for SubjectView {
  fn as_ref(&self) -> &Subject { &self.subject }
}

impl From<Subject> for SubjectView {
  fn from(subject: Subject) -> Self {
    SubjectView { subject, achievements: 0, owner_name: None }
  }
}

/// The minimal projection used for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
  #[serde(default)]
  pub status:        Status,
  pub kickoff_date:  Option<NaiveDate>,
  pub deadline_date: Option<NaiveDate>,
}

impl From<&Subject> for Schedule {
  fn from(s: &Subject) -> Self {
    Schedule {
      status:        s.status,
      kickoff_date:  s.kickoff_date,
      deadline_date: s.deadline_date,
    }
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Input for creating a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubject {
  pub title:         String,
  #[serde(default)]
  pub status:        Status,
  #[serde(default)]
  pub owner_id:      Option<Uuid>,
  #[serde(default)]
  pub kickoff_date:  Option<NaiveDate>,
  #[serde(default)]
  pub deadline_date: Option<NaiveDate>,
}

impl NewSubject {
  pub fn new(title: impl Into<String>) -> Self {
    NewSubject { title: title.into(), ..Default::default() }
  }

  pub fn validate(&self) -> Result<()> {
    validate_title(&self.title)?;
    validate_window(self.kickoff_date, self.deadline_date)
  }
}

/// A partial update. Absent fields are left untouched; nullable fields use
/// `Some(None)` to clear the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPatch {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status:           Option<Status>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub owner_id:         Option<Option<Uuid>>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub kickoff_date:     Option<Option<NaiveDate>>,
  #[serde(
    default,
    deserialize_with = "crate::nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub deadline_date:    Option<Option<NaiveDate>>,
  /// When set, the update only applies if the stored version still matches.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_version: Option<u32>,
}

impl SubjectPatch {
  /// Apply the patch to `subject` in place. Does not touch `version`.
  pub fn apply_to(&self, subject: &mut Subject) {
    if let Some(title) = &self.title {
      subject.title = title.clone();
    }
    if let Some(status) = self.status {
      subject.status = status;
    }
    if let Some(owner_id) = self.owner_id {
      subject.owner_id = owner_id;
    }
    if let Some(kickoff) = self.kickoff_date {
      subject.kickoff_date = kickoff;
    }
    if let Some(deadline) = self.deadline_date {
      subject.deadline_date = deadline;
    }
  }

  /// Whether the patch changes nothing besides the version precondition.
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.status.is_none()
      && self.owner_id.is_none()
      && self.kickoff_date.is_none()
      && self.deadline_date.is_none()
  }

  /// Checks that need only the patch itself. The merged subject is checked
  /// again by the store, since one date may come from the stored row.
  pub fn validate(&self) -> Result<()> {
    if let Some(title) = &self.title {
      validate_title(title)?;
    }
    if let (Some(kickoff), Some(deadline)) = (self.kickoff_date, self.deadline_date) {
      validate_window(kickoff, deadline)?;
    }
    Ok(())
  }
}

impl Subject {
  /// Validate the stored shape of a subject, e.g. after applying a patch.
  pub fn validate(&self) -> Result<()> {
    validate_title(&self.title)?;
    validate_window(self.kickoff_date, self.deadline_date)
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Titles must be non-blank and at most [`TITLE_MAX_CHARS`] characters.
pub fn validate_title(title: &str) -> Result<()> {
  if title.trim().is_empty() {
    return Err(Error::invalid("title", "must not be empty"));
  }
  if title.chars().count() > TITLE_MAX_CHARS {
    return Err(Error::invalid(
      "title",
      format!("must be at most {TITLE_MAX_CHARS} characters"),
    ));
  }
  Ok(())
}

/// A deadline may not precede the kickoff when both are present.
pub fn validate_window(
  kickoff: Option<NaiveDate>,
  deadline: Option<NaiveDate>,
) -> Result<()> {
  match (kickoff, deadline) {
    (Some(k), Some(d)) if d < k => Err(Error::invalid(
      "deadline_date",
      format!("{d} is before the kickoff date {k}"),
    )),
    _ => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;
  use crate::{Classify, ErrorKind};

  fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

  #[test]
  fn status_round_trips_through_its_wire_name() {
    assert_eq!(Status::Launched.to_string(), "launched");
    assert_eq!(Status::from_str("finished").unwrap(), Status::Finished);
    assert!(Status::from_str("archived").is_err());
    assert_eq!(Status::default(), Status::Preparing);
  }

  #[test]
  fn missing_title_deserializes_as_empty() {
    let s: Subject = serde_json::from_value(serde_json::json!({
      "id": 1,
      "owner_id": null,
      "kickoff_date": null,
      "deadline_date": null,
      "created_at": "2024-01-01T00:00:00Z",
    }))
    .unwrap();
    assert_eq!(s.title, "");
    assert_eq!(s.status, Status::Preparing);
    assert_eq!(s.version, 1);
  }

  #[test]
  fn blank_and_overlong_titles_are_rejected() {
    assert_eq!(validate_title("   ").unwrap_err().kind(), ErrorKind::Invalid);
    assert!(validate_title(&"x".repeat(TITLE_MAX_CHARS)).is_ok());
    assert!(validate_title(&"x".repeat(TITLE_MAX_CHARS + 1)).is_err());
  }

  #[test]
  fn deadline_before_kickoff_is_rejected() {
    let mut input = NewSubject::new("Alpha");
    input.kickoff_date = Some(date("2024-03-01"));
    input.deadline_date = Some(date("2024-02-01"));
    assert_eq!(input.validate().unwrap_err().kind(), ErrorKind::Invalid);

    input.deadline_date = Some(date("2024-03-01"));
    assert!(input.validate().is_ok());
  }

  #[test]
  fn patch_checks_only_what_it_carries() {
    assert!(SubjectPatch::default().validate().is_ok());

    let blank = SubjectPatch { title: Some("  ".into()), ..Default::default() };
    assert_eq!(blank.validate().unwrap_err().kind(), ErrorKind::Invalid);

    let inverted = SubjectPatch {
      kickoff_date: Some(Some(date("2024-03-01"))),
      deadline_date: Some(Some(date("2024-01-01"))),
      ..Default::default()
    };
    assert_eq!(inverted.validate().unwrap_err().kind(), ErrorKind::Invalid);

    let cleared = SubjectPatch {
      kickoff_date: Some(Some(date("2024-03-01"))),
      deadline_date: Some(None),
      ..Default::default()
    };
    assert!(cleared.validate().is_ok());
  }

  #[test]
  fn patch_distinguishes_absent_from_null() {
    let patch: SubjectPatch = serde_json::from_value(serde_json::json!({
      "deadline_date": null,
      "status": "launched",
    }))
    .unwrap();
    assert_eq!(patch.deadline_date, Some(None));
    assert_eq!(patch.kickoff_date, None);

    let mut subject = Subject {
      id:            7,
      title:         "Alpha".into(),
      status:        Status::Preparing,
      owner_id:      None,
      kickoff_date:  Some(date("2024-01-01")),
      deadline_date: Some(date("2024-06-01")),
      created_at:    Utc::now(),
      version:       3,
    };
    patch.apply_to(&mut subject);
    assert_eq!(subject.status, Status::Launched);
    assert_eq!(subject.kickoff_date, Some(date("2024-01-01")));
    assert_eq!(subject.deadline_date, None);
    assert_eq!(subject.version, 3);
  }

  #[test]
  fn patch_serializes_only_present_fields() {
    let patch = SubjectPatch {
      kickoff_date: Some(None),
      expected_version: Some(2),
      ..Default::default()
    };
    let json = serde_json::to_value(&patch).unwrap();
    assert_eq!(
      json,
      serde_json::json!({ "kickoff_date": null, "expected_version": 2 })
    );
  }
}
