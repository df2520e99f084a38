//! Error types for `keti-core`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Backend-independent classification of a failure.
///
/// Every store backend maps its own error type onto one of these so that the
/// REST layer and the client can react to failures without knowing where
/// they came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// The addressed entity does not exist.
  NotFound,
  /// A uniqueness rule would be violated (e.g. a duplicate profile email).
  Conflict,
  /// The entity is still referenced by others and cannot be removed.
  Referenced,
  /// The caller's copy is older than the stored entity.
  Stale,
  /// Input failed validation.
  Invalid,
  Unauthorized,
  /// The backend could not be reached.
  Unavailable,
  Internal,
}

impl ErrorKind {
  /// Stable snake_case label, as used in error response bodies.
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::NotFound => "not_found",
      ErrorKind::Conflict => "conflict",
      ErrorKind::Referenced => "referenced",
      ErrorKind::Stale => "stale",
      ErrorKind::Invalid => "invalid",
      ErrorKind::Unauthorized => "unauthorized",
      ErrorKind::Unavailable => "unavailable",
      ErrorKind::Internal => "internal",
    }
  }
}

/// Implemented by every error type a [`crate::ResearchStore`] can return.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(i64),

  #[error("achievement not found: {0}")]
  AchievementNotFound(i64),

  #[error("profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("subject {id} was modified since version {expected}")]
  StaleSubject { id: i64, expected: u32 },

  #[error("cannot delete subject {0}: it still has achievements")]
  SubjectHasAchievements(i64),

  #[error("cannot delete profile {0}: it still owns subjects")]
  ProfileOwnsSubjects(Uuid),

  #[error("a profile with email {0:?} already exists")]
  DuplicateEmail(String),

  #[error("profile {0} already exists")]
  DuplicateProfile(Uuid),

  #[error("invalid {field}: {reason}")]
  Invalid { field: &'static str, reason: String },

  #[error("backend unavailable: {0}")]
  Unavailable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
    Error::Invalid { field, reason: reason.into() }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::SubjectNotFound(_)
      | Error::AchievementNotFound(_)
      | Error::ProfileNotFound(_) => ErrorKind::NotFound,
      Error::StaleSubject { .. } => ErrorKind::Stale,
      Error::SubjectHasAchievements(_) | Error::ProfileOwnsSubjects(_) => {
        ErrorKind::Referenced
      }
      Error::DuplicateEmail(_) | Error::DuplicateProfile(_) => {
        ErrorKind::Conflict
      }
      Error::Invalid { .. } => ErrorKind::Invalid,
      Error::Unavailable(_) => ErrorKind::Unavailable,
      Error::Serialization(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
