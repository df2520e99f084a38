//! The `ResearchStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (`keti-store-sqlite`) and by
//! the HTTP client in `keti-cli`. The REST layer and the [`crate::Dashboard`]
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Classify,
  achievement::{Achievement, AchievementPatch, NewAchievement},
  profile::{NewProfile, Profile, ProfilePatch},
  subject::{NewSubject, Schedule, Status, Subject, SubjectPatch, SubjectView},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Server-side restrictions for [`ResearchStore::list_subjects`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectQuery {
  pub owner_id: Option<Uuid>,
  pub status:   Option<Status>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Keti backend.
///
/// Listings of subjects and achievements are ordered newest first. Writes
/// validate their input and fail with an error classified as
/// [`crate::ErrorKind::Invalid`] rather than persisting bad data.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait ResearchStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// All subjects matching `query`, newest first, with achievement counts
  /// and owner names attached.
  fn list_subjects<'a>(
    &'a self,
    query: &'a SubjectQuery,
  ) -> impl Future<Output = Result<Vec<SubjectView>, Self::Error>> + Send + 'a;

  /// Retrieve a subject by id. Returns `None` if not found.
  fn get_subject(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<SubjectView>, Self::Error>> + Send + '_;

  /// Persist a new subject. The store assigns `id`, `created_at` and
  /// `version`.
  fn create_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Apply `patch` to an existing subject and bump its version.
  ///
  /// Fails as not-found for unknown ids, and as stale when
  /// `patch.expected_version` no longer matches the stored version.
  fn update_subject(
    &self,
    id: i64,
    patch: SubjectPatch,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Delete a subject. Fails as referenced while achievements point at it.
  fn delete_subject(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The status and date window of every subject, for statistics.
  fn list_schedules(
    &self,
  ) -> impl Future<Output = Result<Vec<Schedule>, Self::Error>> + Send + '_;

  // ── Achievements ──────────────────────────────────────────────────────

  /// All achievements, or only those of one subject.
  fn list_achievements(
    &self,
    subject_id: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Achievement>, Self::Error>> + Send + '_;

  fn get_achievement(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Achievement>, Self::Error>> + Send + '_;

  /// Fails as not-found when the referenced subject does not exist.
  fn create_achievement(
    &self,
    input: NewAchievement,
  ) -> impl Future<Output = Result<Achievement, Self::Error>> + Send + '_;

  fn update_achievement(
    &self,
    id: i64,
    patch: AchievementPatch,
  ) -> impl Future<Output = Result<Achievement, Self::Error>> + Send + '_;

  fn delete_achievement(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn list_profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// Fails as a conflict when the email is already taken.
  fn create_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Fails as referenced while the profile still owns subjects.
  fn delete_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
