//! The dashboard's entity store: a local copy of the subject collection,
//! aggregate statistics and view criteria, kept in step with a
//! [`ResearchStore`].
//!
//! Every mutation goes through `&mut self`, so a dashboard has exactly one
//! writer at a time. Concurrent edits from other clients are caught by the
//! backend's version check rather than silently overwritten.

use std::ops::{Deref, DerefMut};

use chrono::Utc;

use crate::{
  filter::{self, FiltersPatch, SubjectFilters},
  stats::SubjectStats,
  store::{ResearchStore, SubjectQuery},
  subject::{NewSubject, Subject, SubjectPatch, SubjectView},
};

pub struct Dashboard<S> {
  store:      S,
  subjects:   Vec<SubjectView>,
  stats:      SubjectStats,
  filters:    SubjectFilters,
  is_loading: bool,
}

impl<S: ResearchStore> Dashboard<S> {
  /// An empty dashboard with default filters. Nothing is fetched until
  /// [`Dashboard::load`] or [`Dashboard::reload`] is called.
  pub fn new(store: S) -> Self {
    Dashboard {
      store,
      subjects: Vec::new(),
      stats: SubjectStats::default(),
      filters: SubjectFilters::default(),
      is_loading: false,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  /// The full local collection, newest first.
  pub fn subjects(&self) -> &[SubjectView] { &self.subjects }

  pub fn stats(&self) -> SubjectStats { self.stats }

  pub fn filters(&self) -> &SubjectFilters { &self.filters }

  pub fn is_loading(&self) -> bool { self.is_loading }

  /// Look up a subject in the local collection.
  pub fn subject(&self, id: i64) -> Option<&SubjectView> {
    self.subjects.iter().find(|s| s.subject.id == id)
  }

  /// The local collection with the current filters applied.
  pub fn filtered(&self) -> Vec<&SubjectView> {
    filter::apply(&self.subjects, &self.filters)
  }

  /// Merge `patch` into the current filters. Purely local.
  pub fn set_filters(&mut self, patch: FiltersPatch) {
    self.filters.merge(patch);
  }

  // ── Backend round-trips ───────────────────────────────────────────────

  /// Replace the local collection with the backend's.
  ///
  /// On failure the previous collection is kept and the error is returned.
  pub async fn load(&mut self) -> Result<(), S::Error> {
    let mut this = Loading::start(self);
    this.fetch_subjects().await
  }

  /// Recompute statistics from the backend's schedules, as of now.
  pub async fn refresh_stats(&mut self) -> Result<(), S::Error> {
    let schedules = self.store.list_schedules().await?;
    self.stats = SubjectStats::compute(&schedules, Utc::now());
    Ok(())
  }

  /// [`Dashboard::load`] followed by [`Dashboard::refresh_stats`].
  pub async fn reload(&mut self) -> Result<(), S::Error> {
    let mut this = Loading::start(self);
    this.fetch_all().await
  }

  /// Create a subject, then reload the collection and statistics.
  pub async fn create(&mut self, input: NewSubject) -> Result<Subject, S::Error> {
    let mut this = Loading::start(self);
    this.create_and_reload(input).await
  }

  /// Update a subject, then reload the collection and statistics.
  ///
  /// Unless the patch already names one, the version of the local copy is
  /// sent as the expected version, so an update based on outdated data
  /// fails instead of overwriting someone else's change.
  pub async fn update(
    &mut self,
    id: i64,
    mut patch: SubjectPatch,
  ) -> Result<Subject, S::Error> {
    if patch.expected_version.is_none() {
      patch.expected_version = self.subject(id).map(|s| s.subject.version);
    }

    let mut this = Loading::start(self);
    this.update_and_reload(id, patch).await
  }

  /// Delete a subject, drop it from the local collection, then refresh
  /// statistics.
  pub async fn delete(&mut self, id: i64) -> Result<(), S::Error> {
    let mut this = Loading::start(self);
    this.delete_and_refresh(id).await
  }

  async fn fetch_subjects(&mut self) -> Result<(), S::Error> {
    self.subjects = self.store.list_subjects(&SubjectQuery::default()).await?;
    Ok(())
  }

  async fn fetch_all(&mut self) -> Result<(), S::Error> {
    self.fetch_subjects().await?;
    self.refresh_stats().await
  }

  async fn create_and_reload(
    &mut self,
    input: NewSubject,
  ) -> Result<Subject, S::Error> {
    let created = self.store.create_subject(input).await?;
    self.fetch_all().await?;
    Ok(created)
  }

  async fn update_and_reload(
    &mut self,
    id: i64,
    patch: SubjectPatch,
  ) -> Result<Subject, S::Error> {
    let updated = self.store.update_subject(id, patch).await?;
    self.fetch_all().await?;
    Ok(updated)
  }

  async fn delete_and_refresh(&mut self, id: i64) -> Result<(), S::Error> {
    self.store.delete_subject(id).await?;
    self.subjects.retain(|s| s.subject.id != id);
    self.refresh_stats().await
  }
}

/// Exclusive access to a dashboard with `is_loading` raised. The flag drops
/// with the guard, so it is cleared on success, on error, and when the
/// surrounding future is dropped mid-await.
struct Loading<'a, S>(&'a mut Dashboard<S>);

impl<'a, S> Loading<'a, S> {
  fn start(dashboard: &'a mut Dashboard<S>) -> Self {
    dashboard.is_loading = true;
    Loading(dashboard)
  }
}

impl<S> Deref for Loading<'_, S> {
  type Target = Dashboard<S>;

  fn deref(&self) -> &Dashboard<S> { self.0 }
}

impl<S> DerefMut for Loading<'_, S> {
  fn deref_mut(&mut self) -> &mut Dashboard<S> { self.0 }
}

impl<S> Drop for Loading<'_, S> {
  fn drop(&mut self) { self.0.is_loading = false; }
}
