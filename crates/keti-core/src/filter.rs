//! Search, status filtering and sorting of subject collections.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::subject::{Status, Subject};

// ─── Criteria ────────────────────────────────────────────────────────────────

/// Status criterion: a specific status, or everything.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusFilter {
  #[default]
  All,
  Preparing,
  Launched,
  Finished,
}

impl StatusFilter {
  pub fn matches(self, status: Status) -> bool {
    self.status().is_none_or(|s| s == status)
  }

  /// The concrete status selected, or `None` for [`StatusFilter::All`].
  pub fn status(self) -> Option<Status> {
    match self {
      StatusFilter::All => None,
      StatusFilter::Preparing => Some(Status::Preparing),
      StatusFilter::Launched => Some(Status::Launched),
      StatusFilter::Finished => Some(Status::Finished),
    }
  }
}

impl From<Status> for StatusFilter {
  fn from(status: Status) -> Self {
    match status {
      Status::Preparing => StatusFilter::Preparing,
      Status::Launched => StatusFilter::Launched,
      Status::Finished => StatusFilter::Finished,
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortKey {
  Title,
  DeadlineDate,
  #[default]
  CreatedAt,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  pub fn reversed(self) -> Self {
    match self {
      SortOrder::Asc => SortOrder::Desc,
      SortOrder::Desc => SortOrder::Asc,
    }
  }
}

/// The full set of view criteria. Defaults to every subject, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectFilters {
  #[serde(default)]
  pub search:     String,
  #[serde(default)]
  pub status:     StatusFilter,
  #[serde(default)]
  pub sort_by:    SortKey,
  #[serde(default)]
  pub sort_order: SortOrder,
}

/// A partial change to [`SubjectFilters`]; absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiltersPatch {
  pub search:     Option<String>,
  pub status:     Option<StatusFilter>,
  pub sort_by:    Option<SortKey>,
  pub sort_order: Option<SortOrder>,
}

impl SubjectFilters {
  pub fn merge(&mut self, patch: FiltersPatch) {
    if let Some(search) = patch.search {
      self.search = search;
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
    if let Some(sort_by) = patch.sort_by {
      self.sort_by = sort_by;
    }
    if let Some(sort_order) = patch.sort_order {
      self.sort_order = sort_order;
    }
  }
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Sort position for subjects without a deadline: after every real date.
fn undated() -> NaiveDate {
  NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Case-insensitive substring match on the title plus the status criterion.
/// An empty search matches every title.
pub fn matches(subject: &Subject, filters: &SubjectFilters) -> bool {
  filters.status.matches(subject.status) && title_matches(subject, &filters.search)
}

fn title_matches(subject: &Subject, search: &str) -> bool {
  search.is_empty()
    || subject.title.to_lowercase().contains(&search.to_lowercase())
}

fn compare(a: &Subject, b: &Subject, key: SortKey) -> Ordering {
  match key {
    SortKey::Title => a.title.cmp(&b.title),
    SortKey::DeadlineDate => a
      .deadline_date
      .unwrap_or_else(undated)
      .cmp(&b.deadline_date.unwrap_or_else(undated)),
    SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
  }
}

/// Filter and sort `items` without modifying them.
///
/// The sort is stable: items that compare equal keep their input order in
/// either direction.
pub fn apply<'a, T: AsRef<Subject>>(
  items: &'a [T],
  filters: &SubjectFilters,
) -> Vec<&'a T> {
  let mut out: Vec<&T> = items
    .iter()
    .filter(|item| matches(item.as_ref(), filters))
    .collect();

  out.sort_by(|a, b| {
    let ord = compare(a.as_ref(), b.as_ref(), filters.sort_by);
    match filters.sort_order {
      SortOrder::Asc => ord,
      SortOrder::Desc => ord.reverse(),
    }
  });
  out
}
