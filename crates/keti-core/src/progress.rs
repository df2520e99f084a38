//! Time-based rules: elapsed-time progress and deadline urgency.
//!
//! Every function takes the evaluation instant explicitly. Dates are treated
//! as midnight UTC at the start of the given day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::subject::{Schedule, Status, Subject, SubjectView};

/// Width of the "due soon" window, in days.
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Anything that carries a lifecycle status and an optional date window.
pub trait Scheduled {
  fn status(&self) -> Status;
  fn kickoff_date(&self) -> Option<NaiveDate>;
  fn deadline_date(&self) -> Option<NaiveDate>;
}

impl Scheduled for Subject {
  fn status(&self) -> Status { self.status }
  fn kickoff_date(&self) -> Option<NaiveDate> { self.kickoff_date }
  fn deadline_date(&self) -> Option<NaiveDate> { self.deadline_date }
}

impl Scheduled for SubjectView {
  fn status(&self) -> Status { self.subject.status }
  fn kickoff_date(&self) -> Option<NaiveDate> { self.subject.kickoff_date }
  fn deadline_date(&self) -> Option<NaiveDate> { self.subject.deadline_date }
}

impl Scheduled for Schedule {
  fn status(&self) -> Status { self.status }
  fn kickoff_date(&self) -> Option<NaiveDate> { self.kickoff_date }
  fn deadline_date(&self) -> Option<NaiveDate> { self.deadline_date }
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
  date.and_time(NaiveTime::MIN).and_utc()
}

/// Percentage of the kickoff→deadline window that has elapsed at `now`,
/// rounded to the nearest integer and clamped to `0..=100`.
///
/// Returns 0 when either date is missing.
pub fn calculate_progress<T: Scheduled + ?Sized>(
  item: &T,
  now: DateTime<Utc>,
) -> u8 {
  let (Some(kickoff), Some(deadline)) =
    (item.kickoff_date(), item.deadline_date())
  else {
    return 0;
  };

  let start = start_of_day(kickoff);
  let end = start_of_day(deadline);
  if now <= start {
    return 0;
  }
  if now >= end {
    return 100;
  }

  let total = (end - start).num_milliseconds() as f64;
  let elapsed = (now - start).num_milliseconds() as f64;
  ((elapsed / total) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Progress as the dashboard displays it: only launched subjects advance,
/// everything else reads 0.
pub fn displayed_progress<T: Scheduled + ?Sized>(
  item: &T,
  now: DateTime<Utc>,
) -> u8 {
  match item.status() {
    Status::Launched => calculate_progress(item, now),
    _ => 0,
  }
}

/// A launched subject whose deadline has already passed.
pub fn is_overdue<T: Scheduled + ?Sized>(item: &T, now: DateTime<Utc>) -> bool {
  match (item.status(), item.deadline_date()) {
    (Status::Launched, Some(deadline)) => start_of_day(deadline) < now,
    _ => false,
  }
}

/// A launched subject whose deadline falls on or before `now` plus the
/// due-soon window. Overdue subjects are also due soon.
pub fn is_due_soon<T: Scheduled + ?Sized>(
  item: &T,
  now: DateTime<Utc>,
) -> bool {
  match (item.status(), item.deadline_date()) {
    (Status::Launched, Some(deadline)) => {
      start_of_day(deadline) <= now + Duration::days(DUE_SOON_WINDOW_DAYS)
    }
    _ => false,
  }
}
