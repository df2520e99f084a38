//! Aggregate counts over a collection of subjects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  progress::{Scheduled, is_due_soon},
  subject::Status,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStats {
  pub total:     usize,
  pub preparing: usize,
  pub launched:  usize,
  pub finished:  usize,
  /// Launched subjects due within the due-soon window, overdue included.
  pub due_soon:  usize,
}

impl SubjectStats {
  /// Count `items` by status, evaluating urgency at `now`.
  ///
  /// `preparing + launched + finished == total` always holds, and
  /// `due_soon <= launched`.
  pub fn compute<'a, T, I>(items: I, now: DateTime<Utc>) -> Self
  where
    T: Scheduled + 'a,
    I: IntoIterator<Item = &'a T>,
  {
    items.into_iter().fold(SubjectStats::default(), |mut acc, item| {
      acc.total += 1;
      match item.status() {
        Status::Preparing => acc.preparing += 1,
        Status::Launched => acc.launched += 1,
        Status::Finished => acc.finished += 1,
      }
      if is_due_soon(item, now) {
        acc.due_soon += 1;
      }
      acc
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, NaiveDate};

  use super::*;
  use crate::subject::Schedule;

  fn schedule(status: Status, deadline: Option<NaiveDate>) -> Schedule {
    Schedule { status, kickoff_date: None, deadline_date: deadline }
  }

  #[test]
  fn empty_collection_is_all_zero() {
    let none: Vec<Schedule> = Vec::new();
    assert_eq!(SubjectStats::compute(&none, Utc::now()), SubjectStats::default());
  }

  #[test]
  fn counts_by_status_and_due_soon() {
    let now: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
    let today = now.date_naive();
    let items = vec![
      schedule(Status::Launched, Some(today + Duration::days(3))),
      schedule(Status::Launched, Some(today + Duration::days(30))),
      schedule(Status::Finished, Some(today)),
    ];
    let stats = SubjectStats::compute(&items, now);
    assert_eq!(stats, SubjectStats {
      total:     3,
      preparing: 0,
      launched:  2,
      finished:  1,
      due_soon:  1,
    });
  }

  #[test]
  fn partition_and_due_soon_bounds_hold() {
    let now = Utc::now();
    let today = now.date_naive();
    let items: Vec<Schedule> = (0..30)
      .map(|i| {
        let status = match i % 3 {
          0 => Status::Preparing,
          1 => Status::Launched,
          _ => Status::Finished,
        };
        let deadline = (i % 4 != 0).then(|| today + Duration::days(i - 10));
        schedule(status, deadline)
      })
      .collect();
    let stats = SubjectStats::compute(&items, now);
    assert_eq!(stats.total, 30);
    assert_eq!(stats.preparing + stats.launched + stats.finished, stats.total);
    assert!(stats.due_soon <= stats.launched);
  }

  #[test]
  fn one_subject_per_status_with_a_near_deadline() {
    let now = Utc::now();
    let items = vec![
      schedule(Status::Preparing, None),
      schedule(Status::Launched, Some(now.date_naive() + Duration::days(3))),
      schedule(Status::Finished, None),
    ];
    assert_eq!(SubjectStats::compute(&items, now), SubjectStats {
      total:     3,
      preparing: 1,
      launched:  1,
      finished:  1,
      due_soon:  1,
    });
  }

  #[test]
  fn due_soon_never_decreases_as_time_passes() {
    let start: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
    let today = start.date_naive();
    let items: Vec<Schedule> = [-5, 0, 4, 7, 8, 15, 40]
      .into_iter()
      .map(|d| schedule(Status::Launched, Some(today + Duration::days(d))))
      .collect();

    let mut previous = 0;
    for hours in (0..24 * 60).step_by(7) {
      let due_soon = SubjectStats::compute(&items, start + Duration::hours(hours)).due_soon;
      assert!(due_soon >= previous, "dropped at +{hours}h");
      previous = due_soon;
    }
    assert_eq!(previous, items.len());
  }
}
