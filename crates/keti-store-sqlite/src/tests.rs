//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use keti_core::{
  Classify, Dashboard, ErrorKind,
  achievement::{AchievementPatch, NewAchievement},
  filter::{FiltersPatch, StatusFilter},
  profile::{NewProfile, ProfilePatch, Role},
  store::{ResearchStore, SubjectQuery},
  subject::{NewSubject, Status, SubjectPatch},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate { s.parse().unwrap() }

async fn profile(s: &SqliteStore, email: &str, name: &str) -> Uuid {
  s.create_profile(NewProfile {
    email: email.into(),
    name: Some(name.into()),
    ..Default::default()
  })
  .await
  .unwrap()
  .user_id
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_subject() {
  let s = store().await;

  let created = s
    .create_subject(NewSubject {
      title: "Soil microbiome".into(),
      kickoff_date: Some(date("2024-01-01")),
      deadline_date: Some(date("2024-12-31")),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(created.status, Status::Preparing);
  assert_eq!(created.version, 1);

  let fetched = s.get_subject(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.subject, created);
  assert_eq!(fetched.achievements, 0);
  assert_eq!(fetched.owner_name, None);
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject(99).await.unwrap().is_none());
}

#[tokio::test]
async fn list_is_newest_first_with_counts_and_owner() {
  let s = store().await;
  let owner = profile(&s, "ada@example.org", "Ada").await;

  let a = s.create_subject(NewSubject::new("A")).await.unwrap();
  let b = s
    .create_subject(NewSubject { owner_id: Some(owner), ..NewSubject::new("B") })
    .await
    .unwrap();
  s.create_achievement(NewAchievement {
    subject_id: a.id,
    title: "Paper".into(),
    ..Default::default()
  })
  .await
  .unwrap();

  let all = s.list_subjects(&SubjectQuery::default()).await.unwrap();
  let ids: Vec<i64> = all.iter().map(|v| v.subject.id).collect();
  assert_eq!(ids, vec![b.id, a.id]);
  assert_eq!(all[0].owner_name.as_deref(), Some("Ada"));
  assert_eq!(all[1].achievements, 1);
}

#[tokio::test]
async fn list_filters_by_owner_and_status() {
  let s = store().await;
  let owner = profile(&s, "ada@example.org", "Ada").await;
  s.create_subject(NewSubject {
    owner_id: Some(owner),
    status: Status::Launched,
    ..NewSubject::new("Mine")
  })
  .await
  .unwrap();
  s.create_subject(NewSubject { status: Status::Launched, ..NewSubject::new("Other") })
    .await
    .unwrap();
  s.create_subject(NewSubject::new("Draft")).await.unwrap();

  let mine = s
    .list_subjects(&SubjectQuery { owner_id: Some(owner), status: None })
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].subject.title, "Mine");

  let launched = s
    .list_subjects(&SubjectQuery { owner_id: None, status: Some(Status::Launched) })
    .await
    .unwrap();
  assert_eq!(launched.len(), 2);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
  let s = store().await;

  let err = s.create_subject(NewSubject::new("")).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Invalid);

  let err = s
    .create_subject(NewSubject {
      kickoff_date: Some(date("2024-05-01")),
      deadline_date: Some(date("2024-04-01")),
      ..NewSubject::new("Backwards")
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Invalid);

  let err = s
    .create_subject(NewSubject { owner_id: Some(Uuid::new_v4()), ..NewSubject::new("Orphan") })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  assert!(s.list_subjects(&SubjectQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_applies_patch_and_bumps_version() {
  let s = store().await;
  let created = s
    .create_subject(NewSubject {
      deadline_date: Some(date("2024-12-31")),
      ..NewSubject::new("Alpha")
    })
    .await
    .unwrap();

  let updated = s
    .update_subject(created.id, SubjectPatch {
      status: Some(Status::Launched),
      deadline_date: Some(None),
      expected_version: Some(1),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.version, 2);
  assert_eq!(updated.status, Status::Launched);
  assert_eq!(updated.deadline_date, None);
  assert_eq!(updated.title, "Alpha");

  let fetched = s.get_subject(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.subject, updated);
}

#[tokio::test]
async fn update_with_outdated_version_is_stale() {
  let s = store().await;
  let created = s.create_subject(NewSubject::new("Alpha")).await.unwrap();
  s.update_subject(created.id, SubjectPatch {
    title: Some("Alpha 2".into()),
    ..Default::default()
  })
  .await
  .unwrap();

  let err = s
    .update_subject(created.id, SubjectPatch {
      title: Some("Alpha (late)".into()),
      expected_version: Some(1),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Stale);

  let fetched = s.get_subject(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.subject.title, "Alpha 2");
}

#[tokio::test]
async fn update_validates_merged_window() {
  let s = store().await;
  let created = s
    .create_subject(NewSubject {
      kickoff_date: Some(date("2024-03-01")),
      ..NewSubject::new("Alpha")
    })
    .await
    .unwrap();

  let err = s
    .update_subject(created.id, SubjectPatch {
      deadline_date: Some(Some(date("2024-02-01"))),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Invalid);
}

#[tokio::test]
async fn update_missing_subject_is_not_found() {
  let s = store().await;
  let err = s.update_subject(7, SubjectPatch::default()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_subject_guards_achievements() {
  let s = store().await;
  let subject = s.create_subject(NewSubject::new("Alpha")).await.unwrap();
  let achievement = s
    .create_achievement(NewAchievement {
      subject_id: subject.id,
      title: "Patent".into(),
      kind: Some("patent".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  let err = s.delete_subject(subject.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Referenced);

  s.delete_achievement(achievement.id).await.unwrap();
  s.delete_subject(subject.id).await.unwrap();
  assert!(s.get_subject(subject.id).await.unwrap().is_none());

  let err = s.delete_subject(subject.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn schedules_cover_every_subject() {
  let s = store().await;
  s.create_subject(NewSubject { status: Status::Launched, ..NewSubject::new("A") })
    .await
    .unwrap();
  s.create_subject(NewSubject::new("B")).await.unwrap();

  let schedules = s.list_schedules().await.unwrap();
  assert_eq!(schedules.len(), 2);
  assert_eq!(
    schedules.iter().filter(|s| s.status == Status::Launched).count(),
    1
  );
}

// ─── Achievements ────────────────────────────────────────────────────────────

#[tokio::test]
async fn achievement_lifecycle() {
  let s = store().await;
  let a = s.create_subject(NewSubject::new("A")).await.unwrap();
  let b = s.create_subject(NewSubject::new("B")).await.unwrap();

  let paper = s
    .create_achievement(NewAchievement {
      subject_id: a.id,
      title: "Paper".into(),
      ..Default::default()
    })
    .await
    .unwrap();
  s.create_achievement(NewAchievement {
    subject_id: b.id,
    title: "Report".into(),
    ..Default::default()
  })
  .await
  .unwrap();

  assert_eq!(s.list_achievements(None).await.unwrap().len(), 2);
  let only_a = s.list_achievements(Some(a.id)).await.unwrap();
  assert_eq!(only_a, vec![paper.clone()]);

  let updated = s
    .update_achievement(paper.id, AchievementPatch {
      pdf_path: Some(Some("papers/1.pdf".into())),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.pdf_path.as_deref(), Some("papers/1.pdf"));
  assert_eq!(s.get_achievement(paper.id).await.unwrap(), Some(updated));

  s.delete_achievement(paper.id).await.unwrap();
  let err = s.delete_achievement(paper.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn achievement_requires_existing_subject() {
  let s = store().await;
  let err = s
    .create_achievement(NewAchievement {
      subject_id: 404,
      title: "Paper".into(),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_email_is_unique() {
  let s = store().await;
  profile(&s, "ada@example.org", "Ada").await;

  let err = s
    .create_profile(NewProfile { email: "ADA@example.org".into(), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let grace = profile(&s, "grace@example.org", "Grace").await;
  let err = s
    .update_profile(grace, ProfilePatch {
      email: Some("ada@example.org".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn profile_update_and_guarded_delete() {
  let s = store().await;
  let ada = profile(&s, "ada@example.org", "Ada").await;
  let subject = s
    .create_subject(NewSubject { owner_id: Some(ada), ..NewSubject::new("Engine") })
    .await
    .unwrap();

  let updated = s
    .update_profile(ada, ProfilePatch { role: Some(Role::Admin), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(updated.role, Role::Admin);
  assert_eq!(s.list_profiles().await.unwrap(), vec![updated]);

  let err = s.delete_profile(ada).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Referenced);

  s.update_subject(subject.id, SubjectPatch { owner_id: Some(None), ..Default::default() })
    .await
    .unwrap();
  s.delete_profile(ada).await.unwrap();
  assert!(s.get_profile(ada).await.unwrap().is_none());
}

// ─── Dashboard over SQLite ───────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_round_trip() {
  let mut dash = Dashboard::new(store().await);
  dash.reload().await.unwrap();
  assert!(dash.subjects().is_empty());

  let soon = Utc::now().date_naive() + Duration::days(2);
  let created = dash
    .create(NewSubject {
      status: Status::Launched,
      deadline_date: Some(soon),
      ..NewSubject::new("Alpha")
    })
    .await
    .unwrap();
  dash.create(NewSubject::new("Beta")).await.unwrap();

  assert_eq!(dash.subjects().len(), 2);
  assert_eq!(dash.subjects()[0].subject.title, "Beta");
  assert_eq!(dash.stats().total, 2);
  assert_eq!(dash.stats().due_soon, 1);

  dash.set_filters(FiltersPatch {
    status: Some(StatusFilter::Launched),
    ..Default::default()
  });
  assert_eq!(dash.filtered().len(), 1);

  let updated = dash
    .update(created.id, SubjectPatch {
      status: Some(Status::Finished),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.version, 2);
  assert_eq!(dash.stats().due_soon, 0);
  assert!(dash.filtered().is_empty());

  dash.delete(created.id).await.unwrap();
  assert!(dash.subject(created.id).is_none());
  assert_eq!(dash.stats().total, 1);
  assert!(!dash.is_loading());
}

#[tokio::test]
async fn dashboard_delete_refused_keeps_collection() {
  let mut dash = Dashboard::new(store().await);
  let subject = dash.create(NewSubject::new("Alpha")).await.unwrap();
  dash
    .store()
    .create_achievement(NewAchievement {
      subject_id: subject.id,
      title: "Paper".into(),
      ..Default::default()
    })
    .await
    .unwrap();

  let err = dash.delete(subject.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Referenced);
  assert!(dash.subject(subject.id).is_some());
  assert!(!dash.is_loading());
}
