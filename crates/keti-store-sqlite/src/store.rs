//! [`SqliteStore`], the SQLite implementation of [`ResearchStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use keti_core::{
  Error as CoreError,
  achievement::{Achievement, AchievementPatch, NewAchievement},
  profile::{NewProfile, Profile, ProfilePatch},
  store::{ResearchStore, SubjectQuery},
  subject::{NewSubject, Schedule, Subject, SubjectPatch, SubjectView},
};

use crate::{
  Result,
  encode::{
    RawAchievement, RawProfile, RawSchedule, RawSubjectView, encode_date,
    encode_dt, encode_uuid, now,
  },
  schema::{SCHEMA, SCHEMA_VERSION},
};

/// Column list shared by every subject read; see [`RawSubjectView::from_row`].
const SUBJECT_VIEW_SELECT: &str = "
  SELECT s.id, s.title, s.status, s.owner_id, s.kickoff_date, s.deadline_date,
         s.created_at, s.version,
         (SELECT COUNT(*) FROM achievements a WHERE a.subject_id = s.id),
         p.name
    FROM subjects s
    LEFT JOIN profiles p ON p.user_id = s.owner_id";

const ACHIEVEMENT_SELECT: &str = "
  SELECT id, subject_id, title, kind, doc_path, pdf_path, created_at
    FROM achievements";

const PROFILE_SELECT: &str = "
  SELECT user_id, email, name, role, avatar_path, created_at
    FROM profiles";

/// Result of a guarded delete.
enum Removal {
  Removed,
  Missing,
  Referenced,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Keti store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let previous: i64 = self
      .conn
      .call(|conn| {
        let previous: i64 =
          conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(previous)
      })
      .await?;
    if previous != SCHEMA_VERSION {
      tracing::info!(from = previous, to = SCHEMA_VERSION, "initialised schema");
    }
    Ok(())
  }

  /// Run a `SELECT 1 ... WHERE <key> = ?1` style existence query.
  async fn exists<K>(&self, sql: &'static str, key: K) -> Result<bool>
  where
    K: rusqlite::ToSql + Send + 'static,
  {
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![key], |_| Ok(()))
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(found)
  }

  async fn subject_exists(&self, id: i64) -> Result<bool> {
    self
      .exists("SELECT 1 FROM subjects WHERE id = ?1", id)
      .await
  }

  async fn require_profile(&self, user_id: Uuid) -> Result<()> {
    let found = self
      .exists("SELECT 1 FROM profiles WHERE user_id = ?1", encode_uuid(user_id))
      .await?;
    if !found {
      return Err(CoreError::ProfileNotFound(user_id).into());
    }
    Ok(())
  }

  /// Whether `email` belongs to a profile other than `except`.
  async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool> {
    let email = email.to_owned();
    let except = except.map(encode_uuid);
    let taken = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM profiles
                WHERE email = ?1 COLLATE NOCASE
                  AND (?2 IS NULL OR user_id != ?2)",
              rusqlite::params![email, except],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(taken)
  }
}

// ─── ResearchStore impl ──────────────────────────────────────────────────────

impl ResearchStore for SqliteStore {
  type Error = crate::Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn list_subjects(&self, query: &SubjectQuery) -> Result<Vec<SubjectView>> {
    let owner = query.owner_id.map(encode_uuid);
    let status = query.status.map(|s| s.to_string());

    let raws: Vec<RawSubjectView> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{SUBJECT_VIEW_SELECT}
            WHERE (?1 IS NULL OR s.owner_id = ?1)
              AND (?2 IS NULL OR s.status = ?2)
            ORDER BY s.created_at DESC, s.id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner, status], RawSubjectView::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubjectView::into_view).collect()
  }

  async fn get_subject(&self, id: i64) -> Result<Option<SubjectView>> {
    let raw: Option<RawSubjectView> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{SUBJECT_VIEW_SELECT} WHERE s.id = ?1"),
              rusqlite::params![id],
              RawSubjectView::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubjectView::into_view).transpose()
  }

  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    input.validate()?;
    if let Some(owner) = input.owner_id {
      self.require_profile(owner).await?;
    }

    let created_at = now();
    let title = input.title.clone();
    let status = input.status.to_string();
    let owner = input.owner_id.map(encode_uuid);
    let kickoff = input.kickoff_date.map(encode_date);
    let deadline = input.deadline_date.map(encode_date);
    let at_str = encode_dt(created_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (
             title, status, owner_id, kickoff_date, deadline_date,
             created_at, version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
          rusqlite::params![title, status, owner, kickoff, deadline, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(id, "created subject");
    Ok(Subject {
      id,
      title: input.title,
      status: input.status,
      owner_id: input.owner_id,
      kickoff_date: input.kickoff_date,
      deadline_date: input.deadline_date,
      created_at,
      version: 1,
    })
  }

  async fn update_subject(&self, id: i64, patch: SubjectPatch) -> Result<Subject> {
    patch.validate()?;
    let current = self
      .get_subject(id)
      .await?
      .ok_or(CoreError::SubjectNotFound(id))?
      .subject;

    if let Some(expected) = patch.expected_version {
      if expected != current.version {
        return Err(CoreError::StaleSubject { id, expected }.into());
      }
    }
    if let Some(Some(owner)) = patch.owner_id {
      self.require_profile(owner).await?;
    }

    let mut next = current.clone();
    patch.apply_to(&mut next);
    next.validate()?;
    next.version = current.version + 1;

    let title = next.title.clone();
    let status = next.status.to_string();
    let owner = next.owner_id.map(encode_uuid);
    let kickoff = next.kickoff_date.map(encode_date);
    let deadline = next.deadline_date.map(encode_date);
    let base = current.version;

    // The version guard makes the read-modify-write atomic with respect to
    // other writers.
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subjects
              SET title = ?1, status = ?2, owner_id = ?3,
                  kickoff_date = ?4, deadline_date = ?5,
                  version = version + 1
            WHERE id = ?6 AND version = ?7",
          rusqlite::params![title, status, owner, kickoff, deadline, id, base],
        )?)
      })
      .await?;

    if changed == 0 {
      let err = if self.subject_exists(id).await? {
        CoreError::StaleSubject { id, expected: base }
      } else {
        CoreError::SubjectNotFound(id)
      };
      return Err(err.into());
    }

    tracing::debug!(id, version = next.version, "updated subject");
    Ok(next)
  }

  async fn delete_subject(&self, id: i64) -> Result<()> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row("SELECT 1 FROM subjects WHERE id = ?1", [id], |_| Ok(()))
          .optional()?
          .is_some();
        if !exists {
          return Ok(Removal::Missing);
        }
        let refs: i64 = tx.query_row(
          "SELECT COUNT(*) FROM achievements WHERE subject_id = ?1",
          [id],
          |r| r.get(0),
        )?;
        if refs > 0 {
          return Ok(Removal::Referenced);
        }
        tx.execute("DELETE FROM subjects WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(Removal::Removed)
      })
      .await?;

    match outcome {
      Removal::Removed => {
        tracing::debug!(id, "deleted subject");
        Ok(())
      }
      Removal::Missing => Err(CoreError::SubjectNotFound(id).into()),
      Removal::Referenced => Err(CoreError::SubjectHasAchievements(id).into()),
    }
  }

  async fn list_schedules(&self) -> Result<Vec<Schedule>> {
    let raws: Vec<RawSchedule> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare("SELECT status, kickoff_date, deadline_date FROM subjects")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawSchedule {
              status:        row.get(0)?,
              kickoff_date:  row.get(1)?,
              deadline_date: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSchedule::into_schedule).collect()
  }

  // ── Achievements ──────────────────────────────────────────────────────────

  async fn list_achievements(&self, subject_id: Option<i64>) -> Result<Vec<Achievement>> {
    let raws: Vec<RawAchievement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{ACHIEVEMENT_SELECT}
            WHERE (?1 IS NULL OR subject_id = ?1)
            ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], RawAchievement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAchievement::into_achievement).collect()
  }

  async fn get_achievement(&self, id: i64) -> Result<Option<Achievement>> {
    let raw: Option<RawAchievement> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{ACHIEVEMENT_SELECT} WHERE id = ?1"),
              [id],
              RawAchievement::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAchievement::into_achievement).transpose()
  }

  async fn create_achievement(&self, input: NewAchievement) -> Result<Achievement> {
    input.validate()?;
    if !self.subject_exists(input.subject_id).await? {
      return Err(CoreError::SubjectNotFound(input.subject_id).into());
    }

    let created_at = now();
    let at_str = encode_dt(created_at);
    let row = input.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO achievements (
             subject_id, title, kind, doc_path, pdf_path, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            row.subject_id,
            row.title,
            row.kind,
            row.doc_path,
            row.pdf_path,
            at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Achievement {
      id,
      subject_id: input.subject_id,
      title: input.title,
      kind: input.kind,
      doc_path: input.doc_path,
      pdf_path: input.pdf_path,
      created_at,
    })
  }

  async fn update_achievement(
    &self,
    id: i64,
    patch: AchievementPatch,
  ) -> Result<Achievement> {
    let mut next = self
      .get_achievement(id)
      .await?
      .ok_or(CoreError::AchievementNotFound(id))?;
    patch.apply_to(&mut next);
    next.validate()?;

    let row = next.clone();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE achievements
              SET title = ?1, kind = ?2, doc_path = ?3, pdf_path = ?4
            WHERE id = ?5",
          rusqlite::params![row.title, row.kind, row.doc_path, row.pdf_path, id],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::AchievementNotFound(id).into());
    }
    Ok(next)
  }

  async fn delete_achievement(&self, id: i64) -> Result<()> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM achievements WHERE id = ?1", [id])?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::AchievementNotFound(id).into());
    }
    Ok(())
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    let raws: Vec<RawProfile> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("{PROFILE_SELECT} ORDER BY created_at, email"))?;
        let rows = stmt
          .query_map([], RawProfile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{PROFILE_SELECT} WHERE user_id = ?1"),
              rusqlite::params![id_str],
              RawProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn create_profile(&self, input: NewProfile) -> Result<Profile> {
    input.validate()?;

    let profile = Profile {
      user_id:     input.user_id.unwrap_or_else(Uuid::new_v4),
      email:       input.email.trim().to_owned(),
      name:        input.name,
      role:        input.role,
      avatar_path: input.avatar_path,
      created_at:  now(),
    };

    if self.get_profile(profile.user_id).await?.is_some() {
      return Err(CoreError::DuplicateProfile(profile.user_id).into());
    }
    if self.email_taken(&profile.email, None).await? {
      return Err(CoreError::DuplicateEmail(profile.email).into());
    }

    let id_str = encode_uuid(profile.user_id);
    let email = profile.email.clone();
    let name = profile.name.clone();
    let role = profile.role.to_string();
    let avatar = profile.avatar_path.clone();
    let at_str = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (user_id, email, name, role, avatar_path, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, email, name, role, avatar, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(user_id = %profile.user_id, "created profile");
    Ok(profile)
  }

  async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<Profile> {
    let mut next = self
      .get_profile(user_id)
      .await?
      .ok_or(CoreError::ProfileNotFound(user_id))?;
    patch.apply_to(&mut next);
    next.email = next.email.trim().to_owned();
    next.validate()?;

    if patch.email.is_some() && self.email_taken(&next.email, Some(user_id)).await? {
      return Err(CoreError::DuplicateEmail(next.email).into());
    }

    let id_str = encode_uuid(user_id);
    let row = next.clone();
    let role = row.role.to_string();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE profiles
              SET email = ?1, name = ?2, role = ?3, avatar_path = ?4
            WHERE user_id = ?5",
          rusqlite::params![row.email, row.name, role, row.avatar_path, id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::ProfileNotFound(user_id).into());
    }
    Ok(next)
  }

  async fn delete_profile(&self, user_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(user_id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM profiles WHERE user_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(Removal::Missing);
        }
        let owned: i64 = tx.query_row(
          "SELECT COUNT(*) FROM subjects WHERE owner_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        if owned > 0 {
          return Ok(Removal::Referenced);
        }
        tx.execute(
          "DELETE FROM profiles WHERE user_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(Removal::Removed)
      })
      .await?;

    match outcome {
      Removal::Removed => Ok(()),
      Removal::Missing => Err(CoreError::ProfileNotFound(user_id).into()),
      Removal::Referenced => Err(CoreError::ProfileOwnsSubjects(user_id).into()),
    }
  }
}
