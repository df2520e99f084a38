//! Handlers for `/subjects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subjects` | `?owner_id=&status=&search=&sort_by=&sort_order=` |
//! | `POST`   | `/subjects` | Body: [`NewSubject`]; 201 |
//! | `GET`    | `/subjects/stats` | Aggregate counts as of now |
//! | `GET`    | `/subjects/{id}` | `ETag: "<version>"`; 404 if not found |
//! | `PATCH`  | `/subjects/{id}` | Body: [`SubjectPatch`]; honours `If-Match`; 412 if stale |
//! | `DELETE` | `/subjects/{id}` | 204; 409 while achievements exist |
//! | `GET`    | `/subjects/{id}/achievements` | Newest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::IntoResponse,
};
use chrono::Utc;
use keti_core::{
  ResearchStore,
  achievement::Achievement,
  filter::{self, SortKey, SortOrder, StatusFilter, SubjectFilters},
  stats::SubjectStats,
  store::SubjectQuery,
  subject::{NewSubject, SubjectPatch, SubjectView},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Versions ─────────────────────────────────────────────────────────────────

/// The entity tag for a subject version.
pub fn etag(version: u32) -> String { format!("\"{version}\"") }

/// Parse an `If-Match` header into an expected version.
///
/// Accepts `"3"`, `W/"3"` and bare `3`. A missing header or `*` imposes no
/// precondition.
pub fn if_match_version(headers: &HeaderMap) -> Result<Option<u32>, ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(None);
  };
  let raw = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("If-Match is not valid ASCII".into()))?
    .trim();
  if raw == "*" {
    return Ok(None);
  }
  let tag = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"');
  tag
    .parse()
    .map(Some)
    .map_err(|_| ApiError::BadRequest(format!("invalid If-Match: {raw:?}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub owner_id:   Option<Uuid>,
  pub status:     Option<StatusFilter>,
  pub search:     Option<String>,
  pub sort_by:    Option<SortKey>,
  pub sort_order: Option<SortOrder>,
}

/// `GET /subjects`
///
/// Owner and status restrict the query; search and sort are applied with the
/// same rules the dashboard uses locally.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<SubjectView>>, ApiError>
where
  S: ResearchStore,
{
  let status = params.status.unwrap_or_default();
  let query = SubjectQuery { owner_id: params.owner_id, status: status.status() };
  let subjects = store.list_subjects(&query).await.map_err(ApiError::store)?;

  let filters = SubjectFilters {
    search: params.search.unwrap_or_default(),
    status,
    sort_by: params.sort_by.unwrap_or_default(),
    sort_order: params.sort_order.unwrap_or_default(),
  };
  let out = filter::apply(&subjects, &filters).into_iter().cloned().collect();
  Ok(Json(out))
}

// ─── Stats ────────────────────────────────────────────────────────────────────

/// `GET /subjects/stats`
pub async fn stats<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<SubjectStats>, ApiError>
where
  S: ResearchStore,
{
  let schedules = store.list_schedules().await.map_err(ApiError::store)?;
  Ok(Json(SubjectStats::compute(&schedules, Utc::now())))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResearchStore,
{
  let subject = store.create_subject(body).await.map_err(ApiError::store)?;
  tracing::info!(id = subject.id, "subject created");
  Ok((
    StatusCode::CREATED,
    [(header::ETAG, etag(subject.version))],
    Json(subject),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResearchStore,
{
  let view = store
    .get_subject(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(([(header::ETAG, etag(view.subject.version))], Json(view)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /subjects/{id}`
///
/// An `If-Match` header takes precedence over `expected_version` in the body.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  headers: HeaderMap,
  Json(mut patch): Json<SubjectPatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResearchStore,
{
  if let Some(version) = if_match_version(&headers)? {
    patch.expected_version = Some(version);
  }
  let subject = store.update_subject(id, patch).await.map_err(ApiError::store)?;
  tracing::info!(id, version = subject.version, "subject updated");
  Ok(([(header::ETAG, etag(subject.version))], Json(subject)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /subjects/{id}`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ResearchStore,
{
  store.delete_subject(id).await.map_err(ApiError::store)?;
  tracing::info!(id, "subject deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Achievements of a subject ────────────────────────────────────────────────

/// `GET /subjects/{id}/achievements`
pub async fn achievements<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<Achievement>>, ApiError>
where
  S: ResearchStore,
{
  if store.get_subject(id).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::NotFound(format!("subject {id} not found")));
  }
  let list = store
    .list_achievements(Some(id))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(list))
}
