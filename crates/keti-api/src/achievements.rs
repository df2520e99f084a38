//! Handlers for `/achievements` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/achievements` | Optional `?subject_id=` |
//! | `POST`   | `/achievements` | Body: [`NewAchievement`]; 404 if the subject is missing |
//! | `GET`    | `/achievements/{id}` | 404 if not found |
//! | `PATCH`  | `/achievements/{id}` | Body: [`AchievementPatch`] |
//! | `DELETE` | `/achievements/{id}` | 204 |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use keti_core::{
  ResearchStore,
  achievement::{Achievement, AchievementPatch, NewAchievement},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub subject_id: Option<i64>,
}

/// `GET /achievements[?subject_id=<id>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Achievement>>, ApiError>
where
  S: ResearchStore,
{
  let list = store
    .list_achievements(params.subject_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(list))
}

/// `POST /achievements`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewAchievement>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResearchStore,
{
  let achievement = store.create_achievement(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(achievement)))
}

/// `GET /achievements/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Achievement>, ApiError>
where
  S: ResearchStore,
{
  store
    .get_achievement(id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("achievement {id} not found")))
}

/// `PATCH /achievements/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(patch): Json<AchievementPatch>,
) -> Result<Json<Achievement>, ApiError>
where
  S: ResearchStore,
{
  let achievement = store
    .update_achievement(id, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(achievement))
}

/// `DELETE /achievements/{id}`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ResearchStore,
{
  store.delete_achievement(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
