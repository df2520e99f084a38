//! Handlers for `/profiles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/profiles` | Oldest first |
//! | `POST`   | `/profiles` | Body: [`NewProfile`]; 409 on a duplicate email |
//! | `GET`    | `/profiles/{id}` | 404 if not found |
//! | `PATCH`  | `/profiles/{id}` | Body: [`ProfilePatch`] |
//! | `DELETE` | `/profiles/{id}` | 204; 409 while the profile owns subjects |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use keti_core::{
  ResearchStore,
  profile::{NewProfile, Profile, ProfilePatch},
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /profiles`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Profile>>, ApiError>
where
  S: ResearchStore,
{
  let profiles = store.list_profiles().await.map_err(ApiError::store)?;
  Ok(Json(profiles))
}

/// `POST /profiles`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewProfile>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResearchStore,
{
  let profile = store.create_profile(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(profile)))
}

/// `GET /profiles/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError>
where
  S: ResearchStore,
{
  store
    .get_profile(id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("profile {id} not found")))
}

/// `PATCH /profiles/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>, ApiError>
where
  S: ResearchStore,
{
  let profile = store.update_profile(id, patch).await.map_err(ApiError::store)?;
  Ok(Json(profile))
}

/// `DELETE /profiles/{id}`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ResearchStore,
{
  store.delete_profile(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
