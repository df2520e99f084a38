//! HTTP server assembly for Keti.
//!
//! Mounts the REST API from `keti-api` under `/api` behind HTTP Basic auth,
//! adds the session endpoint and an unauthenticated health check, and wraps
//! everything in request tracing and a body size limit.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/health` | Public; `ok` |
//! | `GET`  | `/api/session` | The authenticated identity |
//! | *      | `/api/...` | See `keti_api` |

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::DefaultBodyLimit,
  middleware,
  routing::get,
};
use keti_core::{ResearchStore, profile::Role};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, Identity, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Default request body limit: 50 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Runtime server configuration, deserialised from `config.toml` and
/// `KETI_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  #[serde(default = "default_role")]
  pub auth_role:          Role,
  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes:     usize,
}

fn default_role() -> Role { Role::Admin }

fn default_max_body_bytes() -> usize { DEFAULT_MAX_BODY_BYTES }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs, shared behind `Arc`s.
pub struct AppState<S: ResearchStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

impl<S: ResearchStore> Clone for AppState<S> {
  fn clone(&self) -> Self {
    AppState {
      store:  self.store.clone(),
      config: self.config.clone(),
      auth:   self.auth.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ResearchStore + 'static,
{
  let api = keti_api::api_router(state.store.clone()).route("/session", get(session));

  Router::new()
    .nest("/api", api)
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_auth))
    // Routes added after the auth layer are public.
    .route("/health", get(health))
    .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
    .layer(TraceLayer::new_for_http())
}

/// `GET /api/session`
async fn session(identity: Identity) -> Json<Identity> { Json(identity) }

/// `GET /health`
async fn health() -> &'static str { "ok" }

#[cfg(test)]
mod tests {
  use super::*;
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use keti_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::Value;
  use tower::ServiceExt as _;

  async fn make_state(password: &str, max_body_bytes: usize) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:               "127.0.0.1".to_string(),
        port:               3000,
        store_path:         PathBuf::from(":memory:"),
        auth_username:      "user".to_string(),
        auth_password_hash: hash.clone(),
        auth_role:          Role::Admin,
        max_body_bytes,
      }),
      auth: Arc::new(AuthConfig::new("user", hash, Role::Admin).unwrap()),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn health_is_public() {
    let state = make_state("secret", DEFAULT_MAX_BODY_BYTES).await;
    let resp  = oneshot_raw(state, "GET", "/health", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_requires_credentials() {
    let state = make_state("secret", DEFAULT_MAX_BODY_BYTES).await;
    let resp  = oneshot_raw(state, "GET", "/api/subjects", vec![], "").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert!(challenge.to_str().unwrap().starts_with("Basic"));
    assert_eq!(json_body(resp).await["error"], "unauthorized");
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let state = make_state("secret", DEFAULT_MAX_BODY_BYTES).await;
    let auth  = auth_header("user", "nope");
    let resp  = oneshot_raw(
      state,
      "GET",
      "/api/session",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn session_reports_identity() {
    let state = make_state("secret", DEFAULT_MAX_BODY_BYTES).await;
    let auth  = auth_header("user", "secret");
    let resp  = oneshot_raw(
      state,
      "GET",
      "/api/session",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["username"], "user");
    assert_eq!(body["role"], "admin");
  }

  #[tokio::test]
  async fn authenticated_create_then_list() {
    let state = make_state("secret", DEFAULT_MAX_BODY_BYTES).await;
    let auth  = auth_header("user", "secret");
    let resp  = oneshot_raw(
      state.clone(),
      "POST",
      "/api/subjects",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::CONTENT_TYPE, "application/json"),
      ],
      r#"{"title":"Alpha","status":"launched"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = oneshot_raw(
      state,
      "GET",
      "/api/subjects",
      vec![(header::AUTHORIZATION, auth.as_str())],
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = json_body(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "Alpha");
  }

  #[tokio::test]
  async fn oversized_body_is_413() {
    let state = make_state("secret", 64).await;
    let auth  = auth_header("user", "secret");
    let title = "x".repeat(128);
    let body  = format!(r#"{{"title":"{title}"}}"#);
    let resp  = oneshot_raw(
      state,
      "POST",
      "/api/subjects",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::CONTENT_TYPE, "application/json"),
      ],
      &body,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }
}
