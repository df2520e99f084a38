//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"error": <kind>, "message": <text>, "status":
//! <code>}` so clients can branch on `error` without parsing `message`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use keti_core::{Classify, ErrorKind};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("{source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  /// Wrap a backend error, keeping its classification.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    ApiError::Store { kind: e.kind(), source: Box::new(e) }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      ApiError::NotFound(_) => ErrorKind::NotFound,
      ApiError::BadRequest(_) => ErrorKind::Invalid,
      ApiError::Store { kind, .. } => *kind,
    }
  }
}

/// HTTP status for each error classification.
pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::Conflict | ErrorKind::Referenced => StatusCode::CONFLICT,
    ErrorKind::Stale => StatusCode::PRECONDITION_FAILED,
    ErrorKind::Invalid => StatusCode::BAD_REQUEST,
    ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
    ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let kind = self.kind();
    let status = status_for(kind);
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::debug!(error = %self, %status, "request rejected");
    }
    let body = json!({
      "error":   kind.as_str(),
      "message": self.to_string(),
      "status":  status.as_u16(),
    });
    (status, Json(body)).into_response()
  }
}
