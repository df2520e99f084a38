//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing or invalid credentials")]
  Unauthorized,

  /// The configured password hash is not a PHC string.
  #[error("invalid password hash: {0}")]
  InvalidHash(String),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::InvalidHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let kind = if status == StatusCode::UNAUTHORIZED {
      "unauthorized"
    } else {
      "internal"
    };
    let body = json!({
      "error":   kind,
      "message": self.to_string(),
      "status":  status.as_u16(),
    });
    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"keti\""),
      );
    }
    res
  }
}
