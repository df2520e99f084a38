//! HTTP Basic-auth gate, verifier and identity extractor.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use keti_core::profile::Role;
use serde::Serialize;
use std::sync::Arc;

use crate::error::Error;

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  /// Role reported for the configured account.
  pub role:          Role,
}

impl AuthConfig {
  /// Build a config, checking that `password_hash` is a PHC string so a typo
  /// fails at startup rather than on the first request.
  pub fn new(
    username: impl Into<String>,
    password_hash: impl Into<String>,
    role: Role,
  ) -> Result<Self, Error> {
    let password_hash = password_hash.into();
    PasswordHash::new(&password_hash)
      .map_err(|e| Error::InvalidHash(e.to_string()))?;
    Ok(AuthConfig { username: username.into(), password_hash, role })
  }
}

/// The authenticated caller, attached to every request under `/api`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
  pub username: String,
  pub role:     Role,
}

/// Verify Basic credentials from `headers`.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Identity, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Identity { username: username.to_owned(), role: config.role })
}

/// Middleware: reject unauthenticated requests, attach [`Identity`] to the
/// rest.
pub async fn require_auth(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let identity = match verify_auth(req.headers(), &auth) {
    Ok(identity) => identity,
    Err(e) => {
      tracing::warn!(uri = %req.uri(), "rejected unauthenticated request");
      return Err(e);
    }
  };
  req.extensions_mut().insert(identity);
  Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for Identity
where
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<Identity>()
      .cloned()
      .ok_or(Error::Unauthorized)
  }
}
