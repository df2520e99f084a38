//! Async HTTP client wrapping the Keti JSON API.
//!
//! [`ApiClient`] implements [`ResearchStore`], so the same
//! [`keti_core::Dashboard`] that runs against SQLite in tests runs against a
//! remote server here.

use std::time::Duration;

use keti_core::{
  Classify, ErrorKind, ResearchStore,
  achievement::{Achievement, AchievementPatch, NewAchievement},
  profile::{NewProfile, Profile, ProfilePatch},
  stats::SubjectStats,
  store::SubjectQuery,
  subject::{NewSubject, Schedule, Subject, SubjectPatch, SubjectView},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionUser;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The server answered with a non-success status.
  #[error("{message} ({status})")]
  Api {
    status:  StatusCode,
    kind:    ErrorKind,
    message: String,
  },
}

impl Classify for ClientError {
  fn kind(&self) -> ErrorKind {
    match self {
      ClientError::Http(e) if e.is_decode() => ErrorKind::Internal,
      ClientError::Http(_) => ErrorKind::Unavailable,
      ClientError::Api { kind, .. } => *kind,
    }
  }
}

/// Shape of the server's error body; every field is optional so that
/// proxies returning something else still produce a usable error.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error:   Option<ErrorKind>,
  #[serde(default)]
  message: Option<String>,
}

/// Classification implied by a status code alone.
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
  match status {
    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Invalid,
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
    StatusCode::NOT_FOUND => ErrorKind::NotFound,
    StatusCode::CONFLICT => ErrorKind::Conflict,
    StatusCode::PRECONDITION_FAILED => ErrorKind::Stale,
    StatusCode::SERVICE_UNAVAILABLE
    | StatusCode::BAD_GATEWAY
    | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Unavailable,
    _ => ErrorKind::Internal,
  }
}

impl ClientError {
  async fn from_response(resp: Response) -> Self {
    let status = resp.status();
    let body: ErrorBody = resp.json().await.unwrap_or_default();
    ClientError::Api {
      status,
      kind: body.error.unwrap_or_else(|| kind_for_status(status)),
      message: body
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_owned()),
    }
  }
}

type Result<T, E = ClientError> = std::result::Result<T, E>;

// ─── Client ───────────────────────────────────────────────────────────────────

/// Connection settings for the Keti API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Async HTTP client for the Keti JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ApiConfig { &self.config }

  pub fn has_credentials(&self) -> bool { !self.config.username.is_empty() }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// Send `req`, turning non-success statuses into [`ClientError::Api`].
  async fn send(&self, req: RequestBuilder) -> Result<Response> {
    let resp = self.auth(req).send().await?;
    tracing::debug!(url = %resp.url(), status = %resp.status(), "response");
    if resp.status().is_success() {
      Ok(resp)
    } else {
      Err(ClientError::from_response(resp).await)
    }
  }

  async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    Ok(self.send(req).await?.json().await?)
  }

  /// Like [`ApiClient::json`], mapping 404 to `None`.
  async fn json_opt<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>> {
    match self.json(req).await {
      Ok(v) => Ok(Some(v)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e),
    }
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// `GET /api/session`: the identity the server sees for our credentials.
  pub async fn session(&self) -> Result<SessionUser> {
    self.json(self.client.get(self.url("/session"))).await
  }

  /// `GET /api/subjects/stats`: server-computed statistics.
  pub async fn stats(&self) -> Result<SubjectStats> {
    self.json(self.client.get(self.url("/subjects/stats"))).await
  }
}

// ─── ResearchStore impl ───────────────────────────────────────────────────────

impl ResearchStore for ApiClient {
  type Error = ClientError;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn list_subjects(&self, query: &SubjectQuery) -> Result<Vec<SubjectView>> {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(owner) = query.owner_id {
      params.push(("owner_id", owner.to_string()));
    }
    if let Some(status) = query.status {
      params.push(("status", status.to_string()));
    }
    self
      .json(self.client.get(self.url("/subjects")).query(&params))
      .await
  }

  async fn get_subject(&self, id: i64) -> Result<Option<SubjectView>> {
    self
      .json_opt(self.client.get(self.url(&format!("/subjects/{id}"))))
      .await
  }

  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    self
      .json(self.client.post(self.url("/subjects")).json(&input))
      .await
  }

  async fn update_subject(&self, id: i64, patch: SubjectPatch) -> Result<Subject> {
    let mut req = self
      .client
      .patch(self.url(&format!("/subjects/{id}")))
      .json(&patch);
    if let Some(version) = patch.expected_version {
      req = req.header(header::IF_MATCH, format!("\"{version}\""));
    }
    self.json(req).await
  }

  async fn delete_subject(&self, id: i64) -> Result<()> {
    self
      .send(self.client.delete(self.url(&format!("/subjects/{id}"))))
      .await?;
    Ok(())
  }

  /// The API has no schedule projection; full listings carry the same
  /// fields.
  async fn list_schedules(&self) -> Result<Vec<Schedule>> {
    let views: Vec<SubjectView> =
      self.json(self.client.get(self.url("/subjects"))).await?;
    Ok(views.iter().map(|v| Schedule::from(&v.subject)).collect())
  }

  // ── Achievements ──────────────────────────────────────────────────────────

  async fn list_achievements(&self, subject_id: Option<i64>) -> Result<Vec<Achievement>> {
    let req = match subject_id {
      Some(id) => self.client.get(self.url(&format!("/subjects/{id}/achievements"))),
      None => self.client.get(self.url("/achievements")),
    };
    self.json(req).await
  }

  async fn get_achievement(&self, id: i64) -> Result<Option<Achievement>> {
    self
      .json_opt(self.client.get(self.url(&format!("/achievements/{id}"))))
      .await
  }

  async fn create_achievement(&self, input: NewAchievement) -> Result<Achievement> {
    self
      .json(self.client.post(self.url("/achievements")).json(&input))
      .await
  }

  async fn update_achievement(&self, id: i64, patch: AchievementPatch) -> Result<Achievement> {
    self
      .json(
        self
          .client
          .patch(self.url(&format!("/achievements/{id}")))
          .json(&patch),
      )
      .await
  }

  async fn delete_achievement(&self, id: i64) -> Result<()> {
    self
      .send(self.client.delete(self.url(&format!("/achievements/{id}"))))
      .await?;
    Ok(())
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn list_profiles(&self) -> Result<Vec<Profile>> {
    self.json(self.client.get(self.url("/profiles"))).await
  }

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    self
      .json_opt(self.client.get(self.url(&format!("/profiles/{user_id}"))))
      .await
  }

  async fn create_profile(&self, input: NewProfile) -> Result<Profile> {
    self
      .json(self.client.post(self.url("/profiles")).json(&input))
      .await
  }

  async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> Result<Profile> {
    self
      .json(
        self
          .client
          .patch(self.url(&format!("/profiles/{user_id}")))
          .json(&patch),
      )
      .await
  }

  async fn delete_profile(&self, user_id: Uuid) -> Result<()> {
    self
      .send(self.client.delete(self.url(&format!("/profiles/{user_id}"))))
      .await?;
    Ok(())
  }
}
