//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use keti_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

async fn app() -> axum::Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(Arc::new(store))
}

async fn send(
  app: &axum::Router,
  method: &str,
  uri: &str,
  headers: Vec<(header::HeaderName, &str)>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in headers {
    builder = builder.header(k, v);
  }
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  app.clone().oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn create_subject(app: &axum::Router, body: Value) -> Value {
  let resp = send(app, "POST", "/subjects", vec![], Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  json_body(resp).await
}

// ── Subjects ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_returns_201_and_etag() {
  let app = app().await;
  let resp = send(
    &app,
    "POST",
    "/subjects",
    vec![],
    Some(json!({ "title": "Alpha", "deadline_date": "2030-01-01" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  assert_eq!(resp.headers().get(header::ETAG).unwrap(), "\"1\"");

  let created = json_body(resp).await;
  assert_eq!(created["title"], "Alpha");
  assert_eq!(created["status"], "preparing");
  assert_eq!(created["version"], 1);

  let id = created["id"].as_i64().unwrap();
  let resp = send(&app, "GET", &format!("/subjects/{id}"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let view = json_body(resp).await;
  assert_eq!(view["title"], "Alpha");
  assert_eq!(view["achievements"], 0);
}

#[tokio::test]
async fn invalid_title_is_400_with_error_body() {
  let app = app().await;
  let resp =
    send(&app, "POST", "/subjects", vec![], Some(json!({ "title": " " }))).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body = json_body(resp).await;
  assert_eq!(body["error"], "invalid");
  assert_eq!(body["status"], 400);
  assert!(body["message"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn missing_subject_is_404() {
  let app = app().await;
  let resp = send(&app, "GET", "/subjects/41", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert_eq!(json_body(resp).await["error"], "not_found");

  let resp = send(&app, "GET", "/subjects/41/achievements", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_applies_search_status_and_sort() {
  let app = app().await;
  create_subject(&app, json!({ "title": "Alpha", "status": "launched" })).await;
  create_subject(&app, json!({ "title": "Beta", "status": "launched" })).await;
  create_subject(&app, json!({ "title": "alphabet" })).await;

  let resp = send(&app, "GET", "/subjects", vec![], None).await;
  let titles: Vec<Value> =
    json_body(resp).await.as_array().unwrap().iter().map(|s| s["title"].clone()).collect();
  assert_eq!(titles, vec![json!("alphabet"), json!("Beta"), json!("Alpha")]);

  let resp = send(
    &app,
    "GET",
    "/subjects?search=ALPHA&sort_by=title&sort_order=asc",
    vec![],
    None,
  )
  .await;
  let titles: Vec<Value> =
    json_body(resp).await.as_array().unwrap().iter().map(|s| s["title"].clone()).collect();
  assert_eq!(titles, vec![json!("Alpha"), json!("alphabet")]);

  let resp = send(&app, "GET", "/subjects?status=launched&search=a", vec![], None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn patch_honours_if_match() {
  let app = app().await;
  let created = create_subject(&app, json!({ "title": "Alpha" })).await;
  let uri = format!("/subjects/{}", created["id"]);

  let resp = send(
    &app,
    "PATCH",
    &uri,
    vec![(header::IF_MATCH, "\"1\"")],
    Some(json!({ "status": "launched" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers().get(header::ETAG).unwrap(), "\"2\"");
  assert_eq!(json_body(resp).await["status"], "launched");

  let resp = send(
    &app,
    "PATCH",
    &uri,
    vec![(header::IF_MATCH, "\"1\"")],
    Some(json!({ "title": "Late" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
  assert_eq!(json_body(resp).await["error"], "stale");

  let resp = send(
    &app,
    "PATCH",
    &uri,
    vec![(header::IF_MATCH, "not-a-version")],
    Some(json!({ "title": "Late" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_is_refused_while_achievements_exist() {
  let app = app().await;
  let subject = create_subject(&app, json!({ "title": "Alpha" })).await;
  let id = subject["id"].as_i64().unwrap();

  let resp = send(
    &app,
    "POST",
    "/achievements",
    vec![],
    Some(json!({ "subject_id": id, "title": "Paper", "kind": "paper" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let achievement = json_body(resp).await;

  let resp = send(&app, "DELETE", &format!("/subjects/{id}"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(resp).await["error"], "referenced");

  let resp = send(&app, "GET", &format!("/subjects/{id}/achievements"), vec![], None).await;
  assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

  let resp = send(
    &app,
    "DELETE",
    &format!("/achievements/{}", achievement["id"]),
    vec![],
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let resp = send(&app, "DELETE", &format!("/subjects/{id}"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  let resp = send(&app, "GET", &format!("/subjects/{id}"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_count_by_status() {
  let app = app().await;
  let soon = (chrono::Utc::now().date_naive() + chrono::Duration::days(3)).to_string();
  create_subject(&app, json!({ "title": "A", "status": "launched", "deadline_date": soon })).await;
  create_subject(&app, json!({ "title": "B", "status": "finished" })).await;
  create_subject(&app, json!({ "title": "C" })).await;

  let resp = send(&app, "GET", "/subjects/stats", vec![], None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(
    json_body(resp).await,
    json!({ "total": 3, "preparing": 1, "launched": 1, "finished": 1, "due_soon": 1 })
  );
}

// ── Achievements ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn achievement_for_missing_subject_is_404() {
  let app = app().await;
  let resp = send(
    &app,
    "POST",
    "/achievements",
    vec![],
    Some(json!({ "subject_id": 9, "title": "Orphan" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn achievement_patch_clears_nullable_fields() {
  let app = app().await;
  let subject = create_subject(&app, json!({ "title": "Alpha" })).await;
  let resp = send(
    &app,
    "POST",
    "/achievements",
    vec![],
    Some(json!({ "subject_id": subject["id"], "title": "Paper", "doc_path": "a.docx" })),
  )
  .await;
  let achievement = json_body(resp).await;

  let resp = send(
    &app,
    "PATCH",
    &format!("/achievements/{}", achievement["id"]),
    vec![],
    Some(json!({ "doc_path": null, "pdf_path": "a.pdf" })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  let updated = json_body(resp).await;
  assert_eq!(updated["doc_path"], Value::Null);
  assert_eq!(updated["pdf_path"], "a.pdf");
  assert_eq!(updated["title"], "Paper");
}

// ── Profiles ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_profile_email_is_409() {
  let app = app().await;
  let body = json!({ "email": "ada@example.org", "name": "Ada", "role": "admin" });
  let resp = send(&app, "POST", "/profiles", vec![], Some(body.clone())).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let profile = json_body(resp).await;
  assert_eq!(profile["role"], "admin");

  let resp = send(&app, "POST", "/profiles", vec![], Some(body)).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert_eq!(json_body(resp).await["error"], "conflict");

  let resp = send(
    &app,
    "GET",
    &format!("/profiles/{}", profile["user_id"].as_str().unwrap()),
    vec![],
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn profile_owning_subjects_cannot_be_deleted() {
  let app = app().await;
  let resp = send(
    &app,
    "POST",
    "/profiles",
    vec![],
    Some(json!({ "email": "grace@example.org", "name": "Grace" })),
  )
  .await;
  let profile = json_body(resp).await;
  let user_id = profile["user_id"].as_str().unwrap().to_owned();

  let subject =
    create_subject(&app, json!({ "title": "Compiler", "owner_id": user_id })).await;
  let resp = send(&app, "GET", &format!("/subjects?owner_id={user_id}"), vec![], None).await;
  let listed = json_body(resp).await;
  assert_eq!(listed[0]["id"], subject["id"]);
  assert_eq!(listed[0]["owner_name"], "Grace");

  let resp = send(&app, "DELETE", &format!("/profiles/{user_id}"), vec![], None).await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
}
