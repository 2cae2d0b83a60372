//! End-to-end router tests: an in-memory store, mock channels, and
//! `tower::ServiceExt::oneshot` requests against the full [`api_router`].

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use vigil_channels::{ChannelSender, ChannelSet, mock::MockSender};
use vigil_core::contact::ChannelKind;
use vigil_engine::{Engine, EngineConfig};
use vigil_store_sqlite::SqliteStore;

use crate::{AppState, AuthConfig, api_router};

const ADMIN_TOKEN: &str = "admin-sesame";

async fn app() -> Router {
  app_with(EngineConfig::default(), mock_channels()).await
}

async fn app_with(config: EngineConfig, channels: ChannelSet) -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let state = AppState {
    engine: Engine::new(store, channels, config),
    auth:   Arc::new(AuthConfig::new(ADMIN_TOKEN)),
  };
  api_router(state)
}

fn mock_channels() -> ChannelSet {
  let email: Arc<dyn ChannelSender> =
    Arc::new(MockSender::new(ChannelKind::Email));
  ChannelSet {
    push:  None,
    email: Some(email),
    sms:   None,
  }
}

/// Fire one request at the router and parse the JSON body (Null when empty).
async fn request(
  app: &Router,
  method: &str,
  path: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(path);
  if let Some(token) = token {
    builder =
      builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let req = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

/// Admin signup; returns the subject JSON and its bearer token.
async fn signup(app: &Router, email: &str) -> (Value, String) {
  let (status, body) = request(
    app,
    "POST",
    "/api/subjects",
    Some(ADMIN_TOKEN),
    Some(json!({ "email": email, "phone": null, "display_name": null })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let token = body["token"].as_str().unwrap().to_string();
  (body["subject"].clone(), token)
}

/// Create a contact for `owner_token`; returns the contact JSON.
async fn add_contact(app: &Router, owner_token: &str, dest: &str) -> Value {
  let (status, contact) = request(
    app,
    "POST",
    "/api/contacts",
    Some(owner_token),
    Some(json!({ "name": "Kim", "channel": "EMAIL", "destination": dest })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  contact
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_without_a_valid_token_are_401() {
  let app = app().await;

  let (status, _) = request(&app, "POST", "/api/checkin", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) =
    request(&app, "GET", "/api/subject", Some("not-a-token"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scan_requires_the_admin_token() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;

  let (status, _) = request(&app, "POST", "/api/scan", Some(&token), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, report) =
    request(&app, "POST", "/api/scan", Some(ADMIN_TOKEN), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["scanned"], 0);
}

#[tokio::test]
async fn signup_issues_a_working_token() {
  let app = app().await;
  let (created, token) = signup(&app, "sam@example.com").await;
  assert_eq!(created["state"], "ONBOARDING");

  let (status, subject) =
    request(&app, "GET", "/api/subject", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subject["email"], "sam@example.com");
  assert_eq!(subject["subject_id"], created["subject_id"]);
}

// ─── State machine ───────────────────────────────────────────────────────────

#[tokio::test]
async fn checkin_activates_the_subject() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;

  let (status, subject) =
    request(&app, "POST", "/api/checkin", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subject["state"], "ACTIVE");
  assert!(!subject["last_confirmed_at"].is_null());
}

#[tokio::test]
async fn checkin_while_escalated_is_409() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;
  request(&app, "POST", "/api/checkin", Some(&token), None).await;
  request(&app, "POST", "/api/panic", Some(&token), None).await;

  let (status, body) =
    request(&app, "POST", "/api/checkin", Some(&token), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("escalat"));
}

#[tokio::test]
async fn panic_is_idempotent_over_http() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;

  let (status, first) =
    request(&app, "POST", "/api/panic", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["escalated"], true);

  let (status, second) =
    request(&app, "POST", "/api/panic", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(second["escalated"], false);
  assert!(second["report"].is_null());
}

#[tokio::test]
async fn resolve_returns_the_subject_to_active() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;
  request(&app, "POST", "/api/panic", Some(&token), None).await;

  let (status, body) =
    request(&app, "POST", "/api/resolve", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["subject"]["state"], "ACTIVE");
}

// ─── Settings & account ──────────────────────────────────────────────────────

#[tokio::test]
async fn settings_patch_is_partial() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;

  let (status, subject) = request(
    &app,
    "PATCH",
    "/api/settings",
    Some(&token),
    Some(json!({ "checkin_interval": 3600, "vacation_mode": true })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(subject["checkin_interval"], 3600);
  assert_eq!(subject["vacation_mode"], true);
  // Untouched default.
  assert_eq!(subject["grace_period"], 3600);
}

#[tokio::test]
async fn delete_account_revokes_the_token() {
  let app = app().await;
  let (_, token) = signup(&app, "sam@example.com").await;

  let (status, _) =
    request(&app, "DELETE", "/api/account", Some(&token), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) =
    request(&app, "GET", "/api/subject", Some(&token), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Contacts & linking ──────────────────────────────────────────────────────

#[tokio::test]
async fn contact_lifecycle_over_http() {
  let app = app().await;
  let (_, owner) = signup(&app, "sam@example.com").await;
  let (_, kim) = signup(&app, "kim@example.com").await;

  let contact = add_contact(&app, &owner, "kim@example.com").await;
  assert_eq!(contact["status"], "PENDING");
  let id = contact["contact_id"].as_str().unwrap().to_string();

  let (status, body) = request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/invite"),
    Some(&owner),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert!(!body["contact"]["invite_sent_at"].is_null());

  let (status, confirmed) = request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/confirm"),
    Some(&kim),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(confirmed["status"], "CONFIRMED");

  let (status, list) =
    request(&app, "GET", "/api/contacts", Some(&owner), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(list.as_array().unwrap().len(), 1);
  assert_eq!(list[0]["status"], "CONFIRMED");
}

#[tokio::test]
async fn confirm_by_the_wrong_subject_is_403() {
  let app = app().await;
  let (_, owner) = signup(&app, "sam@example.com").await;
  let (_, impostor) = signup(&app, "mallory@example.com").await;

  let contact = add_contact(&app, &owner, "kim@example.com").await;
  let id = contact["contact_id"].as_str().unwrap();
  request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/invite"),
    Some(&owner),
    None,
  )
  .await;

  let (status, _) = request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/confirm"),
    Some(&impostor),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn destination_cap_is_422() {
  let config = EngineConfig {
    max_owners_per_destination: 1,
    ..EngineConfig::default()
  };
  let app = app_with(config, mock_channels()).await;
  let (_, a) = signup(&app, "a@example.com").await;
  let (_, b) = signup(&app, "b@example.com").await;

  add_contact(&app, &a, "kim@example.com").await;
  let (status, body) = request(
    &app,
    "POST",
    "/api/contacts",
    Some(&b),
    Some(json!({
      "name": "Kim",
      "channel": "EMAIL",
      "destination": "kim@example.com"
    })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].as_str().unwrap().contains("destination"));
}

#[tokio::test]
async fn undeliverable_invite_is_502() {
  let app = app_with(EngineConfig::default(), ChannelSet::default()).await;
  let (_, owner) = signup(&app, "sam@example.com").await;

  let contact = add_contact(&app, &owner, "kim@example.com").await;
  let id = contact["contact_id"].as_str().unwrap();

  let (status, body) = request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/invite"),
    Some(&owner),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert!(body["error"].as_str().unwrap().contains("undeliverable"));
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_history_lists_deliveries() {
  let app = app().await;
  let (_, owner) = signup(&app, "sam@example.com").await;
  let (_, kim) = signup(&app, "kim@example.com").await;

  let contact = add_contact(&app, &owner, "kim@example.com").await;
  let id = contact["contact_id"].as_str().unwrap().to_string();
  request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/invite"),
    Some(&owner),
    None,
  )
  .await;
  request(
    &app,
    "POST",
    &format!("/api/contacts/{id}/confirm"),
    Some(&kim),
    None,
  )
  .await;

  let (status, report) =
    request(&app, "POST", "/api/test-alert", Some(&owner), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["outcomes"][0]["status"], "SENT");

  let (status, history) =
    request(&app, "GET", "/api/notifications", Some(&owner), None).await;
  assert_eq!(status, StatusCode::OK);
  let entries = history.as_array().unwrap();
  assert!(!entries.is_empty());
  assert_eq!(entries[0]["event_type"], "TEST_ALERT");
  assert_eq!(entries[0]["status"], "SENT");
}
