//! Handlers for the subject's own account: profile, settings, deletion, and
//! the admin-guarded signup endpoint that issues bearer tokens.

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Serialize;
use vigil_core::{
  store::VigilStore,
  subject::{NewSubject, Subject, SubjectSettings},
};

use crate::{
  AppState,
  auth::{Admin, Caller, generate_token, token_hash},
  error::ApiError,
};

/// `GET /api/subject`
pub async fn profile<S>(caller: Caller) -> Json<Subject>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Json(caller.0)
}

/// `PATCH /api/settings` — partial update, absent fields untouched.
pub async fn update_settings<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<SubjectSettings>,
) -> Result<Json<Subject>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subject = state
    .engine
    .store()
    .update_settings(caller.0.subject_id, body)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("subject {} not found", caller.0.subject_id))
    })?;
  Ok(Json(subject))
}

/// `DELETE /api/account` — cascades to contacts, tokens, and the audit
/// trail.
pub async fn delete_account<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<StatusCode, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state
    .engine
    .store()
    .delete_subject(caller.0.subject_id)
    .await
    .map_err(ApiError::internal)?;
  tracing::info!(subject_id = %caller.0.subject_id, "account deleted");
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CreatedSubject {
  pub subject: Subject,
  /// Shown exactly once; only its hash is stored.
  pub token:   String,
}

/// `POST /api/subjects` — admin-guarded signup collaborator. Creates the
/// subject in ONBOARDING and issues its bearer token.
pub async fn create_subject<S>(
  State(state): State<AppState<S>>,
  _admin: Admin,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subject = state
    .engine
    .store()
    .create_subject(body)
    .await
    .map_err(ApiError::internal)?;

  let token = generate_token();
  state
    .engine
    .store()
    .insert_token(token_hash(&token), subject.subject_id)
    .await
    .map_err(ApiError::internal)?;

  Ok((StatusCode::CREATED, Json(CreatedSubject { subject, token })))
}
