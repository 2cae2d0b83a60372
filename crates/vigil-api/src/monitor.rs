//! Handlers for the state-machine endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/checkin` | 409 while escalated |
//! | `POST` | `/api/panic` | idempotent |
//! | `POST` | `/api/resolve` | dispatches the stand-down |
//! | `POST` | `/api/test-alert` | dry run |
//! | `POST` | `/api/scan` | admin token only |

use axum::{Json, extract::State};
use serde::Serialize;
use vigil_core::{
  event::DeliveryReport,
  store::VigilStore,
  subject::Subject,
};
use vigil_engine::ScanReport;

use crate::{
  AppState,
  auth::{Admin, Caller},
  error::ApiError,
};

/// `POST /api/checkin`
pub async fn checkin<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<Subject>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subject = state.engine.check_in(caller.0.subject_id).await?;
  Ok(Json(subject))
}

#[derive(Debug, Serialize)]
pub struct PanicResponse {
  /// `false` means the subject was already escalated and nothing was
  /// re-sent.
  pub escalated: bool,
  pub report:    Option<DeliveryReport>,
}

/// `POST /api/panic`
pub async fn panic<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<PanicResponse>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state.engine.panic(caller.0.subject_id).await?;
  Ok(Json(PanicResponse {
    escalated: report.is_some(),
    report,
  }))
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
  pub subject: Subject,
  pub report:  DeliveryReport,
}

/// `POST /api/resolve`
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<ResolveResponse>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (subject, report) =
    state.engine.resolve_alert(caller.0.subject_id).await?;
  Ok(Json(ResolveResponse { subject, report }))
}

/// `POST /api/test-alert`
pub async fn test_alert<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<DeliveryReport>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state.engine.send_test_alert(caller.0.subject_id).await?;
  Ok(Json(report))
}

/// `POST /api/scan` — the scheduler's entry point.
pub async fn scan<S>(
  State(state): State<AppState<S>>,
  _admin: Admin,
) -> Result<Json<ScanReport>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state.engine.run_scan().await?;
  Ok(Json(report))
}
