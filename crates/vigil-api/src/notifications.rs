//! Handler for the notification history endpoint.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use vigil_core::{event::HistoryEntry, store::VigilStore};

use crate::{AppState, auth::Caller, error::ApiError};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub limit: Option<u32>,
}

/// `GET /api/notifications[?limit=N]` — newest first, capped.
pub async fn history<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let entries = state
    .engine
    .store()
    .notification_history(caller.0.subject_id, limit)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(entries))
}
