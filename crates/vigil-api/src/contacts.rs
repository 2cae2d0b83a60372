//! Handlers for contacts and the linking protocol.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/api/contacts` | caller's contacts |
//! | `POST`   | `/api/contacts` | 422 on destination cap |
//! | `PATCH`  | `/api/contacts/{id}` | destination edits reset the link |
//! | `DELETE` | `/api/contacts/{id}` | |
//! | `POST`   | `/api/contacts/{id}/invite` | 502 when undeliverable |
//! | `POST`   | `/api/contacts/{id}/confirm` | 403 on identity mismatch |
//! | `POST`   | `/api/contacts/{id}/decline` | deletes the row |
//! | `POST`   | `/api/contacts/{id}/unlink` | deletes the row |
//! | `GET`    | `/api/links` | pending + active, both directions |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
  contact::{ChannelKind, Contact, ContactUpdate, NewContact, TrustedLinks},
  event::DeliveryReport,
  store::VigilStore,
};

use crate::{AppState, auth::Caller, error::ApiError};

/// `GET /api/contacts`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contacts = state.engine.list_contacts(caller.0.subject_id).await?;
  Ok(Json(contacts))
}

#[derive(Debug, Deserialize)]
pub struct CreateContactBody {
  pub name:        String,
  pub channel:     ChannelKind,
  pub destination: String,
}

/// `POST /api/contacts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Json(body): Json<CreateContactBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contact = state
    .engine
    .add_contact(caller.0.subject_id, NewContact {
      owner_id:    caller.0.subject_id,
      name:        body.name,
      channel:     body.channel,
      destination: body.destination,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(contact)))
}

/// `PATCH /api/contacts/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<ContactUpdate>,
) -> Result<Json<Contact>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contact = state
    .engine
    .update_contact(caller.0.subject_id, id, body)
    .await?;
  Ok(Json(contact))
}

/// `DELETE /api/contacts/{id}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state.engine.delete_contact(caller.0.subject_id, id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
  pub contact: Contact,
  pub report:  DeliveryReport,
}

/// `POST /api/contacts/{id}/invite`
pub async fn invite<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<InviteResponse>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let (contact, report) =
    state.engine.invite(caller.0.subject_id, id).await?;
  Ok(Json(InviteResponse { contact, report }))
}

/// `POST /api/contacts/{id}/confirm`
pub async fn confirm<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Contact>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contact = state.engine.confirm(&caller.identity(), id).await?;
  Ok(Json(contact))
}

/// `POST /api/contacts/{id}/decline`
pub async fn decline<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state.engine.decline(&caller.identity(), id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/contacts/{id}/unlink` — same row deletion as decline, named
/// for the post-confirmation case.
pub async fn unlink<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state.engine.decline(&caller.identity(), id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/links`
pub async fn links<S>(
  State(state): State<AppState<S>>,
  caller: Caller,
) -> Result<Json<TrustedLinks>, ApiError>
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let links = state.engine.trusted_links(&caller.identity()).await?;
  Ok(Json(links))
}
