//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or invalid bearer token")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  /// An upstream notification provider was unreachable on every channel.
  #[error("bad gateway: {0}")]
  BadGateway(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn internal<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Internal(Box::new(e))
  }
}

impl From<vigil_engine::Error> for ApiError {
  fn from(err: vigil_engine::Error) -> Self {
    use vigil_core::Error as Domain;
    match err {
      vigil_engine::Error::Domain(domain) => match domain {
        Domain::SubjectNotFound(id) => {
          Self::NotFound(format!("subject {id} not found"))
        }
        Domain::ContactNotFound(id) => {
          Self::NotFound(format!("contact {id} not found"))
        }
        Domain::IdentityMismatch | Domain::NotOwner(_) => {
          Self::Forbidden(domain.to_string())
        }
        Domain::DestinationCapacity { .. } => {
          Self::Unprocessable(domain.to_string())
        }
        Domain::EscalationActive => Self::Conflict(domain.to_string()),
        Domain::Serialization(e) => Self::internal(e),
      },
      vigil_engine::Error::AllChannelsFailed(failures) => {
        Self::BadGateway(format!("invite undeliverable ({failures})"))
      }
      vigil_engine::Error::Store(e) => Self::Internal(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "internal error in handler");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
