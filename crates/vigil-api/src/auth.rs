//! Bearer-token auth: hashing, token generation, and the extractors handlers
//! use to establish the caller.
//!
//! Tokens are opaque random strings; only their SHA-256 digests are stored.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use vigil_core::{
  store::VigilStore,
  subject::{CallerIdentity, Subject},
};

use crate::{AppState, error::ApiError};

/// Credentials accepted for the admin-only endpoints.
#[derive(Clone)]
pub struct AuthConfig {
  /// SHA-256 hex of the admin bearer token.
  pub admin_token_hash: String,
}

impl AuthConfig {
  pub fn new(admin_token: &str) -> Self {
    Self {
      admin_token_hash: token_hash(admin_token),
    }
  }
}

/// Hex-encoded SHA-256 of a bearer token, as stored in `api_tokens`.
pub fn token_hash(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

/// A fresh 256-bit bearer token.
pub fn generate_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(axum::http::header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated subject behind a request.
pub struct Caller(pub Subject);

impl Caller {
  /// The verified destinations the linking protocol matches against.
  pub fn identity(&self) -> CallerIdentity {
    CallerIdentity::from(&self.0)
  }
}

impl<S> FromRequestParts<AppState<S>> for Caller
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token =
      bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    let subject = state
      .engine
      .store()
      .subject_for_token(&token_hash(token))
      .await
      .map_err(ApiError::internal)?
      .ok_or(ApiError::Unauthorized)?;
    Ok(Caller(subject))
  }
}

// ─── Admin ───────────────────────────────────────────────────────────────────

/// Zero-size marker: present in the handler means the request carried the
/// admin token.
pub struct Admin;

impl<S> FromRequestParts<AppState<S>> for Admin
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token =
      bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    if token_hash(token) != state.auth.admin_token_hash {
      return Err(ApiError::Unauthorized);
    }
    Ok(Admin)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn token_hash_is_stable_hex() {
    let h = token_hash("cafebabe");
    assert_eq!(h.len(), 64);
    assert_eq!(h, token_hash("cafebabe"));
    assert_ne!(h, token_hash("cafebabf"));
  }

  #[test]
  fn generated_tokens_are_unique() {
    let a = generate_token();
    let b = generate_token();
    assert_eq!(a.len(), 64);
    assert_ne!(a, b);
  }

  #[test]
  fn bearer_extraction() {
    let mut headers = HeaderMap::new();
    assert!(bearer_token(&headers).is_none());

    headers.insert(
      axum::http::header::AUTHORIZATION,
      "Bearer sesame".parse().unwrap(),
    );
    assert_eq!(bearer_token(&headers), Some("sesame"));

    headers.insert(
      axum::http::header::AUTHORIZATION,
      "Basic dXNlcjpwYXNz".parse().unwrap(),
    );
    assert!(bearer_token(&headers).is_none());
  }
}
