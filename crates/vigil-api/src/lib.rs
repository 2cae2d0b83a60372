//! JSON REST API for Vigil.
//!
//! Exposes an axum [`Router`] backed by any [`vigil_core::store::VigilStore`]
//! through a [`vigil_engine::Engine`]. Subject-scoped endpoints authenticate
//! with per-subject bearer tokens; `/api/scan` and `/api/subjects` require
//! the admin token.

pub mod account;
pub mod auth;
pub mod contacts;
pub mod error;
pub mod monitor;
pub mod notifications;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use serde::Deserialize;
use vigil_channels::{
  ChannelSender, ChannelSet, ExpoPushSender, ResendMailer, TwilioSender,
};
use vigil_core::store::VigilStore;
use vigil_engine::{Engine, EngineConfig};

pub use auth::AuthConfig;
pub use error::ApiError;

#[cfg(test)]
mod tests;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_cooldown_secs() -> i64 {
  300
}
fn default_send_timeout_secs() -> u64 {
  5
}
fn default_max_parallel_sends() -> usize {
  8
}
fn default_max_owners() -> u32 {
  5
}
fn default_push_enabled() -> bool {
  true
}

/// Runtime server configuration, deserialised from `config.toml` layered
/// with `VIGIL_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  /// Plain admin bearer token; only its hash is kept in memory.
  pub admin_token: String,

  /// Drive the scan from an internal timer. Absent means an external
  /// scheduler calls `POST /api/scan`.
  #[serde(default)]
  pub scan_interval_secs: Option<u64>,

  #[serde(default = "default_cooldown_secs")]
  pub cooldown_secs:                i64,
  #[serde(default = "default_send_timeout_secs")]
  pub send_timeout_secs:            u64,
  #[serde(default = "default_max_parallel_sends")]
  pub max_parallel_sends:           usize,
  #[serde(default)]
  pub test_alert_bypasses_cooldown: bool,
  #[serde(default = "default_max_owners")]
  pub max_owners_per_destination:   u32,

  // Channel providers. An absent provider leaves its channel unconfigured.
  #[serde(default = "default_push_enabled")]
  pub push_enabled:       bool,
  #[serde(default)]
  pub resend_api_key:     Option<String>,
  #[serde(default)]
  pub resend_from:        Option<String>,
  #[serde(default)]
  pub twilio_account_sid: Option<String>,
  #[serde(default)]
  pub twilio_auth_token:  Option<String>,
  #[serde(default)]
  pub twilio_from_number: Option<String>,
}

impl ServerConfig {
  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      cooldown:                     chrono::Duration::seconds(
        self.cooldown_secs,
      ),
      send_timeout:                 Duration::from_secs(
        self.send_timeout_secs,
      ),
      max_parallel_sends:           self.max_parallel_sends,
      test_alert_bypasses_cooldown: self.test_alert_bypasses_cooldown,
      max_owners_per_destination:   self.max_owners_per_destination,
    }
  }

  /// Instantiate the providers this deployment has credentials for.
  pub fn channel_set(&self, http: reqwest::Client) -> ChannelSet {
    let push: Option<Arc<dyn ChannelSender>> = self
      .push_enabled
      .then(|| Arc::new(ExpoPushSender::new(http.clone())) as _);
    let email: Option<Arc<dyn ChannelSender>> = match (
      &self.resend_api_key,
      &self.resend_from,
    ) {
      (Some(key), Some(from)) => {
        Some(Arc::new(ResendMailer::new(http.clone(), key, from)) as _)
      }
      _ => None,
    };
    let sms: Option<Arc<dyn ChannelSender>> = match (
      &self.twilio_account_sid,
      &self.twilio_auth_token,
      &self.twilio_from_number,
    ) {
      (Some(sid), Some(token), Some(from)) => {
        Some(Arc::new(TwilioSender::new(http, sid, token, from)) as _)
      }
      _ => None,
    };
    ChannelSet { push, email, sms }
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: VigilStore + Clone> {
  pub engine: Engine<S>,
  pub auth:   Arc<AuthConfig>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn api_router<S>(state: AppState<S>) -> Router
where
  S: VigilStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // State machine
    .route("/api/checkin", post(monitor::checkin::<S>))
    .route("/api/panic", post(monitor::panic::<S>))
    .route("/api/resolve", post(monitor::resolve::<S>))
    .route("/api/test-alert", post(monitor::test_alert::<S>))
    .route("/api/scan", post(monitor::scan::<S>))
    // Contacts & linking
    .route(
      "/api/contacts",
      get(contacts::list::<S>).post(contacts::create::<S>),
    )
    .route(
      "/api/contacts/{id}",
      patch(contacts::update::<S>).delete(contacts::remove::<S>),
    )
    .route("/api/contacts/{id}/invite", post(contacts::invite::<S>))
    .route("/api/contacts/{id}/confirm", post(contacts::confirm::<S>))
    .route("/api/contacts/{id}/decline", post(contacts::decline::<S>))
    .route("/api/contacts/{id}/unlink", post(contacts::unlink::<S>))
    .route("/api/links", get(contacts::links::<S>))
    // Audit trail
    .route("/api/notifications", get(notifications::history::<S>))
    // Account
    .route("/api/subject", get(account::profile::<S>))
    .route("/api/settings", patch(account::update_settings::<S>))
    .route("/api/account", delete(account::delete_account::<S>))
    .route("/api/subjects", post(account::create_subject::<S>))
    .with_state(state)
}
