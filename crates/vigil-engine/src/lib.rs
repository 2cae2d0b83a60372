//! The Vigil engine: check-in state machine, notification dispatch, and the
//! contact linking protocol, all generic over a [`VigilStore`] backend.
//!
//! The engine owns no state of its own beyond configuration and the set of
//! configured channel senders; every durable fact lives in the store, and
//! every state transition goes through the store's conditional-update
//! primitives so concurrent scans and manual actions cannot double-fire.

pub mod dispatch;
pub mod error;
pub mod linking;
pub mod monitor;

use std::sync::Arc;

use tokio::sync::Semaphore;
use vigil_channels::ChannelSet;
use vigil_core::store::VigilStore;

pub use dispatch::DispatchTarget;
pub use error::{ChannelFailures, Error, Result};
pub use monitor::ScanReport;

#[cfg(test)]
mod tests;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables for dispatch and linking behaviour.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// How long a SENT delivery suppresses further sends of the same severity
  /// class to the same destination.
  pub cooldown:                     chrono::Duration,
  /// Wall-clock budget for a single channel adapter call.
  pub send_timeout:                 std::time::Duration,
  /// Upper bound on concurrent adapter calls within one dispatch.
  pub max_parallel_sends:           usize,
  /// Whether TEST_ALERT skips the cooldown check like RESOLUTION_ALERT does.
  pub test_alert_bypasses_cooldown: bool,
  /// Anti-abuse cap: distinct owners allowed per physical destination.
  pub max_owners_per_destination:   u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      cooldown:                     chrono::Duration::minutes(5),
      send_timeout:                 std::time::Duration::from_secs(5),
      max_parallel_sends:           8,
      test_alert_bypasses_cooldown: false,
      max_owners_per_destination:   5,
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The dispatch/monitoring engine. Cheap to clone; shared by the API layer
/// and any internal scan timer.
#[derive(Clone)]
pub struct Engine<S> {
  store:        S,
  channels:     ChannelSet,
  config:       EngineConfig,
  send_permits: Arc<Semaphore>,
}

impl<S: VigilStore + Clone> Engine<S> {
  pub fn new(store: S, channels: ChannelSet, config: EngineConfig) -> Self {
    let send_permits = Arc::new(Semaphore::new(config.max_parallel_sends));
    Self {
      store,
      channels,
      config,
      send_permits,
    }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }
}
