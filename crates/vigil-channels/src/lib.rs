//! Delivery channel adapters for Vigil.
//!
//! Three interchangeable senders — push (Expo), email (Resend), SMS (Twilio)
//! — behind one object-safe [`ChannelSender`] trait, so the dispatch engine
//! can hold any mix of configured providers. An unconfigured provider is
//! simply absent from the [`ChannelSet`].

pub mod email;
pub mod mock;
pub mod push;
pub mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use vigil_core::{contact::ChannelKind, template::Message};

pub use email::ResendMailer;
pub use push::ExpoPushSender;
pub use sms::TwilioSender;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A single adapter failure. Recorded per-delivery by the engine; never
/// fails a whole dispatch.
#[derive(Debug, Error)]
pub enum ChannelError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// The provider answered with a non-success status.
  #[error("provider returned {status}: {detail}")]
  Provider { status: u16, detail: String },

  /// The provider accepted the request but rejected the message itself
  /// (e.g. an Expo ticket with status "error" for a stale token).
  #[error("message rejected: {0}")]
  Rejected(String),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A rendered message bound for one destination.
///
/// Carries every per-channel rendering; each sender reads the fields for its
/// medium and ignores the rest.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
  pub destination: String,
  pub content:     Message,
  /// Structured payload attached to push notifications (event type, actor,
  /// timestamps) so the receiving client can deep-link.
  pub metadata:    serde_json::Value,
}

/// One outbound delivery channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
  /// Which channel this sender serves.
  fn kind(&self) -> ChannelKind;

  /// Deliver `msg` to `msg.destination`. Must not retry internally; the
  /// caller owns the (bounded) retry policy and the timeout.
  async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError>;
}

// ─── ChannelSet ──────────────────────────────────────────────────────────────

/// The providers configured for this deployment. `None` means the channel is
/// unconfigured; dispatch treats it as unusable rather than an error.
#[derive(Clone, Default)]
pub struct ChannelSet {
  pub push:  Option<Arc<dyn ChannelSender>>,
  pub email: Option<Arc<dyn ChannelSender>>,
  pub sms:   Option<Arc<dyn ChannelSender>>,
}

impl ChannelSet {
  pub fn for_kind(&self, kind: ChannelKind) -> Option<&Arc<dyn ChannelSender>> {
    match kind {
      ChannelKind::Push => self.push.as_ref(),
      ChannelKind::Email => self.email.as_ref(),
      ChannelKind::Sms => self.sms.as_ref(),
    }
  }
}
