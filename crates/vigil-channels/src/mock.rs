//! In-memory sender for tests.
//!
//! Records every message it is asked to deliver and can be scripted to fail,
//! so engine tests can exercise fallback and failure paths without a network.

use std::sync::Mutex;

use async_trait::async_trait;
use vigil_core::contact::ChannelKind;

use crate::{ChannelError, ChannelSender, OutboundMessage};

pub struct MockSender {
  kind:      ChannelKind,
  fail_with: Mutex<Option<String>>,
  sent:      Mutex<Vec<OutboundMessage>>,
}

impl MockSender {
  pub fn new(kind: ChannelKind) -> Self {
    Self {
      kind,
      fail_with: Mutex::new(None),
      sent: Mutex::new(Vec::new()),
    }
  }

  /// A sender that rejects every message with `detail`.
  pub fn failing(kind: ChannelKind, detail: impl Into<String>) -> Self {
    let sender = Self::new(kind);
    *sender.fail_with.lock().unwrap() = Some(detail.into());
    sender
  }

  /// Flip an existing sender into (or out of) failure mode.
  pub fn set_failure(&self, detail: Option<String>) {
    *self.fail_with.lock().unwrap() = detail;
  }

  /// Messages delivered so far, in order.
  pub fn sent(&self) -> Vec<OutboundMessage> {
    self.sent.lock().unwrap().clone()
  }

  /// Destinations delivered so far, in order.
  pub fn sent_destinations(&self) -> Vec<String> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .map(|m| m.destination.clone())
      .collect()
  }
}

#[async_trait]
impl ChannelSender for MockSender {
  fn kind(&self) -> ChannelKind {
    self.kind
  }

  async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
    if let Some(detail) = self.fail_with.lock().unwrap().clone() {
      return Err(ChannelError::Rejected(detail));
    }
    self.sent.lock().unwrap().push(msg.clone());
    Ok(())
  }
}
