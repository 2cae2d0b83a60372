//! Push delivery via the Expo push service.
//!
//! Expo accepts the request with 200 even when individual tickets fail, so
//! the ticket status in the response body is checked as well — a stale or
//! unregistered token surfaces as [`ChannelError::Rejected`], which the
//! dispatch engine treats as a cue to fall back to the stored channel.

use async_trait::async_trait;
use serde_json::json;
use vigil_core::contact::ChannelKind;

use crate::{ChannelError, ChannelSender, OutboundMessage};

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

pub struct ExpoPushSender {
  http:     reqwest::Client,
  endpoint: String,
}

impl ExpoPushSender {
  pub fn new(http: reqwest::Client) -> Self {
    Self {
      http,
      endpoint: EXPO_PUSH_URL.to_string(),
    }
  }

  /// Override the service endpoint (testing against a local stub).
  pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
    Self {
      http,
      endpoint: endpoint.into(),
    }
  }
}

#[async_trait]
impl ChannelSender for ExpoPushSender {
  fn kind(&self) -> ChannelKind {
    ChannelKind::Push
  }

  async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
    let payload = json!({
      "to":       msg.destination,
      "sound":    "default",
      "title":    msg.content.title,
      "body":     msg.content.body,
      "data":     msg.metadata,
      "priority": "high",
    });

    let response = self.http.post(&self.endpoint).json(&payload).send().await?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(ChannelError::Provider {
        status: status.as_u16(),
        detail,
      });
    }

    // A 200 can still carry a per-ticket error (bad/stale token).
    let body: serde_json::Value = response.json().await?;
    if let Some(ticket) = body.pointer("/data/0")
      && ticket.get("status").and_then(|s| s.as_str()) == Some("error")
    {
      let message = ticket
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("push ticket rejected");
      tracing::debug!(destination = %msg.destination, %message, "push ticket rejected");
      return Err(ChannelError::Rejected(message.to_string()));
    }

    Ok(())
  }
}
