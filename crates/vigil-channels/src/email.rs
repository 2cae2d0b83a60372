//! Email delivery via the Resend API.

use async_trait::async_trait;
use serde_json::json;
use vigil_core::contact::ChannelKind;

use crate::{ChannelError, ChannelSender, OutboundMessage};

const RESEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailer {
  http:     reqwest::Client,
  api_key:  String,
  /// RFC 5322 sender, e.g. `Vigil Alert <alert@vigil.example>`.
  from:     String,
  endpoint: String,
}

impl ResendMailer {
  pub fn new(
    http: reqwest::Client,
    api_key: impl Into<String>,
    from: impl Into<String>,
  ) -> Self {
    Self {
      http,
      api_key: api_key.into(),
      from: from.into(),
      endpoint: RESEND_URL.to_string(),
    }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }
}

#[async_trait]
impl ChannelSender for ResendMailer {
  fn kind(&self) -> ChannelKind {
    ChannelKind::Email
  }

  async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
    let payload = json!({
      "from":    self.from,
      "to":      msg.destination,
      "subject": msg.content.email_subject,
      "html":    msg.content.email_html,
    });

    let response = self
      .http
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&payload)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let detail = response.text().await.unwrap_or_default();
      return Err(ChannelError::Provider {
        status: status.as_u16(),
        detail,
      });
    }

    Ok(())
  }
}
