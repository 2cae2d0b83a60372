//! SMS delivery via the Twilio Messages API.

use async_trait::async_trait;
use vigil_core::contact::ChannelKind;

use crate::{ChannelError, ChannelSender, OutboundMessage};

pub struct TwilioSender {
  http:        reqwest::Client,
  account_sid: String,
  auth_token:  String,
  from_number: String,
  base_url:    String,
}

impl TwilioSender {
  pub fn new(
    http: reqwest::Client,
    account_sid: impl Into<String>,
    auth_token: impl Into<String>,
    from_number: impl Into<String>,
  ) -> Self {
    Self {
      http,
      account_sid: account_sid.into(),
      auth_token: auth_token.into(),
      from_number: from_number.into(),
      base_url: "https://api.twilio.com".to_string(),
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  fn messages_url(&self) -> String {
    format!(
      "{}/2010-04-01/Accounts/{}/Messages.json",
      self.base_url, self.account_sid
    )
  }
}

#[async_trait]
impl ChannelSender for TwilioSender {
  fn kind(&self) -> ChannelKind {
    ChannelKind::Sms
  }

  async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
    let form = [
      ("To", msg.destination.as_str()),
      ("From", self.from_number.as_str()),
      ("Body", msg.content.sms_body.as_str()),
    ];

    let response = self
      .http
      .post(self.messages_url())
      .basic_auth(&self.account_sid, Some(&self.auth_token))
      .form(&form)
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
