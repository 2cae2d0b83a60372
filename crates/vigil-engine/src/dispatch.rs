//! The notification dispatch engine.
//!
//! One call = one [`NotificationEvent`] plus exactly one
//! [`NotificationDelivery`](vigil_core::event::NotificationDelivery) per
//! recipient, whatever the outcome. Partial failure is normal and never fails
//! the call; only store errors do.
//!
//! Destinations are claimed sequentially before any send so that duplicate
//! destinations within one call collapse deterministically, then the actual
//! adapter calls run concurrently under a semaphore with a per-send timeout.

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_channels::{ChannelSender, ChannelSet, OutboundMessage};
use vigil_core::{
  contact::{ChannelKind, Recipient},
  event::{
    DeliveryOutcome, DeliveryReport, DeliveryStatus, EventType, NewDelivery,
    NewEvent, NotificationEvent,
  },
  store::VigilStore,
  subject::Subject,
  template::{self, Actor},
};

use crate::{ChannelFailures, Engine, Error, Result};

pub(crate) const SKIP_COOLDOWN: &str = "cooldown active";
const SKIP_NO_CHANNEL: &str = "no valid channel configured";

/// Who a dispatch call addresses.
#[derive(Debug, Clone, Copy)]
pub enum DispatchTarget {
  /// All CONFIRMED contacts of the subject.
  Contacts,
  /// A single registered subject, e.g. the owner of a just-accepted invite.
  Directed(Uuid),
}

/// Result of one recipient's send attempt, before it is persisted.
pub(crate) struct SendOutcome {
  pub channel:      Option<ChannelKind>,
  pub status:       DeliveryStatus,
  pub error:        Option<String>,
  pub delivered_at: Option<DateTime<Utc>>,
  /// Every rung that was attempted and failed, for ladder diagnostics.
  pub failures:     ChannelFailures,
}

impl SendOutcome {
  fn sent(channel: ChannelKind, failures: ChannelFailures) -> Self {
    Self {
      channel: Some(channel),
      status: DeliveryStatus::Sent,
      error: None,
      delivered_at: Some(Utc::now()),
      failures,
    }
  }

  fn failed(channel: Option<ChannelKind>, failures: ChannelFailures) -> Self {
    Self {
      channel,
      status: DeliveryStatus::Failed,
      error: Some(failures.to_string()),
      delivered_at: None,
      failures,
    }
  }

  fn skipped(reason: &str) -> Self {
    Self {
      channel:      None,
      status:       DeliveryStatus::Skipped,
      error:        Some(reason.to_string()),
      delivered_at: None,
      failures:     ChannelFailures::default(),
    }
  }
}

/// A dispatch call's full result, including per-recipient ladder failures the
/// public [`DeliveryReport`] does not carry.
pub(crate) struct Dispatched {
  pub report:   DeliveryReport,
  pub failures: Vec<ChannelFailures>,
}

enum Plan {
  Send,
  Skip(&'static str),
}

impl<S: VigilStore + Clone> Engine<S> {
  /// Notify recipients about `event_type` on behalf of `subject_id`.
  pub async fn dispatch(
    &self,
    subject_id: Uuid,
    event_type: EventType,
    target: DispatchTarget,
  ) -> Result<DeliveryReport> {
    let subject = self.subject(subject_id).await?;
    let recipients = self.resolve_recipients(subject_id, target).await?;
    let meta = match target {
      DispatchTarget::Contacts => serde_json::json!({
        "actor_name": subject.display_label(),
        "actor_email": subject.email,
      }),
      DispatchTarget::Directed(id) => serde_json::json!({
        "actor_name": subject.display_label(),
        "actor_email": subject.email,
        "target_subject_id": id,
      }),
    };
    let dispatched =
      self.dispatch_to(&subject, event_type, recipients, meta).await?;
    Ok(dispatched.report)
  }

  pub(crate) async fn subject(&self, id: Uuid) -> Result<Subject> {
    self
      .store()
      .get_subject(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| vigil_core::Error::SubjectNotFound(id).into())
  }

  async fn resolve_recipients(
    &self,
    subject_id: Uuid,
    target: DispatchTarget,
  ) -> Result<Vec<Recipient>> {
    match target {
      DispatchTarget::Contacts => Ok(
        self
          .store()
          .confirmed_recipients(subject_id)
          .await
          .map_err(Error::store)?
          .into_iter()
          .map(Recipient::Contact)
          .collect(),
      ),
      DispatchTarget::Directed(id) => {
        let target = self.subject(id).await?;
        Ok(vec![Recipient::Directed {
          subject_id:  target.subject_id,
          destination: target.email.clone(),
          channel:     ChannelKind::Email,
          push_token:  target.push_token.clone(),
        }])
      }
    }
  }

  /// Core dispatch over an already-resolved recipient list. Also used by the
  /// linking protocol, whose recipient (a not-yet-confirmed contact) is not
  /// part of the default set.
  pub(crate) async fn dispatch_to(
    &self,
    subject: &Subject,
    event_type: EventType,
    recipients: Vec<Recipient>,
    meta: serde_json::Value,
  ) -> Result<Dispatched> {
    let actor = Actor {
      name:  subject.display_label(),
      email: &subject.email,
    };
    let content = template::render(event_type, &actor);
    let metadata = serde_json::json!({
      "event_type": event_type,
      "actor_name": actor.name,
    });

    // The event exists even when nobody is listening; the audit trail must
    // show the alert fired.
    let event = self
      .store()
      .create_event(NewEvent {
        subject_id: subject.subject_id,
        event_type,
        meta,
      })
      .await
      .map_err(Error::store)?;

    let plans = self.claim(&recipients, event_type).await?;

    let mut slots: Vec<Option<SendOutcome>> = Vec::new();
    slots.resize_with(recipients.len(), || None);

    let mut join: JoinSet<(usize, SendOutcome)> = JoinSet::new();
    for (idx, (recipient, plan)) in
      recipients.iter().zip(&plans).enumerate()
    {
      match plan {
        Plan::Skip(reason) => {
          debug!(
            destination = recipient.destination(),
            reason, "skipping delivery"
          );
          slots[idx] = Some(SendOutcome::skipped(reason));
        }
        Plan::Send => {
          let channels = self.channels().clone();
          let recipient = recipient.clone();
          let content = content.clone();
          let metadata = metadata.clone();
          let timeout = self.config().send_timeout;
          let permits = Arc::clone(self.permits());
          join.spawn(async move {
            let _permit = match permits.acquire_owned().await {
              Ok(permit) => permit,
              Err(_) => {
                return (
                  idx,
                  SendOutcome::failed(None, ChannelFailures::default()),
                );
              }
            };
            let outcome =
              send_one(&channels, &recipient, content, metadata, timeout)
                .await;
            (idx, outcome)
          });
        }
      }
    }

    while let Some(joined) = join.join_next().await {
      match joined {
        Ok((idx, outcome)) => slots[idx] = Some(outcome),
        Err(err) => warn!(%err, "send task aborted"),
      }
    }

    self.persist(event, &recipients, slots).await
  }

  /// Sequential claim pass: one send per destination per call, cooldown
  /// enforced per (destination, severity class).
  async fn claim(
    &self,
    recipients: &[Recipient],
    event_type: EventType,
  ) -> Result<Vec<Plan>> {
    let bypass = event_type == EventType::ResolutionAlert
      || (event_type == EventType::TestAlert
        && self.config().test_alert_bypasses_cooldown);
    let severity = event_type.severity();
    let since = Utc::now() - self.config().cooldown;

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut plans = Vec::with_capacity(recipients.len());
    for recipient in recipients {
      let destination = recipient.destination();
      let plan = if !claimed.insert(destination) {
        Plan::Skip(SKIP_COOLDOWN)
      } else if !bypass
        && self
          .store()
          .recently_sent(destination, severity, since)
          .await
          .map_err(Error::store)?
      {
        Plan::Skip(SKIP_COOLDOWN)
      } else {
        Plan::Send
      };
      plans.push(plan);
    }
    Ok(plans)
  }

  async fn persist(
    &self,
    event: NotificationEvent,
    recipients: &[Recipient],
    slots: Vec<Option<SendOutcome>>,
  ) -> Result<Dispatched> {
    let mut outcomes = Vec::with_capacity(recipients.len());
    let mut failures = Vec::with_capacity(recipients.len());

    for (recipient, slot) in recipients.iter().zip(slots) {
      let outcome = slot.unwrap_or_else(|| {
        SendOutcome::failed(None, ChannelFailures::default())
      });
      let delivery = self
        .store()
        .record_delivery(NewDelivery {
          event_id:             event.event_id,
          channel:              outcome.channel,
          destination:          recipient.destination().to_string(),
          status:               outcome.status,
          error:                outcome.error.clone(),
          delivered_at:         outcome.delivered_at,
          recipient_subject_id: recipient.subject_id(),
        })
        .await
        .map_err(Error::store)?;

      outcomes.push(DeliveryOutcome {
        destination:          delivery.destination,
        channel:              delivery.channel,
        status:               delivery.status,
        error:                delivery.error,
        recipient_subject_id: delivery.recipient_subject_id,
      });
      failures.push(outcome.failures);
    }

    let report = DeliveryReport { event, outcomes };
    debug!(
      event_id = %report.event.event_id,
      event_type = ?report.event.event_type,
      recipients = report.outcomes.len(),
      sent = report.sent(),
      "dispatch complete"
    );
    Ok(Dispatched { report, failures })
  }

  fn channels(&self) -> &ChannelSet {
    &self.channels
  }

  fn permits(&self) -> &Arc<tokio::sync::Semaphore> {
    &self.send_permits
  }
}

/// Try the recipient's channels in order: linked push token first, then the
/// stored channel. A stale push token therefore degrades to email/SMS instead
/// of losing the alert.
async fn send_one(
  channels: &ChannelSet,
  recipient: &Recipient,
  content: template::Message,
  metadata: serde_json::Value,
  timeout: Duration,
) -> SendOutcome {
  let mut failures = ChannelFailures::default();
  let mut last_attempted: Option<ChannelKind> = None;

  if let (Some(token), Some(sender)) =
    (recipient.push_token(), channels.for_kind(ChannelKind::Push))
  {
    let msg = OutboundMessage {
      destination: token.to_string(),
      content:     content.clone(),
      metadata:    metadata.clone(),
    };
    match attempt(sender, &msg, timeout).await {
      Ok(()) => return SendOutcome::sent(ChannelKind::Push, failures),
      Err(detail) => {
        warn!(detail, "push send failed, falling back to stored channel");
        failures.record(ChannelKind::Push, detail);
        last_attempted = Some(ChannelKind::Push);
      }
    }
  }

  let kind = recipient.preferred_channel();
  // A push-channel contact whose destination *is* the token we just tried
  // gets no second attempt.
  let duplicate_push = kind == ChannelKind::Push
    && recipient.push_token() == Some(recipient.destination());
  if !duplicate_push {
    if let Some(sender) = channels.for_kind(kind) {
      let msg = OutboundMessage {
        destination: recipient.destination().to_string(),
        content,
        metadata,
      };
      match attempt(sender, &msg, timeout).await {
        Ok(()) => return SendOutcome::sent(kind, failures),
        Err(detail) => {
          failures.record(kind, detail);
          last_attempted = Some(kind);
        }
      }
    }
  }

  match last_attempted {
    Some(channel) => SendOutcome::failed(Some(channel), failures),
    None => SendOutcome::skipped(SKIP_NO_CHANNEL),
  }
}

async fn attempt(
  sender: &Arc<dyn ChannelSender>,
  msg: &OutboundMessage,
  timeout: Duration,
) -> Result<(), String> {
  match tokio::time::timeout(timeout, sender.send(msg)).await {
    Ok(Ok(())) => Ok(()),
    Ok(Err(err)) => Err(err.to_string()),
    Err(_) => Err("send timed out".to_string()),
  }
}
