//! Append-only audit records: notification events, per-recipient deliveries,
//! and subject state transitions.
//!
//! Events and deliveries are never updated or deleted; cooldown lookups and
//! the user-visible notification history are both projections over them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{contact::ChannelKind, subject::SubjectState};

// ─── Event type ──────────────────────────────────────────────────────────────

/// What a dispatch call is telling the recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
  /// The subject missed their check-in or triggered a panic.
  EscalationAlert,
  /// The subject marked themselves safe; contacts can stand down.
  ResolutionAlert,
  /// User-initiated dry run of the alert path.
  TestAlert,
  /// Invitation to become a trusted contact.
  ContactRequest,
  /// Directed notice, e.g. "your invite was accepted".
  Acknowledgment,
}

impl EventType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::EscalationAlert => "ESCALATION_ALERT",
      Self::ResolutionAlert => "RESOLUTION_ALERT",
      Self::TestAlert => "TEST_ALERT",
      Self::ContactRequest => "CONTACT_REQUEST",
      Self::Acknowledgment => "ACKNOWLEDGMENT",
    }
  }

  /// The cooldown class this event competes in. A recent SENT delivery only
  /// suppresses a new send of the *same* class.
  pub fn severity(&self) -> Severity {
    match self {
      Self::EscalationAlert | Self::ResolutionAlert | Self::TestAlert => {
        Severity::Emergency
      }
      Self::ContactRequest | Self::Acknowledgment => Severity::Social,
    }
  }
}

/// Cooldown severity class; see [`EventType::severity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Emergency,
  Social,
}

impl Severity {
  /// The event-type discriminants belonging to this class, for store queries.
  pub fn event_types(&self) -> &'static [EventType] {
    match self {
      Self::Emergency => &[
        EventType::EscalationAlert,
        EventType::ResolutionAlert,
        EventType::TestAlert,
      ],
      Self::Social => &[EventType::ContactRequest, EventType::Acknowledgment],
    }
  }
}

// ─── NotificationEvent ───────────────────────────────────────────────────────

/// One record per dispatch call. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
  pub event_id:   Uuid,
  pub subject_id: Uuid,
  pub event_type: EventType,
  /// Free-form context: actor name/email, optional directed target.
  pub meta:       serde_json::Value,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::VigilStore::create_event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub subject_id: Uuid,
  pub event_type: EventType,
  pub meta:       serde_json::Value,
}

// ─── NotificationDelivery ────────────────────────────────────────────────────

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
  Sent,
  Failed,
  Skipped,
}

impl DeliveryStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sent => "SENT",
      Self::Failed => "FAILED",
      Self::Skipped => "SKIPPED",
    }
  }
}

/// One row per (event, recipient) attempt — success, failure, or deliberate
/// skip. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDelivery {
  pub delivery_id:          Uuid,
  pub event_id:             Uuid,
  /// The channel that produced the outcome; `None` when no channel was
  /// usable at all.
  pub channel:              Option<ChannelKind>,
  pub destination:          String,
  pub status:               DeliveryStatus,
  pub error:                Option<String>,
  pub delivered_at:         Option<DateTime<Utc>>,
  pub recipient_subject_id: Option<Uuid>,
  pub created_at:           DateTime<Utc>,
}

/// Input to [`crate::store::VigilStore::record_delivery`].
#[derive(Debug, Clone)]
pub struct NewDelivery {
  pub event_id:             Uuid,
  pub channel:              Option<ChannelKind>,
  pub destination:          String,
  pub status:               DeliveryStatus,
  pub error:                Option<String>,
  pub delivered_at:         Option<DateTime<Utc>>,
  pub recipient_subject_id: Option<Uuid>,
}

// ─── DeliveryReport ──────────────────────────────────────────────────────────

/// Per-recipient outcome returned by the dispatch engine. Mirrors the
/// persisted [`NotificationDelivery`] rows for the call's event.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
  pub destination:          String,
  pub channel:              Option<ChannelKind>,
  pub status:               DeliveryStatus,
  pub error:                Option<String>,
  pub recipient_subject_id: Option<Uuid>,
}

/// What a dispatch call did. Partial failure is normal: the report succeeds
/// as long as the recipient list was fully processed.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
  pub event:    NotificationEvent,
  pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryReport {
  pub fn sent(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| o.status == DeliveryStatus::Sent)
      .count()
  }
}

// ─── StateEvent ──────────────────────────────────────────────────────────────

/// Audit record of one subject state transition, written atomically with the
/// state mutation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
  pub state_event_id: Uuid,
  pub subject_id:     Uuid,
  pub to_state:       SubjectState,
  pub reason:         String,
  pub created_at:     DateTime<Utc>,
}

// ─── History projection ──────────────────────────────────────────────────────

/// One row of the user-visible notification history: a delivery joined with
/// its event.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
  pub delivery_id:      Uuid,
  pub event_id:         Uuid,
  pub event_type:       EventType,
  pub channel:          Option<ChannelKind>,
  pub destination:      String,
  pub status:           DeliveryStatus,
  pub error:            Option<String>,
  pub delivered_at:     Option<DateTime<Utc>>,
  pub event_created_at: DateTime<Utc>,
  pub created_at:       DateTime<Utc>,
}
