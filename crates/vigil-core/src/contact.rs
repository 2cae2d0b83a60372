//! Trusted contacts and the unified recipient view.
//!
//! A contact is owned by exactly one subject. Its `destination` is an opaque
//! string whose meaning depends on the channel (push token, email address, or
//! phone number). Once a contact is CONFIRMED and linked, the destination is
//! treated as owned by the linked subject — edits to it must re-verify
//! ownership through a fresh invite/confirm cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Channel ─────────────────────────────────────────────────────────────────

/// The delivery channel stored on a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelKind {
  Push,
  Email,
  Sms,
}

impl ChannelKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Push => "PUSH",
      Self::Email => "EMAIL",
      Self::Sms => "SMS",
    }
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where a contact sits in the invite → confirm lifecycle.
///
/// There is no REJECTED variant: declining or unlinking deletes the row
/// outright. The notification audit trail survives independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactStatus {
  Pending,
  Confirmed,
}

impl ContactStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "PENDING",
      Self::Confirmed => "CONFIRMED",
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A trusted recipient configured to receive alerts for its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:        Uuid,
  pub owner_id:          Uuid,
  pub name:              String,
  pub channel:           ChannelKind,
  pub destination:       String,
  pub status:            ContactStatus,
  /// Set when the destination resolved to another registered subject.
  pub linked_subject_id: Option<Uuid>,
  pub invite_sent_at:    Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::VigilStore::add_contact`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewContact {
  pub owner_id:    Uuid,
  pub name:        String,
  pub channel:     ChannelKind,
  pub destination: String,
}

/// Partial update applied to an existing contact. `None` leaves the field
/// untouched. A destination change on a confirmed, linked contact resets the
/// row to PENDING/unlinked — enforced by the linking protocol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
  pub name:        Option<String>,
  pub channel:     Option<ChannelKind>,
  pub destination: Option<String>,
}

// ─── Recipient ───────────────────────────────────────────────────────────────

/// A confirmed contact joined with its linked subject's deliverable details,
/// as materialised by the store for dispatch.
#[derive(Debug, Clone)]
pub struct ContactRecipient {
  pub contact:           Contact,
  /// Push token of the linked subject, if the contact is linked and the
  /// linked account has one registered.
  pub linked_push_token: Option<String>,
}

/// One resolved recipient of a dispatch call.
///
/// Normal alerts fan out to [`Recipient::Contact`]s; a directed
/// acknowledgment addresses a single registered subject without a contact
/// row behind it.
#[derive(Debug, Clone)]
pub enum Recipient {
  Contact(ContactRecipient),
  Directed {
    subject_id:  Uuid,
    destination: String,
    channel:     ChannelKind,
    push_token:  Option<String>,
  },
}

impl Recipient {
  /// The destination the stored channel would deliver to.
  pub fn destination(&self) -> &str {
    match self {
      Self::Contact(c) => &c.contact.destination,
      Self::Directed { destination, .. } => destination,
    }
  }

  /// The channel configured for this recipient, used when push is
  /// unavailable or fails.
  pub fn preferred_channel(&self) -> ChannelKind {
    match self {
      Self::Contact(c) => c.contact.channel,
      Self::Directed { channel, .. } => *channel,
    }
  }

  /// Push token to try first, if the recipient is a registered subject with
  /// one.
  pub fn push_token(&self) -> Option<&str> {
    match self {
      Self::Contact(c) => c.linked_push_token.as_deref(),
      Self::Directed { push_token, .. } => push_token.as_deref(),
    }
  }

  /// The registered subject behind this recipient, recorded on deliveries.
  pub fn subject_id(&self) -> Option<Uuid> {
    match self {
      Self::Contact(c) => c.contact.linked_subject_id,
      Self::Directed { subject_id, .. } => Some(*subject_id),
    }
  }
}

// ─── Trusted-link views ──────────────────────────────────────────────────────

/// Owner details attached to invites and links shown to the invited party.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
  pub subject_id:   Uuid,
  pub email:        String,
  pub display_name: Option<String>,
}

/// A pending invite addressed to the caller's email or phone.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvite {
  pub contact: Contact,
  pub owner:   OwnerSummary,
}

/// A confirmed link where the caller is the protecting party.
#[derive(Debug, Clone, Serialize)]
pub struct TrustedLink {
  pub contact: Contact,
  pub owner:   OwnerSummary,
}

/// Response of the "who is protecting me / who am I protecting" query.
#[derive(Debug, Clone, Serialize)]
pub struct TrustedLinks {
  pub pending: Vec<PendingInvite>,
  pub active:  Vec<TrustedLink>,
}
