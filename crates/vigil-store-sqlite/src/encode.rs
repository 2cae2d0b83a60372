//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, durations as integer seconds,
//! UUIDs as hyphenated lowercase strings, and enums as their SCREAMING_SNAKE
//! discriminants.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use vigil_core::{
  contact::{ChannelKind, Contact, ContactStatus},
  event::{DeliveryStatus, EventType, HistoryEntry},
  subject::{Subject, SubjectState},
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── SubjectState ────────────────────────────────────────────────────────────

pub fn decode_state(s: &str) -> Result<SubjectState> {
  match s {
    "ONBOARDING" => Ok(SubjectState::Onboarding),
    "ACTIVE" => Ok(SubjectState::Active),
    "GRACE" => Ok(SubjectState::Grace),
    "ESCALATED" => Ok(SubjectState::Escalated),
    other => Err(Error::UnknownDiscriminant {
      column: "state",
      value:  other.to_string(),
    }),
  }
}

// ─── ChannelKind ─────────────────────────────────────────────────────────────

pub fn decode_channel(s: &str) -> Result<ChannelKind> {
  match s {
    "PUSH" => Ok(ChannelKind::Push),
    "EMAIL" => Ok(ChannelKind::Email),
    "SMS" => Ok(ChannelKind::Sms),
    other => Err(Error::UnknownDiscriminant {
      column: "channel",
      value:  other.to_string(),
    }),
  }
}

pub fn decode_opt_channel(s: Option<String>) -> Result<Option<ChannelKind>> {
  s.as_deref().map(decode_channel).transpose()
}

// ─── ContactStatus ───────────────────────────────────────────────────────────

pub fn decode_contact_status(s: &str) -> Result<ContactStatus> {
  match s {
    "PENDING" => Ok(ContactStatus::Pending),
    "CONFIRMED" => Ok(ContactStatus::Confirmed),
    other => Err(Error::UnknownDiscriminant {
      column: "status",
      value:  other.to_string(),
    }),
  }
}

// ─── EventType / DeliveryStatus ──────────────────────────────────────────────

pub fn decode_event_type(s: &str) -> Result<EventType> {
  match s {
    "ESCALATION_ALERT" => Ok(EventType::EscalationAlert),
    "RESOLUTION_ALERT" => Ok(EventType::ResolutionAlert),
    "TEST_ALERT" => Ok(EventType::TestAlert),
    "CONTACT_REQUEST" => Ok(EventType::ContactRequest),
    "ACKNOWLEDGMENT" => Ok(EventType::Acknowledgment),
    other => Err(Error::UnknownDiscriminant {
      column: "event_type",
      value:  other.to_string(),
    }),
  }
}

pub fn decode_delivery_status(s: &str) -> Result<DeliveryStatus> {
  match s {
    "SENT" => Ok(DeliveryStatus::Sent),
    "FAILED" => Ok(DeliveryStatus::Failed),
    "SKIPPED" => Ok(DeliveryStatus::Skipped),
    other => Err(Error::UnknownDiscriminant {
      column: "status",
      value:  other.to_string(),
    }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:            String,
  pub email:                 String,
  pub phone:                 Option<String>,
  pub display_name:          Option<String>,
  pub push_token:            Option<String>,
  pub state:                 String,
  pub last_confirmed_at:     Option<String>,
  pub checkin_interval_secs: i64,
  pub grace_period_secs:     i64,
  pub vacation_mode:         bool,
  pub reminder_enabled:      bool,
  pub reminder_offset_secs:  i64,
  pub sound_enabled:         bool,
  pub alert_sound:           String,
  pub alert_volume:          i64,
  pub created_at:            String,
  pub updated_at:            String,
}

impl RawSubject {
  /// The column list matching [`RawSubject::from_row`].
  pub const COLUMNS: &'static str = "subject_id, email, phone, display_name, \
     push_token, state, last_confirmed_at, checkin_interval_secs, \
     grace_period_secs, vacation_mode, reminder_enabled, reminder_offset_secs, \
     sound_enabled, alert_sound, alert_volume, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:            row.get(0)?,
      email:                 row.get(1)?,
      phone:                 row.get(2)?,
      display_name:          row.get(3)?,
      push_token:            row.get(4)?,
      state:                 row.get(5)?,
      last_confirmed_at:     row.get(6)?,
      checkin_interval_secs: row.get(7)?,
      grace_period_secs:     row.get(8)?,
      vacation_mode:         row.get(9)?,
      reminder_enabled:      row.get(10)?,
      reminder_offset_secs:  row.get(11)?,
      sound_enabled:         row.get(12)?,
      alert_sound:           row.get(13)?,
      alert_volume:          row.get(14)?,
      created_at:            row.get(15)?,
      updated_at:            row.get(16)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:        decode_uuid(&self.subject_id)?,
      email:             self.email,
      phone:             self.phone,
      display_name:      self.display_name,
      push_token:        self.push_token,
      state:             decode_state(&self.state)?,
      last_confirmed_at: decode_opt_dt(self.last_confirmed_at)?,
      checkin_interval:  Duration::seconds(self.checkin_interval_secs),
      grace_period:      Duration::seconds(self.grace_period_secs),
      vacation_mode:     self.vacation_mode,
      reminder_enabled:  self.reminder_enabled,
      reminder_offset:   Duration::seconds(self.reminder_offset_secs),
      sound_enabled:     self.sound_enabled,
      alert_sound:       self.alert_sound,
      alert_volume:      self.alert_volume as u8,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `contacts` row.
pub struct RawContact {
  pub contact_id:        String,
  pub owner_id:          String,
  pub name:              String,
  pub channel:           String,
  pub destination:       String,
  pub status:            String,
  pub linked_subject_id: Option<String>,
  pub invite_sent_at:    Option<String>,
  pub created_at:        String,
}

impl RawContact {
  pub const COLUMNS: &'static str = "contact_id, owner_id, name, channel, \
     destination, status, linked_subject_id, invite_sent_at, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:        row.get(0)?,
      owner_id:          row.get(1)?,
      name:              row.get(2)?,
      channel:           row.get(3)?,
      destination:       row.get(4)?,
      status:            row.get(5)?,
      linked_subject_id: row.get(6)?,
      invite_sent_at:    row.get(7)?,
      created_at:        row.get(8)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:        decode_uuid(&self.contact_id)?,
      owner_id:          decode_uuid(&self.owner_id)?,
      name:              self.name,
      channel:           decode_channel(&self.channel)?,
      destination:       self.destination,
      status:            decode_contact_status(&self.status)?,
      linked_subject_id: decode_opt_uuid(self.linked_subject_id)?,
      invite_sent_at:    decode_opt_dt(self.invite_sent_at)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// A delivery joined with its event, for the history projection.
pub struct RawHistoryEntry {
  pub delivery_id:      String,
  pub event_id:         String,
  pub event_type:       String,
  pub channel:          Option<String>,
  pub destination:      String,
  pub status:           String,
  pub error:            Option<String>,
  pub delivered_at:     Option<String>,
  pub event_created_at: String,
  pub created_at:       String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      delivery_id:      decode_uuid(&self.delivery_id)?,
      event_id:         decode_uuid(&self.event_id)?,
      event_type:       decode_event_type(&self.event_type)?,
      channel:          decode_opt_channel(self.channel)?,
      destination:      self.destination,
      status:           decode_delivery_status(&self.status)?,
      error:            self.error,
      delivered_at:     decode_opt_dt(self.delivered_at)?,
      event_created_at: decode_dt(&self.event_created_at)?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}
