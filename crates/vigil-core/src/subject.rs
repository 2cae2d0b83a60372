//! Subject — the monitored person.
//!
//! A subject owns its check-in schedule, its current safety state, and the
//! notification preferences the mobile client edits. Everything here is plain
//! data; the transition rule that moves a subject between states lives in
//! [`crate::transition`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a subject sits in the escalation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectState {
  /// Fresh account; terminal until the first check-in.
  Onboarding,
  /// Checked in within the current window.
  Active,
  /// Check-in window elapsed; soft warning, no dispatch yet.
  Grace,
  /// Grace period elapsed or panic triggered; contacts alerted.
  Escalated,
}

impl SubjectState {
  /// The wire/database discriminant.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Onboarding => "ONBOARDING",
      Self::Active => "ACTIVE",
      Self::Grace => "GRACE",
      Self::Escalated => "ESCALATED",
    }
  }
}

/// Serialise a [`chrono::Duration`] as whole seconds.
///
/// Used for the schedule fields below so subjects round-trip through JSON and
/// the store without a custom wrapper type.
pub mod duration_secs {
  use chrono::Duration;
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    d.num_seconds().serialize(s)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    Ok(Duration::seconds(i64::deserialize(d)?))
  }
}

/// The monitored user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:        Uuid,
  pub email:             String,
  pub phone:             Option<String>,
  pub display_name:      Option<String>,
  /// Opaque push token registered by the mobile client, if any.
  pub push_token:        Option<String>,
  pub state:             SubjectState,
  /// `None` until the first check-in.
  pub last_confirmed_at: Option<DateTime<Utc>>,
  #[serde(with = "duration_secs")]
  pub checkin_interval:  Duration,
  #[serde(with = "duration_secs")]
  pub grace_period:      Duration,
  /// Suppresses all automatic transitions while set.
  pub vacation_mode:     bool,
  pub reminder_enabled:  bool,
  /// How long before `due_at` the client should surface a reminder.
  #[serde(with = "duration_secs")]
  pub reminder_offset:   Duration,
  pub sound_enabled:     bool,
  pub alert_sound:       String,
  /// 0–100; interpreted by the client's audio layer.
  pub alert_volume:      u8,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

impl Subject {
  /// When the next check-in is due. `None` before the first confirmation.
  pub fn due_at(&self) -> Option<DateTime<Utc>> {
    self.last_confirmed_at.map(|t| t + self.checkin_interval)
  }

  /// When the grace buffer runs out and escalation fires.
  pub fn grace_end(&self) -> Option<DateTime<Utc>> {
    self.due_at().map(|t| t + self.grace_period)
  }

  /// The name contacts see in alert messages; falls back to the email.
  pub fn display_label(&self) -> &str {
    self.display_name.as_deref().unwrap_or(&self.email)
  }
}

/// Input to [`crate::store::VigilStore::create_subject`].
/// Server-assigned fields (id, timestamps, state) are not accepted here.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
  pub email:        String,
  pub phone:        Option<String>,
  pub display_name: Option<String>,
}

/// Partial update applied by `PATCH /api/settings`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectSettings {
  pub display_name:     Option<String>,
  pub phone:            Option<String>,
  pub push_token:       Option<String>,
  #[serde(default, with = "opt_duration_secs")]
  pub checkin_interval: Option<Duration>,
  #[serde(default, with = "opt_duration_secs")]
  pub grace_period:     Option<Duration>,
  pub vacation_mode:    Option<bool>,
  pub reminder_enabled: Option<bool>,
  #[serde(default, with = "opt_duration_secs")]
  pub reminder_offset:  Option<Duration>,
  pub sound_enabled:    Option<bool>,
  pub alert_sound:      Option<String>,
  pub alert_volume:     Option<u8>,
}

/// Deserialise-only counterpart of [`duration_secs`]; `SubjectSettings` is
/// never serialised back out.
mod opt_duration_secs {
  use chrono::Duration;
  use serde::{Deserialize, Deserializer};

  pub fn deserialize<'de, D: Deserializer<'de>>(
    d: D,
  ) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<i64>::deserialize(d)?.map(Duration::seconds))
  }
}

/// The verified identity of an API caller, produced by the token verifier.
///
/// Carries the destinations (email, phone) the caller has proven ownership
/// of; the linking protocol matches these against contact destinations.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
  pub subject_id: Uuid,
  pub email:      String,
  pub phone:      Option<String>,
}

impl From<&Subject> for CallerIdentity {
  fn from(s: &Subject) -> Self {
    Self {
      subject_id: s.subject_id,
      email:      s.email.clone(),
      phone:      s.phone.clone(),
    }
  }
}
