//! [`SqliteStore`] — the SQLite implementation of [`VigilStore`].

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use vigil_core::{
  contact::{
    Contact, ContactRecipient, ContactUpdate, NewContact, OwnerSummary,
    PendingInvite, TrustedLink,
  },
  event::{
    HistoryEntry, NewDelivery, NewEvent, NotificationDelivery,
    NotificationEvent, Severity,
  },
  store::VigilStore,
  subject::{NewSubject, Subject, SubjectSettings, SubjectState},
};

use crate::{
  Error, Result,
  encode::{RawContact, RawHistoryEntry, RawSubject, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Vigil store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one subject row as raw strings.
  async fn raw_subject(&self, id: Uuid) -> Result<Option<RawSubject>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {} FROM subjects WHERE subject_id = ?1",
      RawSubject::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawSubject::from_row)
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }

  /// Write every mutable column of a subject back (read-modify-write for the
  /// settings path).
  async fn write_subject(&self, subject: &Subject) -> Result<()> {
    let id_str = encode_uuid(subject.subject_id);
    let phone = subject.phone.clone();
    let display_name = subject.display_name.clone();
    let push_token = subject.push_token.clone();
    let state = subject.state.as_str();
    let last_confirmed = subject.last_confirmed_at.map(encode_dt);
    let interval = subject.checkin_interval.num_seconds();
    let grace = subject.grace_period.num_seconds();
    let vacation = subject.vacation_mode;
    let reminder_enabled = subject.reminder_enabled;
    let reminder_offset = subject.reminder_offset.num_seconds();
    let sound_enabled = subject.sound_enabled;
    let alert_sound = subject.alert_sound.clone();
    let alert_volume = subject.alert_volume as i64;
    let updated_at = encode_dt(subject.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE subjects SET
             phone = ?2, display_name = ?3, push_token = ?4, state = ?5,
             last_confirmed_at = ?6, checkin_interval_secs = ?7,
             grace_period_secs = ?8, vacation_mode = ?9,
             reminder_enabled = ?10, reminder_offset_secs = ?11,
             sound_enabled = ?12, alert_sound = ?13, alert_volume = ?14,
             updated_at = ?15
           WHERE subject_id = ?1",
          rusqlite::params![
            id_str,
            phone,
            display_name,
            push_token,
            state,
            last_confirmed,
            interval,
            grace,
            vacation,
            reminder_enabled,
            reminder_offset,
            sound_enabled,
            alert_sound,
            alert_volume,
            updated_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Set ACTIVE with a fresh confirmation and write the state event. With
  /// `guard_escalation` the update only fires while the subject is not
  /// ESCALATED, so zero affected rows means missing or escalated.
  async fn set_active(
    &self,
    id: Uuid,
    now: DateTime<Utc>,
    reason: String,
    guard_escalation: bool,
  ) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(now);

    let affected = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let sql = if guard_escalation {
          "UPDATE subjects
             SET state = 'ACTIVE', last_confirmed_at = ?2, updated_at = ?2
           WHERE subject_id = ?1 AND state != 'ESCALATED'"
        } else {
          "UPDATE subjects
             SET state = 'ACTIVE', last_confirmed_at = ?2, updated_at = ?2
           WHERE subject_id = ?1"
        };
        let affected =
          tx.execute(sql, rusqlite::params![id_str, now_str])?;
        if affected > 0 {
          insert_state_event(&tx, &id_str, "ACTIVE", &reason, &now_str)?;
        }
        tx.commit()?;
        Ok(affected)
      })
      .await?;

    if affected == 0 {
      return Ok(None);
    }
    self.get_subject(id).await
  }
}

/// Insert a state event inside an open transaction.
fn insert_state_event(
  conn: &rusqlite::Connection,
  subject_id: &str,
  to_state: &str,
  reason: &str,
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO state_events (state_event_id, subject_id, to_state, reason, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      subject_id,
      to_state,
      reason,
      at
    ],
  )?;
  Ok(())
}

// ─── VigilStore impl ─────────────────────────────────────────────────────────

impl VigilStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn create_subject(&self, input: NewSubject) -> Result<Subject> {
    let now = Utc::now();
    let subject = Subject {
      subject_id:        Uuid::new_v4(),
      email:             input.email,
      phone:             input.phone,
      display_name:      input.display_name,
      push_token:        None,
      state:             SubjectState::Onboarding,
      last_confirmed_at: None,
      checkin_interval:  Duration::hours(24),
      grace_period:      Duration::hours(1),
      vacation_mode:     false,
      reminder_enabled:  true,
      reminder_offset:   Duration::minutes(30),
      sound_enabled:     true,
      alert_sound:       "default".to_string(),
      alert_volume:      80,
      created_at:        now,
      updated_at:        now,
    };

    let id_str = encode_uuid(subject.subject_id);
    let email = subject.email.clone();
    let phone = subject.phone.clone();
    let display_name = subject.display_name.clone();
    let at_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects
             (subject_id, email, phone, display_name, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![id_str, email, phone, display_name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    self
      .raw_subject(id)
      .await?
      .map(RawSubject::into_subject)
      .transpose()
  }

  async fn update_settings(
    &self,
    id: Uuid,
    settings: SubjectSettings,
  ) -> Result<Option<Subject>> {
    let Some(mut subject) =
      self.raw_subject(id).await?.map(RawSubject::into_subject).transpose()?
    else {
      return Ok(None);
    };

    if let Some(v) = settings.display_name {
      subject.display_name = Some(v);
    }
    if let Some(v) = settings.phone {
      subject.phone = Some(v);
    }
    if let Some(v) = settings.push_token {
      subject.push_token = Some(v);
    }
    if let Some(v) = settings.checkin_interval {
      subject.checkin_interval = v;
    }
    if let Some(v) = settings.grace_period {
      subject.grace_period = v;
    }
    if let Some(v) = settings.vacation_mode {
      subject.vacation_mode = v;
    }
    if let Some(v) = settings.reminder_enabled {
      subject.reminder_enabled = v;
    }
    if let Some(v) = settings.reminder_offset {
      subject.reminder_offset = v;
    }
    if let Some(v) = settings.sound_enabled {
      subject.sound_enabled = v;
    }
    if let Some(v) = settings.alert_sound {
      subject.alert_sound = v;
    }
    if let Some(v) = settings.alert_volume {
      subject.alert_volume = v;
    }
    subject.updated_at = Utc::now();

    self.write_subject(&subject).await?;
    Ok(Some(subject))
  }

  async fn delete_subject(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let affected = self
      .conn
      .call(move |conn| {
        // Foreign keys cascade to contacts, tokens, events, deliveries,
        // and state events.
        Ok(conn.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(affected > 0)
  }

  async fn record_checkin(
    &self,
    id: Uuid,
    now: DateTime<Utc>,
    reason: String,
  ) -> Result<Option<Subject>> {
    // Guarded: a check-in racing a scan or panic must not clear the
    // escalation they just committed.
    self.set_active(id, now, reason, true).await
  }

  async fn compare_and_transition(
    &self,
    id: Uuid,
    expected: SubjectState,
    next: SubjectState,
    reason: String,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let expected_str = expected.as_str();
    let next_str = next.as_str();
    let now_str = encode_dt(Utc::now());

    let fired = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let affected = tx.execute(
          "UPDATE subjects SET state = ?3, updated_at = ?4
           WHERE subject_id = ?1 AND state = ?2",
          rusqlite::params![id_str, expected_str, next_str, now_str],
        )?;
        if affected > 0 {
          insert_state_event(&tx, &id_str, next_str, &reason, &now_str)?;
        }
        tx.commit()?;
        Ok(affected > 0)
      })
      .await?;
    Ok(fired)
  }

  async fn escalate_if_not_escalated(
    &self,
    id: Uuid,
    reason: String,
  ) -> Result<bool> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let fired = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let affected = tx.execute(
          "UPDATE subjects SET state = 'ESCALATED', updated_at = ?2
           WHERE subject_id = ?1 AND state != 'ESCALATED'",
          rusqlite::params![id_str, now_str],
        )?;
        if affected > 0 {
          insert_state_event(&tx, &id_str, "ESCALATED", &reason, &now_str)?;
        }
        tx.commit()?;
        Ok(affected > 0)
      })
      .await?;
    Ok(fired)
  }

  async fn resolve_to_active(
    &self,
    id: Uuid,
    now: DateTime<Utc>,
    reason: String,
  ) -> Result<Option<Subject>> {
    // Unguarded: resolution is the one path allowed to leave ESCALATED.
    self.set_active(id, now, reason, false).await
  }

  async fn scan_candidates(&self) -> Result<Vec<Subject>> {
    let sql = format!(
      "SELECT {} FROM subjects
       WHERE state IN ('ACTIVE', 'GRACE')
         AND vacation_mode = 0
         AND last_confirmed_at IS NOT NULL",
      RawSubject::COLUMNS
    );

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn add_contact(&self, input: NewContact) -> Result<Contact> {
    let now = Utc::now();
    let contact = Contact {
      contact_id:        Uuid::new_v4(),
      owner_id:          input.owner_id,
      name:              input.name,
      channel:           input.channel,
      destination:       input.destination,
      status:            vigil_core::contact::ContactStatus::Pending,
      linked_subject_id: None,
      invite_sent_at:    None,
      created_at:        now,
    };

    let id_str = encode_uuid(contact.contact_id);
    let owner_str = encode_uuid(contact.owner_id);
    let name = contact.name.clone();
    let channel = contact.channel.as_str();
    let destination = contact.destination.clone();
    let at_str = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts
             (contact_id, owner_id, name, channel, destination, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, owner_str, name, channel, destination, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(contact)
  }

  async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);
    let sql = format!(
      "SELECT {} FROM contacts WHERE contact_id = ?1",
      RawContact::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawContact::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn list_contacts(&self, owner: Uuid) -> Result<Vec<Contact>> {
    let owner_str = encode_uuid(owner);
    let sql = format!(
      "SELECT {} FROM contacts WHERE owner_id = ?1 ORDER BY created_at DESC",
      RawContact::COLUMNS
    );

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  async fn update_contact(
    &self,
    id: Uuid,
    update: ContactUpdate,
    reset_link: bool,
  ) -> Result<Option<Contact>> {
    let Some(mut contact) = self.get_contact(id).await? else {
      return Ok(None);
    };

    if let Some(v) = update.name {
      contact.name = v;
    }
    if let Some(v) = update.channel {
      contact.channel = v;
    }
    if let Some(v) = update.destination {
      contact.destination = v;
    }
    if reset_link {
      contact.status = vigil_core::contact::ContactStatus::Pending;
      contact.linked_subject_id = None;
      contact.invite_sent_at = None;
    }

    let id_str = encode_uuid(id);
    let name = contact.name.clone();
    let channel = contact.channel.as_str();
    let destination = contact.destination.clone();
    let status = contact.status.as_str();
    let linked = contact.linked_subject_id.map(encode_uuid);
    let invite_sent = contact.invite_sent_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE contacts SET
             name = ?2, channel = ?3, destination = ?4, status = ?5,
             linked_subject_id = ?6, invite_sent_at = ?7
           WHERE contact_id = ?1",
          rusqlite::params![
            id_str,
            name,
            channel,
            destination,
            status,
            linked,
            invite_sent
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(contact))
  }

  async fn delete_contact(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contacts WHERE contact_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(affected > 0)
  }

  async fn mark_invited(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET status = 'PENDING', invite_sent_at = ?2
           WHERE contact_id = ?1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    if affected == 0 {
      return Ok(None);
    }
    self.get_contact(id).await
  }

  async fn confirm_contact(
    &self,
    id: Uuid,
    linked: Uuid,
  ) -> Result<Option<Contact>> {
    let id_str = encode_uuid(id);
    let linked_str = encode_uuid(linked);

    let affected = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE contacts SET status = 'CONFIRMED', linked_subject_id = ?2
           WHERE contact_id = ?1",
          rusqlite::params![id_str, linked_str],
        )?)
      })
      .await?;

    if affected == 0 {
      return Ok(None);
    }
    self.get_contact(id).await
  }

  async fn confirmed_recipients(
    &self,
    owner: Uuid,
  ) -> Result<Vec<ContactRecipient>> {
    let owner_str = encode_uuid(owner);
    let sql = format!(
      "SELECT {}, s.push_token
       FROM contacts c
       LEFT JOIN subjects s ON s.subject_id = c.linked_subject_id
       WHERE c.owner_id = ?1 AND c.status = 'CONFIRMED'
       ORDER BY c.created_at",
      // Qualify the contact columns with the alias.
      RawContact::COLUMNS
        .split(", ")
        .map(|col| format!("c.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
    );

    let raws: Vec<(RawContact, Option<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], |row| {
            Ok((RawContact::from_row(row)?, row.get(9)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, token)| {
        Ok(ContactRecipient {
          contact:           raw.into_contact()?,
          linked_push_token: token,
        })
      })
      .collect()
  }

  async fn count_destination_owners(&self, destination: &str) -> Result<u32> {
    let dest = destination.to_owned();
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(DISTINCT owner_id) FROM contacts
           WHERE LOWER(destination) = LOWER(?1)",
          rusqlite::params![dest],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count as u32)
  }

  async fn pending_invites_for(
    &self,
    destinations: Vec<String>,
  ) -> Result<Vec<PendingInvite>> {
    if destinations.is_empty() {
      return Ok(Vec::new());
    }

    let lowered: Vec<String> =
      destinations.iter().map(|d| d.to_lowercase()).collect();
    let placeholders = (1..=lowered.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT {}, o.subject_id, o.email, o.display_name
       FROM contacts c
       JOIN subjects o ON o.subject_id = c.owner_id
       WHERE c.status = 'PENDING' AND LOWER(c.destination) IN ({placeholders})
       ORDER BY c.created_at DESC",
      RawContact::COLUMNS
        .split(", ")
        .map(|col| format!("c.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
    );

    let raws: Vec<(RawContact, String, String, Option<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(lowered), |row| {
            Ok((
              RawContact::from_row(row)?,
              row.get(9)?,
              row.get(10)?,
              row.get(11)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, owner_id, email, display_name)| {
        Ok(PendingInvite {
          contact: raw.into_contact()?,
          owner:   OwnerSummary {
            subject_id: crate::encode::decode_uuid(&owner_id)?,
            email,
            display_name,
          },
        })
      })
      .collect()
  }

  async fn links_for_subject(&self, subject: Uuid) -> Result<Vec<TrustedLink>> {
    let subject_str = encode_uuid(subject);
    let sql = format!(
      "SELECT {}, o.subject_id, o.email, o.display_name
       FROM contacts c
       JOIN subjects o ON o.subject_id = c.owner_id
       WHERE c.linked_subject_id = ?1 AND c.status = 'CONFIRMED'
       ORDER BY c.created_at DESC",
      RawContact::COLUMNS
        .split(", ")
        .map(|col| format!("c.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
    );

    let raws: Vec<(RawContact, String, String, Option<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str], |row| {
            Ok((
              RawContact::from_row(row)?,
              row.get(9)?,
              row.get(10)?,
              row.get(11)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, owner_id, email, display_name)| {
        Ok(TrustedLink {
          contact: raw.into_contact()?,
          owner:   OwnerSummary {
            subject_id: crate::encode::decode_uuid(&owner_id)?,
            email,
            display_name,
          },
        })
      })
      .collect()
  }

  // ── Notification audit trail ──────────────────────────────────────────────

  async fn create_event(&self, input: NewEvent) -> Result<NotificationEvent> {
    let event = NotificationEvent {
      event_id:   Uuid::new_v4(),
      subject_id: input.subject_id,
      event_type: input.event_type,
      meta:       input.meta,
      created_at: Utc::now(),
    };

    let id_str = encode_uuid(event.event_id);
    let subject_str = encode_uuid(event.subject_id);
    let type_str = event.event_type.as_str();
    let meta_str = serde_json::to_string(&event.meta)?;
    let at_str = encode_dt(event.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_events
             (event_id, subject_id, event_type, meta, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, subject_str, type_str, meta_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  async fn record_delivery(
    &self,
    input: NewDelivery,
  ) -> Result<NotificationDelivery> {
    let delivery = NotificationDelivery {
      delivery_id:          Uuid::new_v4(),
      event_id:             input.event_id,
      channel:              input.channel,
      destination:          input.destination,
      status:               input.status,
      error:                input.error,
      delivered_at:         input.delivered_at,
      recipient_subject_id: input.recipient_subject_id,
      created_at:           Utc::now(),
    };

    let id_str = encode_uuid(delivery.delivery_id);
    let event_str = encode_uuid(delivery.event_id);
    let channel = delivery.channel.map(|c| c.as_str());
    let destination = delivery.destination.clone();
    let status = delivery.status.as_str();
    let error = delivery.error.clone();
    let delivered_at = delivery.delivered_at.map(encode_dt);
    let recipient = delivery.recipient_subject_id.map(encode_uuid);
    let at_str = encode_dt(delivery.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notification_deliveries
             (delivery_id, event_id, channel, destination, status, error,
              delivered_at, recipient_subject_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            event_str,
            channel,
            destination,
            status,
            error,
            delivered_at,
            recipient,
            at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(delivery)
  }

  async fn recently_sent(
    &self,
    destination: &str,
    severity: Severity,
    since: DateTime<Utc>,
  ) -> Result<bool> {
    let dest = destination.to_owned();
    let since_str = encode_dt(since);
    let types = severity
      .event_types()
      .iter()
      .map(|t| format!("'{}'", t.as_str()))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "SELECT 1
       FROM notification_deliveries d
       JOIN notification_events e ON e.event_id = d.event_id
       WHERE d.destination = ?1
         AND d.status = 'SENT'
         AND d.created_at >= ?2
         AND e.event_type IN ({types})
       LIMIT 1"
    );

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![dest, since_str], |_| Ok(true))
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn notification_history(
    &self,
    subject: Uuid,
    limit: u32,
  ) -> Result<Vec<HistoryEntry>> {
    let subject_str = encode_uuid(subject);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.delivery_id, d.event_id, e.event_type, d.channel,
                  d.destination, d.status, d.error, d.delivered_at,
                  e.created_at, d.created_at
           FROM notification_deliveries d
           JOIN notification_events e ON e.event_id = d.event_id
           WHERE e.subject_id = ?1
           ORDER BY d.created_at DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str, limit], |row| {
            Ok(RawHistoryEntry {
              delivery_id:      row.get(0)?,
              event_id:         row.get(1)?,
              event_type:       row.get(2)?,
              channel:          row.get(3)?,
              destination:      row.get(4)?,
              status:           row.get(5)?,
              error:            row.get(6)?,
              delivered_at:     row.get(7)?,
              event_created_at: row.get(8)?,
              created_at:       row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  // ── API tokens ────────────────────────────────────────────────────────────

  async fn insert_token(&self, token_hash: String, subject: Uuid) -> Result<()> {
    let subject_str = encode_uuid(subject);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO api_tokens (token_hash, subject_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![token_hash, subject_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn subject_for_token(&self, token_hash: &str) -> Result<Option<Subject>> {
    let hash = token_hash.to_owned();
    let sql = format!(
      "SELECT {} FROM subjects s
       JOIN api_tokens t ON t.subject_id = s.subject_id
       WHERE t.token_hash = ?1",
      RawSubject::COLUMNS
        .split(", ")
        .map(|col| format!("s.{col}"))
        .collect::<Vec<_>>()
        .join(", ")
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![hash], RawSubject::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }
}
