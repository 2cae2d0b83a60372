//! Engine tests: scan transitions, dispatch semantics, and the linking
//! protocol, run against mock senders and an in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use vigil_channels::{ChannelSender, ChannelSet, mock::MockSender};
use vigil_core::{
  contact::{ChannelKind, Contact, ContactStatus, ContactUpdate, NewContact},
  event::{DeliveryStatus, EventType},
  store::VigilStore,
  subject::{CallerIdentity, NewSubject, Subject, SubjectSettings, SubjectState},
};
use vigil_store_sqlite::SqliteStore;

use crate::{DispatchTarget, Engine, EngineConfig, Error};

fn dyn_sender(s: Arc<MockSender>) -> Arc<dyn ChannelSender> {
  s
}

struct Harness {
  engine: Engine<SqliteStore>,
  push:   Arc<MockSender>,
  email:  Arc<MockSender>,
  sms:    Arc<MockSender>,
}

impl Harness {
  fn store(&self) -> &SqliteStore {
    self.engine.store()
  }

  async fn subject(&self, email: &str) -> Subject {
    self
      .store()
      .create_subject(NewSubject {
        email:        email.into(),
        phone:        None,
        display_name: None,
      })
      .await
      .unwrap()
  }

  /// A subject whose last confirmation was `ago` in the past.
  async fn subject_checked_in(&self, email: &str, ago: Duration) -> Subject {
    let subject = self.subject(email).await;
    self
      .store()
      .record_checkin(subject.subject_id, Utc::now() - ago, "test".into())
      .await
      .unwrap()
      .unwrap()
  }

  /// An email contact of `owner`, confirmed and linked to a fresh account.
  async fn confirmed_contact(
    &self,
    owner: &Subject,
    destination: &str,
    linked_email: &str,
  ) -> (Contact, Subject) {
    let contact = self
      .store()
      .add_contact(NewContact {
        owner_id:    owner.subject_id,
        name:        "Dana".into(),
        channel:     ChannelKind::Email,
        destination: destination.into(),
      })
      .await
      .unwrap();
    let linked = self.subject(linked_email).await;
    let contact = self
      .store()
      .confirm_contact(contact.contact_id, linked.subject_id)
      .await
      .unwrap()
      .unwrap();
    (contact, linked)
  }

  async fn set_schedule(
    &self,
    subject: &Subject,
    interval: Duration,
    grace: Duration,
  ) {
    self
      .store()
      .update_settings(subject.subject_id, SubjectSettings {
        checkin_interval: Some(interval),
        grace_period: Some(grace),
        ..Default::default()
      })
      .await
      .unwrap()
      .unwrap();
  }
}

async fn harness_with(config: EngineConfig) -> Harness {
  let store = SqliteStore::open_in_memory().await.expect("store");
  let push = Arc::new(MockSender::new(ChannelKind::Push));
  let email = Arc::new(MockSender::new(ChannelKind::Email));
  let sms = Arc::new(MockSender::new(ChannelKind::Sms));
  let channels = ChannelSet {
    push:  Some(dyn_sender(push.clone())),
    email: Some(dyn_sender(email.clone())),
    sms:   Some(dyn_sender(sms.clone())),
  };
  Harness {
    engine: Engine::new(store, channels, config),
    push,
    email,
    sms,
  }
}

async fn harness() -> Harness {
  harness_with(EngineConfig::default()).await
}

// ─── Scan ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vacation_mode_subjects_never_transition() {
  let h = harness().await;
  let subject = h
    .subject_checked_in("alice@example.com", Duration::hours(100))
    .await;
  h.store()
    .update_settings(subject.subject_id, SubjectSettings {
      vacation_mode: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();

  let report = h.engine.run_scan().await.unwrap();
  assert_eq!(report.to_grace, 0);
  assert_eq!(report.escalated, 0);

  let after = h
    .store()
    .get_subject(subject.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.state, SubjectState::Active);
}

#[tokio::test]
async fn active_before_due_is_untouched() {
  let h = harness().await;
  let subject = h
    .subject_checked_in("alice@example.com", Duration::hours(1))
    .await;

  let report = h.engine.run_scan().await.unwrap();
  assert_eq!(report.scanned, 1);
  assert_eq!(report.to_grace, 0);

  let after = h
    .store()
    .get_subject(subject.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.state, SubjectState::Active);
}

#[tokio::test]
async fn window_elapsed_moves_to_grace_without_dispatch() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(61))
    .await;
  h.set_schedule(&owner, Duration::hours(1), Duration::minutes(15))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  let report = h.engine.run_scan().await.unwrap();
  assert_eq!(report.to_grace, 1);
  assert_eq!(report.escalated, 0);

  let after = h
    .store()
    .get_subject(owner.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.state, SubjectState::Grace);
  // Grace is a silent warning; nothing goes out.
  assert!(h.email.sent().is_empty());
  assert!(
    h.store()
      .notification_history(owner.subject_id, 10)
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn grace_elapsed_escalates_exactly_once_across_scans() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(76))
    .await;
  h.set_schedule(&owner, Duration::hours(1), Duration::minutes(15))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  // First scan takes the ACTIVE→GRACE edge, second takes GRACE→ESCALATED.
  let first = h.engine.run_scan().await.unwrap();
  assert_eq!(first.to_grace, 1);
  let second = h.engine.run_scan().await.unwrap();
  assert_eq!(second.escalated, 1);

  // Further scans see a steady ESCALATED state and do nothing.
  let third = h.engine.run_scan().await.unwrap();
  assert_eq!(third.scanned, 0);

  let after = h
    .store()
    .get_subject(owner.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.state, SubjectState::Escalated);

  // Exactly one alert: one delivery row, one message through the mock.
  let history = h
    .store()
    .notification_history(owner.subject_id, 10)
    .await
    .unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].event_type, EventType::EscalationAlert);
  assert_eq!(history[0].status, DeliveryStatus::Sent);
  assert_eq!(h.email.sent_destinations(), vec!["dana@example.com"]);
}

// ─── Manual operations ───────────────────────────────────────────────────────

#[tokio::test]
async fn panic_escalates_and_alerts_contacts() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  let report = h.engine.panic(owner.subject_id).await.unwrap().unwrap();
  assert_eq!(report.event.event_type, EventType::EscalationAlert);
  assert_eq!(report.sent(), 1);

  let after = h
    .store()
    .get_subject(owner.subject_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(after.state, SubjectState::Escalated);
}

#[tokio::test]
async fn panic_while_escalated_does_nothing() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  assert!(h.engine.panic(owner.subject_id).await.unwrap().is_some());
  assert!(h.engine.panic(owner.subject_id).await.unwrap().is_none());

  assert_eq!(h.email.sent().len(), 1);
}

#[tokio::test]
async fn checkin_refused_while_escalated() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.engine.panic(owner.subject_id).await.unwrap();

  let err = h.engine.check_in(owner.subject_id).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(vigil_core::Error::EscalationActive)
  ));
}

#[tokio::test]
async fn resolution_bypasses_cooldown() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  // Escalation alert lands first...
  h.engine.panic(owner.subject_id).await.unwrap();
  // ...and the stand-down must go out seconds later despite the cooldown.
  let (subject, report) =
    h.engine.resolve_alert(owner.subject_id).await.unwrap();

  assert_eq!(subject.state, SubjectState::Active);
  assert_eq!(report.event.event_type, EventType::ResolutionAlert);
  assert_eq!(report.sent(), 1);
  assert_eq!(report.outcomes[0].status, DeliveryStatus::Sent);
  assert_eq!(h.email.sent().len(), 2);
}

#[tokio::test]
async fn test_alert_respects_cooldown_by_default() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  let first = h.engine.send_test_alert(owner.subject_id).await.unwrap();
  assert_eq!(first.sent(), 1);

  let second = h.engine.send_test_alert(owner.subject_id).await.unwrap();
  assert_eq!(second.sent(), 0);
  assert_eq!(second.outcomes[0].status, DeliveryStatus::Skipped);
  assert_eq!(second.outcomes[0].error.as_deref(), Some("cooldown active"));
}

#[tokio::test]
async fn test_alert_bypass_is_a_config_flag() {
  let h = harness_with(EngineConfig {
    test_alert_bypasses_cooldown: true,
    ..Default::default()
  })
  .await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  assert_eq!(h.engine.send_test_alert(owner.subject_id).await.unwrap().sent(), 1);
  assert_eq!(h.engine.send_test_alert(owner.subject_id).await.unwrap().sent(), 1);
}

// ─── Dispatch semantics ──────────────────────────────────────────────────────

#[tokio::test]
async fn shared_destination_deduplicates_within_one_call() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  h.confirmed_contact(&owner, "family@example.com", "dana@example.com")
    .await;
  h.confirmed_contact(&owner, "family@example.com", "eli@example.com")
    .await;

  let report = h.engine.panic(owner.subject_id).await.unwrap().unwrap();
  assert_eq!(report.outcomes.len(), 2);
  assert_eq!(report.sent(), 1);

  let skipped: Vec<_> = report
    .outcomes
    .iter()
    .filter(|o| o.status == DeliveryStatus::Skipped)
    .collect();
  assert_eq!(skipped.len(), 1);
  assert_eq!(skipped[0].error.as_deref(), Some("cooldown active"));
  assert_eq!(h.email.sent().len(), 1);
}

#[tokio::test]
async fn stale_push_token_falls_back_to_stored_channel() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  let (_, linked) = h
    .confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;
  h.store()
    .update_settings(linked.subject_id, SubjectSettings {
      push_token: Some("ExponentPushToken[stale]".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  h.push.set_failure(Some("DeviceNotRegistered".into()));

  let report = h.engine.panic(owner.subject_id).await.unwrap().unwrap();
  assert_eq!(report.sent(), 1);
  assert_eq!(report.outcomes[0].channel, Some(ChannelKind::Email));
  assert!(h.push.sent().is_empty());
  assert_eq!(h.email.sent_destinations(), vec!["dana@example.com"]);
}

#[tokio::test]
async fn linked_push_token_is_preferred() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;
  let (_, linked) = h
    .confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;
  h.store()
    .update_settings(linked.subject_id, SubjectSettings {
      push_token: Some("ExponentPushToken[live]".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  let report = h.engine.panic(owner.subject_id).await.unwrap().unwrap();
  assert_eq!(report.outcomes[0].channel, Some(ChannelKind::Push));
  assert_eq!(h.push.sent_destinations(), vec!["ExponentPushToken[live]"]);
  assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn no_usable_channel_is_a_skip_not_a_failure() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  // Only SMS configured; the contact wants email.
  let sms = Arc::new(MockSender::new(ChannelKind::Sms));
  let engine = Engine::new(
    store.clone(),
    ChannelSet {
      sms: Some(dyn_sender(sms)),
      ..Default::default()
    },
    EngineConfig::default(),
  );

  let owner = store
    .create_subject(NewSubject {
      email:        "alice@example.com".into(),
      phone:        None,
      display_name: None,
    })
    .await
    .unwrap();
  let contact = store
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();
  let linked = store
    .create_subject(NewSubject {
      email:        "dana@example.com".into(),
      phone:        None,
      display_name: None,
    })
    .await
    .unwrap();
  store
    .confirm_contact(contact.contact_id, linked.subject_id)
    .await
    .unwrap();

  let report = engine
    .dispatch(
      owner.subject_id,
      EventType::TestAlert,
      DispatchTarget::Contacts,
    )
    .await
    .unwrap();
  assert_eq!(report.outcomes[0].status, DeliveryStatus::Skipped);
  assert_eq!(
    report.outcomes[0].error.as_deref(),
    Some("no valid channel configured")
  );
  assert!(report.outcomes[0].channel.is_none());
}

#[tokio::test]
async fn dispatch_without_recipients_still_writes_the_event() {
  let h = harness().await;
  let owner = h
    .subject_checked_in("alice@example.com", Duration::minutes(1))
    .await;

  let report = h
    .engine
    .dispatch(
      owner.subject_id,
      EventType::TestAlert,
      DispatchTarget::Contacts,
    )
    .await
    .unwrap();
  assert!(report.outcomes.is_empty());
  assert_eq!(report.event.event_type, EventType::TestAlert);
}

// ─── Linking protocol ────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_roundtrip_invite_then_confirm() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let dana = h.subject("dana@example.com").await;

  let contact = h
    .engine
    .add_contact(owner.subject_id, NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();
  assert_eq!(contact.status, ContactStatus::Pending);

  let (invited, report) = h
    .engine
    .invite(owner.subject_id, contact.contact_id)
    .await
    .unwrap();
  assert!(invited.invite_sent_at.is_some());
  assert_eq!(report.event.event_type, EventType::ContactRequest);
  assert_eq!(h.email.sent_destinations(), vec!["dana@example.com"]);

  let confirmed = h
    .engine
    .confirm(&CallerIdentity::from(&dana), contact.contact_id)
    .await
    .unwrap();
  assert_eq!(confirmed.status, ContactStatus::Confirmed);
  assert_eq!(confirmed.linked_subject_id, Some(dana.subject_id));

  // Exactly one row, and the owner was told their invite was accepted.
  assert_eq!(h.engine.list_contacts(owner.subject_id).await.unwrap().len(), 1);
  assert!(
    h.email
      .sent_destinations()
      .contains(&"alice@example.com".to_string())
  );
}

#[tokio::test]
async fn invite_uses_the_stored_sms_channel() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let contact = h
    .engine
    .add_contact(owner.subject_id, NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Sms,
      destination: "+15550100".into(),
    })
    .await
    .unwrap();

  let (invited, _) = h
    .engine
    .invite(owner.subject_id, contact.contact_id)
    .await
    .unwrap();
  assert!(invited.invite_sent_at.is_some());
  assert_eq!(h.sms.sent_destinations(), vec!["+15550100"]);
  assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn reinvite_of_a_linked_contact_goes_out_via_push() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let (contact, linked) = h
    .confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;
  h.store()
    .update_settings(linked.subject_id, SubjectSettings {
      push_token: Some("ExponentPushToken[live]".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  let (invited, report) = h
    .engine
    .invite(owner.subject_id, contact.contact_id)
    .await
    .unwrap();

  assert!(invited.invite_sent_at.is_some());
  assert_eq!(report.outcomes[0].channel, Some(ChannelKind::Push));
  assert_eq!(h.push.sent_destinations(), vec!["ExponentPushToken[live]"]);
  assert!(h.email.sent().is_empty());
}

#[tokio::test]
async fn confirm_rejects_identity_mismatch() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let mallory = h.subject("mallory@example.com").await;

  let contact = h
    .store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  let err = h
    .engine
    .confirm(&CallerIdentity::from(&mallory), contact.contact_id)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(vigil_core::Error::IdentityMismatch)
  ));

  let unchanged = h
    .store()
    .get_contact(contact.contact_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(unchanged.status, ContactStatus::Pending);
}

#[tokio::test]
async fn confirm_matches_email_case_insensitively() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let dana = h.subject("dana@example.com").await;

  let contact = h
    .store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "Dana@Example.com".into(),
    })
    .await
    .unwrap();

  let confirmed = h
    .engine
    .confirm(&CallerIdentity::from(&dana), contact.contact_id)
    .await
    .unwrap();
  assert_eq!(confirmed.linked_subject_id, Some(dana.subject_id));
}

#[tokio::test]
async fn confirm_is_idempotent_for_the_linked_caller() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let dana = h.subject("dana@example.com").await;
  let contact = h
    .store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  let caller = CallerIdentity::from(&dana);
  h.engine.confirm(&caller, contact.contact_id).await.unwrap();
  let acks = h.email.sent().len();

  // Second confirm changes nothing and sends no second acknowledgment.
  let again = h.engine.confirm(&caller, contact.contact_id).await.unwrap();
  assert_eq!(again.status, ContactStatus::Confirmed);
  assert_eq!(h.email.sent().len(), acks);
}

#[tokio::test]
async fn invite_total_failure_leaves_contact_untouched() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  // Email provider unconfigured, nothing else can address an email
  // destination.
  let engine = Engine::new(
    store.clone(),
    ChannelSet::default(),
    EngineConfig::default(),
  );

  let owner = store
    .create_subject(NewSubject {
      email:        "alice@example.com".into(),
      phone:        None,
      display_name: None,
    })
    .await
    .unwrap();
  let contact = store
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  let err = engine
    .invite(owner.subject_id, contact.contact_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AllChannelsFailed(_)));

  let unchanged = store
    .get_contact(contact.contact_id)
    .await
    .unwrap()
    .unwrap();
  assert!(unchanged.invite_sent_at.is_none());
}

#[tokio::test]
async fn invite_failure_reports_per_channel_detail() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let email = Arc::new(MockSender::failing(ChannelKind::Email, "provider 500"));
  let engine = Engine::new(
    store.clone(),
    ChannelSet {
      email: Some(dyn_sender(email)),
      ..Default::default()
    },
    EngineConfig::default(),
  );

  let owner = store
    .create_subject(NewSubject {
      email:        "alice@example.com".into(),
      phone:        None,
      display_name: None,
    })
    .await
    .unwrap();
  let contact = store
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  let err = engine
    .invite(owner.subject_id, contact.contact_id)
    .await
    .unwrap_err();
  let Error::AllChannelsFailed(failures) = err else {
    panic!("expected AllChannelsFailed, got {err:?}");
  };
  assert!(failures.email.as_deref().unwrap().contains("provider 500"));
  assert!(failures.push.is_none());
}

#[tokio::test]
async fn destination_owner_cap_is_enforced() {
  let h = harness_with(EngineConfig {
    max_owners_per_destination: 1,
    ..Default::default()
  })
  .await;
  let a = h.subject("a@example.com").await;
  let b = h.subject("b@example.com").await;

  h.engine
    .add_contact(a.subject_id, NewContact {
      owner_id:    a.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  let err = h
    .engine
    .add_contact(b.subject_id, NewContact {
      owner_id:    b.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Domain(vigil_core::Error::DestinationCapacity { count: 1, max: 1 })
  ));
}

#[tokio::test]
async fn destination_edit_resets_confirmation() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let (contact, _) = h
    .confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  let updated = h
    .engine
    .update_contact(owner.subject_id, contact.contact_id, ContactUpdate {
      destination: Some("dana@other.example.com".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(updated.status, ContactStatus::Pending);
  assert!(updated.linked_subject_id.is_none());
  assert!(updated.invite_sent_at.is_none());
}

#[tokio::test]
async fn contact_mutations_are_owner_scoped() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let other = h.subject("bob@example.com").await;
  let (contact, _) = h
    .confirmed_contact(&owner, "dana@example.com", "dana@example.com")
    .await;

  let err = h
    .engine
    .update_contact(other.subject_id, contact.contact_id, ContactUpdate {
      name: Some("Hijacked".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Domain(vigil_core::Error::NotOwner(_))));

  let err = h
    .engine
    .delete_contact(other.subject_id, contact.contact_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Domain(vigil_core::Error::NotOwner(_))));
}

#[tokio::test]
async fn decline_deletes_the_row() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let dana = h.subject("dana@example.com").await;
  let contact = h
    .store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();

  h.engine
    .decline(&CallerIdentity::from(&dana), contact.contact_id)
    .await
    .unwrap();

  assert!(h.store().get_contact(contact.contact_id).await.unwrap().is_none());
}

#[tokio::test]
async fn trusted_links_shows_both_directions() {
  let h = harness().await;
  let owner = h.subject("alice@example.com").await;
  let dana = h.subject("dana@example.com").await;

  // One pending invite addressed to dana, one confirmed link.
  h.store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana (work)".into(),
      channel:     ChannelKind::Email,
      destination: "Dana@Example.com".into(),
    })
    .await
    .unwrap();
  let confirmed = h
    .store()
    .add_contact(NewContact {
      owner_id:    owner.subject_id,
      name:        "Dana".into(),
      channel:     ChannelKind::Email,
      destination: "dana@example.com".into(),
    })
    .await
    .unwrap();
  h.store()
    .confirm_contact(confirmed.contact_id, dana.subject_id)
    .await
    .unwrap();

  let links = h
    .engine
    .trusted_links(&CallerIdentity::from(&dana))
    .await
    .unwrap();
  assert_eq!(links.pending.len(), 1);
  assert_eq!(links.pending[0].owner.email, "alice@example.com");
  assert_eq!(links.active.len(), 1);
  assert_eq!(links.active[0].contact.contact_id, confirmed.contact_id);
}
