//! The `VigilStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `vigil-store-sqlite`).
//! Higher layers (`vigil-engine`, `vigil-api`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Two primitives matter for correctness: the conditional state updates
//! ([`compare_and_transition`](VigilStore::compare_and_transition) and
//! [`escalate_if_not_escalated`](VigilStore::escalate_if_not_escalated)) are
//! the serialisation points that keep overlapping scans and scan-vs-panic
//! races from double-firing an escalation, and every state mutation writes
//! its [`StateEvent`](crate::event::StateEvent) in the same transaction.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  contact::{
    Contact, ContactRecipient, ContactUpdate, NewContact, PendingInvite,
    TrustedLink,
  },
  event::{
    HistoryEntry, NewDelivery, NewEvent, NotificationDelivery,
    NotificationEvent, Severity,
  },
  subject::{NewSubject, Subject, SubjectSettings, SubjectState},
};

/// Abstraction over a Vigil storage backend.
///
/// All notification events and deliveries are append-only. State mutations
/// are expressed as conditional updates so callers can rely on exactly-once
/// edge semantics.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait VigilStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create and persist a new subject in the ONBOARDING state.
  fn create_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by UUID. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Apply a partial settings update. Returns the updated subject, or `None`
  /// if it does not exist.
  fn update_settings(
    &self,
    id: Uuid,
    settings: SubjectSettings,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Delete a subject and cascade to all owned rows (contacts, tokens,
  /// events, deliveries, state events). Returns `false` if it did not exist.
  fn delete_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Record a manual check-in: sets `last_confirmed_at = now`, state ACTIVE,
  /// and writes a StateEvent with `reason`, all atomically. The update is
  /// conditional on `state != ESCALATED` — an escalation can only be cleared
  /// through [`resolve_to_active`](VigilStore::resolve_to_active). Returns
  /// the updated subject, or `None` if it does not exist or is escalated.
  fn record_checkin(
    &self,
    id: Uuid,
    now: DateTime<Utc>,
    reason: String,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Atomic "update-if-current-state-equals": move `id` from `expected` to
  /// `next` and write a StateEvent, or do nothing if the state has already
  /// changed. Returns whether the transition fired.
  fn compare_and_transition(
    &self,
    id: Uuid,
    expected: SubjectState,
    next: SubjectState,
    reason: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Force ESCALATED from any state except ESCALATED itself (manual panic).
  /// Returns whether the transition fired; `false` means the subject was
  /// already escalated (or missing) and no event was written.
  fn escalate_if_not_escalated(
    &self,
    id: Uuid,
    reason: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Force ACTIVE with `last_confirmed_at = now` (explicit resolution) and
  /// write a StateEvent. Returns the updated subject, or `None` if it does
  /// not exist.
  fn resolve_to_active(
    &self,
    id: Uuid,
    now: DateTime<Utc>,
    reason: String,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects the periodic scan must evaluate: state ACTIVE or GRACE,
  /// not in vacation mode, with at least one confirmation on record.
  fn scan_candidates(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// Insert a new contact with status PENDING and no link.
  fn add_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  fn get_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// All contacts owned by `owner`, newest first.
  fn list_contacts(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Apply a partial update. When `reset_link` is set the row additionally
  /// drops back to PENDING with no linked subject (destination ownership
  /// must be re-verified).
  fn update_contact(
    &self,
    id: Uuid,
    update: ContactUpdate,
    reset_link: bool,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Delete the row outright. Returns `false` if it did not exist.
  fn delete_contact(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Stamp a successfully delivered invite: status PENDING,
  /// `invite_sent_at = at`.
  fn mark_invited(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Confirm the invite: status CONFIRMED, `linked_subject_id = linked`.
  fn confirm_contact(
    &self,
    id: Uuid,
    linked: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// CONFIRMED contacts of `owner`, joined with each linked subject's push
  /// token — the default recipient set for a dispatch.
  fn confirmed_recipients(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<Vec<ContactRecipient>, Self::Error>> + Send + '_;

  /// How many distinct owners already trust `destination` (anti-abuse cap).
  fn count_destination_owners<'a>(
    &'a self,
    destination: &'a str,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  /// All PENDING contacts system-wide whose destination matches one of the
  /// caller's verified destinations. Privileged cross-subject query; email
  /// matching is case-insensitive.
  fn pending_invites_for(
    &self,
    destinations: Vec<String>,
  ) -> impl Future<Output = Result<Vec<PendingInvite>, Self::Error>> + Send + '_;

  /// CONFIRMED contacts where `subject` is the linked party, with owner
  /// summaries.
  fn links_for_subject(
    &self,
    subject: Uuid,
  ) -> impl Future<Output = Result<Vec<TrustedLink>, Self::Error>> + Send + '_;

  // ── Notification audit trail ──────────────────────────────────────────

  /// Append a NotificationEvent. `created_at` is set by the store.
  fn create_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<NotificationEvent, Self::Error>> + Send + '_;

  /// Append a NotificationDelivery tied to its event.
  fn record_delivery(
    &self,
    input: NewDelivery,
  ) -> impl Future<Output = Result<NotificationDelivery, Self::Error>> + Send + '_;

  /// Cooldown lookup: was anything SENT to `destination` since `since`, for
  /// an event of the given severity class?
  fn recently_sent<'a>(
    &'a self,
    destination: &'a str,
    severity: Severity,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Deliveries joined with their events for `subject`, newest first,
  /// capped at `limit`.
  fn notification_history(
    &self,
    subject: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + '_;

  // ── API tokens ────────────────────────────────────────────────────────

  /// Store the hash of a freshly issued bearer token.
  fn insert_token(
    &self,
    token_hash: String,
    subject: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a token hash to the subject that owns it.
  fn subject_for_token<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;
}
