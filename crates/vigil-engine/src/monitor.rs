//! The check-in state machine: the periodic scan plus the manual operations
//! (check-in, panic, resolve, test alert).
//!
//! Every transition goes through the store's conditional updates, so a scan
//! racing another scan or a manual panic fires each edge at most once. A
//! dispatch failure after a committed transition is logged and surfaced but
//! never rolls the state back.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;
use vigil_core::{
  event::{DeliveryReport, EventType},
  store::VigilStore,
  subject::{Subject, SubjectState},
  transition::plan_transition,
};

use crate::{DispatchTarget, Engine, Error, Result};

const REASON_FIRST_CHECKIN: &str = "first check-in";
const REASON_MANUAL_CHECKIN: &str = "manual check-in";
const REASON_PANIC: &str = "manual panic trigger";
const REASON_RESOLVED: &str = "user resolved escalation";

/// What one scan pass did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanReport {
  pub scanned:   usize,
  pub to_grace:  usize,
  pub escalated: usize,
}

impl<S: VigilStore + Clone> Engine<S> {
  /// Evaluate every eligible subject against the transition rule and fire
  /// the edges that are due. Escalation edges dispatch an ESCALATION_ALERT.
  pub async fn run_scan(&self) -> Result<ScanReport> {
    let candidates =
      self.store().scan_candidates().await.map_err(Error::store)?;
    let now = Utc::now();

    let mut report = ScanReport {
      scanned: candidates.len(),
      ..Default::default()
    };

    for subject in candidates {
      let Some(planned) = plan_transition(&subject, now) else {
        continue;
      };
      let fired = self
        .store()
        .compare_and_transition(
          subject.subject_id,
          planned.from,
          planned.to,
          planned.reason.to_string(),
        )
        .await
        .map_err(Error::store)?;
      if !fired {
        // Another scan or a manual action got there first.
        continue;
      }

      info!(
        subject_id = %subject.subject_id,
        from = planned.from.as_str(),
        to = planned.to.as_str(),
        reason = planned.reason,
        "state transition"
      );

      match planned.to {
        SubjectState::Grace => report.to_grace += 1,
        SubjectState::Escalated => {
          report.escalated += 1;
          if let Err(err) = self
            .dispatch(
              subject.subject_id,
              EventType::EscalationAlert,
              DispatchTarget::Contacts,
            )
            .await
          {
            // The transition is already durable; keep scanning.
            error!(
              subject_id = %subject.subject_id,
              %err,
              "escalation dispatch failed"
            );
          }
        }
        _ => {}
      }
    }

    Ok(report)
  }

  /// Manual "I'm fine": stamps the confirmation and lands in ACTIVE. Refused
  /// while ESCALATED — the subject must resolve the alert so their contacts
  /// are told to stand down.
  pub async fn check_in(&self, subject_id: Uuid) -> Result<Subject> {
    let subject = self.subject(subject_id).await?;
    if subject.state == SubjectState::Escalated {
      return Err(vigil_core::Error::EscalationActive.into());
    }

    let reason = if subject.last_confirmed_at.is_none() {
      REASON_FIRST_CHECKIN
    } else {
      REASON_MANUAL_CHECKIN
    };

    // The write itself is conditional on the state not being ESCALATED, so
    // a scan or panic landing between the read above and this update is
    // refused rather than silently cleared.
    self
      .store()
      .record_checkin(subject_id, Utc::now(), reason.to_string())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| vigil_core::Error::EscalationActive.into())
  }

  /// Manual panic: jump straight to ESCALATED and alert every confirmed
  /// contact. Idempotent — a second press while already escalated neither
  /// writes a second state event nor re-alerts.
  pub async fn panic(
    &self,
    subject_id: Uuid,
  ) -> Result<Option<DeliveryReport>> {
    // Existence check first so a missing subject is a 404, not a no-op.
    self.subject(subject_id).await?;

    let fired = self
      .store()
      .escalate_if_not_escalated(subject_id, REASON_PANIC.to_string())
      .await
      .map_err(Error::store)?;
    if !fired {
      warn!(%subject_id, "panic pressed while already escalated");
      return Ok(None);
    }

    let report = self
      .dispatch(
        subject_id,
        EventType::EscalationAlert,
        DispatchTarget::Contacts,
      )
      .await?;
    Ok(Some(report))
  }

  /// "I'm safe": back to ACTIVE with a fresh confirmation, and every
  /// confirmed contact gets a RESOLUTION_ALERT (which bypasses cooldown, so
  /// the stand-down lands even seconds after the escalation did).
  pub async fn resolve_alert(
    &self,
    subject_id: Uuid,
  ) -> Result<(Subject, DeliveryReport)> {
    let subject = self
      .store()
      .resolve_to_active(subject_id, Utc::now(), REASON_RESOLVED.to_string())
      .await
      .map_err(Error::store)?
      .ok_or(vigil_core::Error::SubjectNotFound(subject_id))?;

    let report = self
      .dispatch(
        subject_id,
        EventType::ResolutionAlert,
        DispatchTarget::Contacts,
      )
      .await?;
    Ok((subject, report))
  }

  /// Dry run of the alert path, subject to the normal cooldown unless
  /// configured otherwise.
  pub async fn send_test_alert(
    &self,
    subject_id: Uuid,
  ) -> Result<DeliveryReport> {
    self
      .dispatch(subject_id, EventType::TestAlert, DispatchTarget::Contacts)
      .await
  }
}
