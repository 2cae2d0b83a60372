//! The pure check-in transition rule.
//!
//! [`plan_transition`] decides, from timestamps and configuration alone,
//! whether a subject should move between safety states. It performs no I/O
//! and takes `now` as a parameter, so the rule is unit-testable and the scan
//! driver in `vigil-engine` stays a thin loop around it.

use chrono::{DateTime, Utc};

use crate::subject::{Subject, SubjectState};

/// A transition the scan should attempt, with the CAS precondition and the
/// audit reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
  pub from:   SubjectState,
  pub to:     SubjectState,
  pub reason: &'static str,
}

pub const REASON_WINDOW_ELAPSED: &str = "check-in window elapsed";
pub const REASON_GRACE_ELAPSED: &str = "grace period elapsed";

/// Evaluate the automatic transition rule for one subject at `now`.
///
/// Returns `None` when no transition is due: vacation mode, no check-in yet
/// (ONBOARDING), already ESCALATED, or simply not overdue. Re-evaluating a
/// subject that already transitioned yields `None`, which is what makes the
/// scan edge-triggered.
pub fn plan_transition(
  subject: &Subject,
  now: DateTime<Utc>,
) -> Option<PlannedTransition> {
  if subject.vacation_mode {
    return None;
  }

  let due_at = subject.due_at()?;
  let grace_end = due_at + subject.grace_period;

  match subject.state {
    SubjectState::Active if now >= due_at => Some(PlannedTransition {
      from:   SubjectState::Active,
      to:     SubjectState::Grace,
      reason: REASON_WINDOW_ELAPSED,
    }),
    SubjectState::Grace if now >= grace_end => Some(PlannedTransition {
      from:   SubjectState::Grace,
      to:     SubjectState::Escalated,
      reason: REASON_GRACE_ELAPSED,
    }),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone, Utc};
  use uuid::Uuid;

  use super::*;

  fn subject(state: SubjectState) -> Subject {
    Subject {
      subject_id:        Uuid::new_v4(),
      email:             "ada@example.com".into(),
      phone:             None,
      display_name:      None,
      push_token:        None,
      state,
      last_confirmed_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
      checkin_interval:  Duration::hours(1),
      grace_period:      Duration::minutes(15),
      vacation_mode:     false,
      reminder_enabled:  false,
      reminder_offset:   Duration::zero(),
      sound_enabled:     true,
      alert_sound:       "default".into(),
      alert_volume:      80,
      created_at:        Utc::now(),
      updated_at:        Utc::now(),
    }
  }

  fn t(minutes_after_confirm: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
      + Duration::minutes(minutes_after_confirm)
  }

  #[test]
  fn active_before_due_stays_put() {
    let s = subject(SubjectState::Active);
    assert_eq!(plan_transition(&s, t(59)), None);
  }

  #[test]
  fn active_at_due_moves_to_grace() {
    let s = subject(SubjectState::Active);
    let plan = plan_transition(&s, t(61)).unwrap();
    assert_eq!(plan.to, SubjectState::Grace);
    assert_eq!(plan.reason, REASON_WINDOW_ELAPSED);
  }

  #[test]
  fn grace_before_grace_end_stays_put() {
    let s = subject(SubjectState::Grace);
    assert_eq!(plan_transition(&s, t(70)), None);
  }

  #[test]
  fn grace_after_grace_end_escalates() {
    let s = subject(SubjectState::Grace);
    let plan = plan_transition(&s, t(76)).unwrap();
    assert_eq!(plan.from, SubjectState::Grace);
    assert_eq!(plan.to, SubjectState::Escalated);
    assert_eq!(plan.reason, REASON_GRACE_ELAPSED);
  }

  #[test]
  fn vacation_mode_suppresses_everything() {
    let mut s = subject(SubjectState::Active);
    s.vacation_mode = true;
    assert_eq!(plan_transition(&s, t(10_000)), None);

    s.state = SubjectState::Grace;
    assert_eq!(plan_transition(&s, t(10_000)), None);
  }

  #[test]
  fn escalated_is_steady_state() {
    let s = subject(SubjectState::Escalated);
    assert_eq!(plan_transition(&s, t(10_000)), None);
  }

  #[test]
  fn onboarding_without_checkin_never_transitions() {
    let mut s = subject(SubjectState::Onboarding);
    s.last_confirmed_at = None;
    assert_eq!(plan_transition(&s, t(10_000)), None);
  }
}
