//! Static message templates, keyed by event type.
//!
//! Content selection is a pure function of `(event_type, actor)` so tests can
//! assert on exact output. Each template carries the per-channel renderings a
//! dispatch needs: push title/body, email subject/HTML, and an SMS line.

use serde::Serialize;

use crate::event::EventType;

/// The acting subject as shown to recipients.
#[derive(Debug, Clone)]
pub struct Actor<'a> {
  pub name:  &'a str,
  pub email: &'a str,
}

/// Fully rendered message content for one event type.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
  pub title:         String,
  pub body:          String,
  pub email_subject: String,
  pub email_html:    String,
  pub sms_body:      String,
}

/// Render the message for `event_type` on behalf of `actor`.
pub fn render(event_type: EventType, actor: &Actor<'_>) -> Message {
  let who = actor.name;
  match event_type {
    EventType::EscalationAlert => Message {
      title:         "🚨 Emergency Alert".into(),
      body:          format!("{who} needs help! They missed their check-in."),
      email_subject: "🚨 URGENT: Emergency Alert".into(),
      email_html:    format!(
        "<h1>Emergency Alert</h1>\
         <p><strong>{who}</strong> has missed a check-in or triggered a panic alert.</p>\
         <p>Please contact them immediately.</p>\
         <p>Status: <strong>ESCALATED</strong></p>"
      ),
      sms_body:      format!(
        "🚨 URGENT: {who} needs help! Missed check-in. Contact them immediately."
      ),
    },
    EventType::ResolutionAlert => Message {
      title:         "✅ User is Safe".into(),
      body:          format!(
        "{who} has marked themselves as safe. The emergency is resolved."
      ),
      email_subject: "✅ RESOLVED: User is Safe".into(),
      email_html:    format!(
        "<h1>Emergency Resolved</h1>\
         <p><strong>{who}</strong> has confirmed they are safe.</p>\
         <p>You can stand down.</p>\
         <p>Status: <strong>RESOLVED</strong></p>"
      ),
      sms_body:      format!(
        "✅ RESOLVED: {who} is safe. The emergency alert has been cancelled."
      ),
    },
    EventType::TestAlert => Message {
      title:         "🔔 Test Alert".into(),
      body:          format!("{who} sent a test of their emergency alert. No action needed."),
      email_subject: "🔔 Test Alert".into(),
      email_html:    format!(
        "<h1>Test Alert</h1>\
         <p><strong>{who}</strong> sent a test of their emergency alert.</p>\
         <p>No action is needed.</p>"
      ),
      sms_body:      format!("🔔 TEST: {who} sent a test alert. No action needed."),
    },
    EventType::ContactRequest => Message {
      title:         "👥 Contact Request".into(),
      body:          format!("{who} wants to add you as a trusted contact."),
      email_subject: "You have been invited to Vigil".into(),
      email_html:    format!(
        "<p><strong>{who}</strong> has invited you to be their trusted contact.</p>\
         <p>Open the app to accept or decline.</p>"
      ),
      sms_body:      format!("{who} invited you to be their trusted contact on Vigil."),
    },
    EventType::Acknowledgment => Message {
      title:         "🤝 Invite Accepted".into(),
      body:          format!("{who} accepted your trusted contact request."),
      email_subject: "Your Vigil invite was accepted".into(),
      email_html:    format!(
        "<p><strong>{who}</strong> accepted your trusted contact request.</p>"
      ),
      sms_body:      format!("{who} accepted your trusted contact request on Vigil."),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ACTOR: Actor<'static> = Actor {
    name:  "Ada Lovelace",
    email: "ada@example.com",
  };

  #[test]
  fn rendering_is_reproducible() {
    let a = render(EventType::EscalationAlert, &ACTOR);
    let b = render(EventType::EscalationAlert, &ACTOR);
    assert_eq!(a.body, b.body);
    assert_eq!(a.email_html, b.email_html);
  }

  #[test]
  fn escalation_names_the_actor() {
    let m = render(EventType::EscalationAlert, &ACTOR);
    assert!(m.body.contains("Ada Lovelace"));
    assert!(m.sms_body.contains("URGENT"));
  }

  #[test]
  fn resolution_tells_contacts_to_stand_down() {
    let m = render(EventType::ResolutionAlert, &ACTOR);
    assert!(m.email_html.contains("stand down"));
    assert!(m.title.contains("Safe"));
  }

  #[test]
  fn every_type_renders_nonempty_content() {
    for t in [
      EventType::EscalationAlert,
      EventType::ResolutionAlert,
      EventType::TestAlert,
      EventType::ContactRequest,
      EventType::Acknowledgment,
    ] {
      let m = render(t, &ACTOR);
      assert!(!m.title.is_empty());
      assert!(!m.body.is_empty());
      assert!(!m.sms_body.is_empty());
    }
  }
}
