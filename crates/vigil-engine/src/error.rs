//! Error type for `vigil-engine`.

use std::fmt;

use thiserror::Error;
use vigil_core::contact::ChannelKind;

/// Per-channel failure detail carried by [`Error::AllChannelsFailed`], so the
/// caller can tell *why* each rung of the ladder was unusable.
#[derive(Debug, Clone, Default)]
pub struct ChannelFailures {
  pub push:  Option<String>,
  pub email: Option<String>,
  pub sms:   Option<String>,
}

impl ChannelFailures {
  pub fn record(&mut self, channel: ChannelKind, detail: String) {
    match channel {
      ChannelKind::Push => self.push = Some(detail),
      ChannelKind::Email => self.email = Some(detail),
      ChannelKind::Sms => self.sms = Some(detail),
    }
  }
}

impl fmt::Display for ChannelFailures {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut wrote = false;
    for (label, detail) in [
      ("push", &self.push),
      ("email", &self.email),
      ("sms", &self.sms),
    ] {
      if let Some(detail) = detail {
        if wrote {
          write!(f, "; ")?;
        }
        write!(f, "{label}: {detail}")?;
        wrote = true;
      }
    }
    if !wrote {
      write!(f, "no usable channel")?;
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Domain rule violations (not found, identity mismatch, capacity, ...).
  #[error(transparent)]
  Domain(#[from] vigil_core::Error),

  /// Every rung of an invite's channel ladder failed; the contact's status
  /// was left untouched.
  #[error("invite could not be delivered on any channel ({0})")]
  AllChannelsFailed(ChannelFailures),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error from the store.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
