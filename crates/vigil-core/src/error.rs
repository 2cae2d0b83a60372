//! Error taxonomy for `vigil-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("contact not found: {0}")]
  ContactNotFound(Uuid),

  /// Confirm/decline/unlink attempted by a caller whose verified identity
  /// does not match the invite. Security-relevant; logged distinctly.
  #[error("authenticated identity does not match invite")]
  IdentityMismatch,

  /// Owner-scoped operation attempted on somebody else's contact.
  #[error("contact {0} does not belong to the caller")]
  NotOwner(Uuid),

  /// The destination is already trusted by too many owners (anti-abuse cap).
  #[error(
    "destination is already used by {count} accounts (maximum {max}); \
     choose a different contact"
  )]
  DestinationCapacity { count: u32, max: u32 },

  /// A plain check-in cannot clear an active escalation; the subject must
  /// resolve the alert so contacts are told to stand down.
  #[error("an escalation is active; resolve the alert instead of checking in")]
  EscalationActive,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
