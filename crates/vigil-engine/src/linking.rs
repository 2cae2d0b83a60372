//! The contact linking protocol: invite → pending → confirmed, plus the
//! owner-scoped contact CRUD around it.
//!
//! Ownership rules: mutations on a contact row require the caller to be its
//! owner. Confirm/decline/unlink instead require the caller's *verified
//! identity* (email, phone, or existing link) to match the invite — a
//! mismatch is a security rejection, distinct from not-found.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_core::{
  contact::{
    Contact, ContactStatus, ContactUpdate, NewContact, Recipient,
    ContactRecipient, TrustedLinks,
  },
  event::{DeliveryReport, DeliveryStatus, EventType},
  store::VigilStore,
  subject::CallerIdentity,
};

use crate::{
  dispatch::SKIP_COOLDOWN, DispatchTarget, Engine, Error, Result,
};

impl<S: VigilStore + Clone> Engine<S> {
  /// Add a contact for `owner`, enforcing the per-destination owner cap.
  pub async fn add_contact(
    &self,
    owner: Uuid,
    input: NewContact,
  ) -> Result<Contact> {
    let count = self
      .store()
      .count_destination_owners(&input.destination)
      .await
      .map_err(Error::store)?;
    let max = self.config().max_owners_per_destination;
    if count >= max {
      return Err(
        vigil_core::Error::DestinationCapacity { count, max }.into(),
      );
    }

    let input = NewContact {
      owner_id: owner,
      ..input
    };
    self.store().add_contact(input).await.map_err(Error::store)
  }

  pub async fn list_contacts(&self, owner: Uuid) -> Result<Vec<Contact>> {
    self.store().list_contacts(owner).await.map_err(Error::store)
  }

  /// Owner-scoped partial update. Changing the destination of a CONFIRMED
  /// contact drops the confirmation and link: the new destination's owner
  /// must prove themselves through a fresh invite cycle.
  pub async fn update_contact(
    &self,
    caller: Uuid,
    contact_id: Uuid,
    update: ContactUpdate,
  ) -> Result<Contact> {
    let contact = self.owned_contact(caller, contact_id).await?;

    let destination_changed = update
      .destination
      .as_deref()
      .is_some_and(|d| d != contact.destination);
    let reset_link =
      destination_changed && contact.status == ContactStatus::Confirmed;

    self
      .store()
      .update_contact(contact_id, update, reset_link)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| vigil_core::Error::ContactNotFound(contact_id).into())
  }

  pub async fn delete_contact(
    &self,
    caller: Uuid,
    contact_id: Uuid,
  ) -> Result<()> {
    self.owned_contact(caller, contact_id).await?;
    self
      .store()
      .delete_contact(contact_id)
      .await
      .map_err(Error::store)?;
    Ok(())
  }

  /// Deliver a CONTACT_REQUEST to the contact's destination. Any successful
  /// rung marks the contact PENDING with `invite_sent_at` stamped; if every
  /// usable channel fails, the status is left untouched and the per-channel
  /// failures are surfaced.
  pub async fn invite(
    &self,
    caller: Uuid,
    contact_id: Uuid,
  ) -> Result<(Contact, DeliveryReport)> {
    let contact = self.owned_contact(caller, contact_id).await?;
    let owner = self.subject(caller).await?;

    // A re-invite of a still-linked contact can reach the linked account's
    // device directly; first invites have no link yet.
    let linked_push_token = match contact.linked_subject_id {
      Some(linked) => self
        .store()
        .get_subject(linked)
        .await
        .map_err(Error::store)?
        .and_then(|s| s.push_token),
      None => None,
    };
    let recipient = Recipient::Contact(ContactRecipient {
      contact: contact.clone(),
      linked_push_token,
    });
    let meta = serde_json::json!({
      "actor_name": owner.display_label(),
      "actor_email": owner.email,
      "contact_id": contact.contact_id,
    });
    let dispatched = self
      .dispatch_to(&owner, EventType::ContactRequest, vec![recipient], meta)
      .await?;

    let outcome = dispatched
      .report
      .outcomes
      .first()
      .ok_or(vigil_core::Error::ContactNotFound(contact_id))?;

    let delivered = match outcome.status {
      DeliveryStatus::Sent => true,
      // A cooldown skip means an invite reached this destination moments
      // ago; the invite itself still stands.
      DeliveryStatus::Skipped => {
        outcome.error.as_deref() == Some(SKIP_COOLDOWN)
      }
      DeliveryStatus::Failed => false,
    };
    if !delivered {
      let failures = dispatched
        .failures
        .into_iter()
        .next()
        .unwrap_or_default();
      warn!(
        %contact_id,
        %failures,
        "invite undeliverable on every channel"
      );
      return Err(Error::AllChannelsFailed(failures));
    }

    let contact = self
      .store()
      .mark_invited(contact_id, Utc::now())
      .await
      .map_err(Error::store)?
      .ok_or(vigil_core::Error::ContactNotFound(contact_id))?;

    info!(%contact_id, "invite sent");
    Ok((contact, dispatched.report))
  }

  /// Accept an invite as the invited party. The caller must hold the
  /// invite's destination (email case-insensitive, phone exact) or already
  /// be the linked subject. Idempotent when already confirmed by the same
  /// caller; the first confirmation sends the owner a directed
  /// acknowledgment.
  pub async fn confirm(
    &self,
    caller: &CallerIdentity,
    contact_id: Uuid,
  ) -> Result<Contact> {
    let contact = self.invited_contact(caller, contact_id).await?;

    if contact.status == ContactStatus::Confirmed
      && contact.linked_subject_id == Some(caller.subject_id)
    {
      return Ok(contact);
    }

    let contact = self
      .store()
      .confirm_contact(contact_id, caller.subject_id)
      .await
      .map_err(Error::store)?
      .ok_or(vigil_core::Error::ContactNotFound(contact_id))?;

    info!(
      %contact_id,
      owner = %contact.owner_id,
      linked = %caller.subject_id,
      "contact confirmed"
    );

    // Tell the owner their invite was accepted. Failure here must not undo
    // the confirmation.
    if let Err(err) = self
      .dispatch(
        caller.subject_id,
        EventType::Acknowledgment,
        DispatchTarget::Directed(contact.owner_id),
      )
      .await
    {
      warn!(%contact_id, %err, "acceptance notification failed");
    }

    Ok(contact)
  }

  /// Decline a pending invite, or dissolve an existing link. Either way the
  /// row is deleted; the audit trail of past deliveries survives it.
  pub async fn decline(
    &self,
    caller: &CallerIdentity,
    contact_id: Uuid,
  ) -> Result<()> {
    let contact = self.invited_contact(caller, contact_id).await?;
    self
      .store()
      .delete_contact(contact.contact_id)
      .await
      .map_err(Error::store)?;
    info!(%contact_id, "contact link dissolved");
    Ok(())
  }

  /// Everything the caller is linked into: pending invites addressed to
  /// their verified destinations, and confirmed links where they are the
  /// protecting party.
  pub async fn trusted_links(
    &self,
    caller: &CallerIdentity,
  ) -> Result<TrustedLinks> {
    let mut destinations = vec![caller.email.clone()];
    if let Some(phone) = &caller.phone {
      destinations.push(phone.clone());
    }

    let pending = self
      .store()
      .pending_invites_for(destinations)
      .await
      .map_err(Error::store)?;
    let active = self
      .store()
      .links_for_subject(caller.subject_id)
      .await
      .map_err(Error::store)?;

    Ok(TrustedLinks { pending, active })
  }

  /// Fetch a contact and require the caller to own it.
  async fn owned_contact(
    &self,
    caller: Uuid,
    contact_id: Uuid,
  ) -> Result<Contact> {
    let contact = self
      .store()
      .get_contact(contact_id)
      .await
      .map_err(Error::store)?
      .ok_or(vigil_core::Error::ContactNotFound(contact_id))?;
    if contact.owner_id != caller {
      return Err(vigil_core::Error::NotOwner(contact_id).into());
    }
    Ok(contact)
  }

  /// Fetch a contact and require the caller's identity to match the invite.
  async fn invited_contact(
    &self,
    caller: &CallerIdentity,
    contact_id: Uuid,
  ) -> Result<Contact> {
    let contact = self
      .store()
      .get_contact(contact_id)
      .await
      .map_err(Error::store)?
      .ok_or(vigil_core::Error::ContactNotFound(contact_id))?;

    let matches = caller.email.eq_ignore_ascii_case(&contact.destination)
      || caller.phone.as_deref() == Some(contact.destination.as_str())
      || contact.linked_subject_id == Some(caller.subject_id);
    if !matches {
      warn!(
        %contact_id,
        caller = %caller.subject_id,
        "identity mismatch on contact confirmation"
      );
      return Err(vigil_core::Error::IdentityMismatch.into());
    }
    Ok(contact)
  }
}
