//! # Participant Onboarding
//!
//! First-login flow: the participant confirms their profile and gives
//! consent. The dashboard stays closed until both are done.

use crate::access::WorkshopAccessManager;
use crate::records::Participant;
use crate::repository::{ChangeBatch, Store};
use crate::{ManaError, StakeholderType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Profile fields collected during onboarding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub stakeholder_type: StakeholderType,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub province: Option<String>,
    /// Consent to take part in the assessment.
    #[serde(default)]
    pub consent: bool,
}

/// Apply the onboarding form.
///
/// Returns `false` without writing when the participant is already
/// onboarded. Otherwise the profile is stored, the profile is marked
/// complete, consent (and its date) is recorded the first time it is given,
/// and an unset current position becomes the first stage.
pub fn complete_onboarding<S: Store + ?Sized>(
    store: &mut S,
    manager: &WorkshopAccessManager,
    participant: &mut Participant,
    update: ProfileUpdate,
) -> Result<bool, ManaError> {
    if participant.can_access_dashboard() {
        return Ok(false);
    }

    let mut updated = participant.clone();
    updated.stakeholder_type = update.stakeholder_type;
    updated.organization = update.organization;
    updated.province = update.province;
    updated.profile_completed = true;
    if update.consent && !updated.consent_given {
        updated.consent_given = true;
        updated.consent_date = Some(Utc::now());
    }
    if updated.current_workshop.is_none() {
        updated.current_workshop = Some(manager.sequence().first());
    }

    let mut batch = ChangeBatch::new();
    batch.save_participant(updated.clone());
    store.commit(batch)?;

    info!(
        participant = %updated.id,
        consent = updated.consent_given,
        "onboarding completed"
    );
    *participant = updated;
    Ok(true)
}
