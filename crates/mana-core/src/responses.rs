//! # Participant Response Workflow
//!
//! Viewing a workshop, saving drafts and submitting answers, plus the
//! facilitator's read side over stored answers.
//!
//! Gates, in order:
//! 1. The workshop must have a catalog row (`NotFound`)
//! 2. It must be accessible to the participant (`WorkshopLocked`)
//! 3. It must not be submitted already (`AlreadySubmitted`)
//!
//! A submit upserts the answers, records completion and appends the audit
//! entries in one batch.

use crate::access::WorkshopAccessManager;
use crate::primitives::{MAX_ANSWER_LENGTH, MAX_ANSWERS_PER_SAVE, MAX_QUESTION_ID_LENGTH};
use crate::records::{
    NewAccessLog, Participant, ResponseKey, ResponseWrite, WorkshopActivity, WorkshopResponse,
};
use crate::repository::{ChangeBatch, Store};
use crate::{
    AccessAction, JsonPayload, ManaError, ResponseStatus, StakeholderType, WorkshopType,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What a save does with the answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    /// Keep working; answers stay editable.
    Draft,
    /// Final answers; the workshop becomes read-only and is marked complete.
    Submit,
}

/// Result of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub status: ResponseStatus,
    /// Number of answers written.
    pub saved: usize,
    /// Whether this save newly completed the workshop.
    pub completed: bool,
}

/// Participant attributes used to narrow facilitator reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFilter {
    pub province: Option<String>,
    pub stakeholder_type: Option<StakeholderType>,
}

impl ResponseFilter {
    #[must_use]
    pub fn matches(&self, participant: &Participant) -> bool {
        let province_ok = self
            .province
            .as_deref()
            .is_none_or(|wanted| participant.province.as_deref() == Some(wanted));
        let stakeholder_ok = self
            .stakeholder_type
            .is_none_or(|wanted| participant.stakeholder_type == wanted);
        province_ok && stakeholder_ok
    }
}

/// Response operations for one assessment.
#[derive(Debug, Clone, Copy)]
pub struct ResponseService<'a> {
    manager: &'a WorkshopAccessManager,
}

impl<'a> ResponseService<'a> {
    #[must_use]
    pub fn new(manager: &'a WorkshopAccessManager) -> Self {
        Self { manager }
    }

    fn activity<S: Store + ?Sized>(
        &self,
        store: &S,
        workshop_type: WorkshopType,
    ) -> Result<WorkshopActivity, ManaError> {
        store
            .find_activity(self.manager.assessment(), workshop_type)?
            .ok_or_else(|| ManaError::not_found("workshop", workshop_type))
    }

    fn accessible_activity<S: Store + ?Sized>(
        &self,
        store: &S,
        participant: &Participant,
        workshop_type: WorkshopType,
    ) -> Result<WorkshopActivity, ManaError> {
        let activity = self.activity(store, workshop_type)?;
        if !self.manager.is_workshop_accessible(participant, workshop_type) {
            return Err(ManaError::WorkshopLocked(workshop_type));
        }
        Ok(activity)
    }

    /// Record that the participant opened a workshop.
    pub fn record_view<S: Store + ?Sized>(
        &self,
        store: &mut S,
        participant: &Participant,
        workshop_type: WorkshopType,
    ) -> Result<(), ManaError> {
        let activity = self.accessible_activity(&*store, participant, workshop_type)?;

        let mut batch = ChangeBatch::new();
        batch.append_log(NewAccessLog {
            participant: participant.id,
            workshop: Some(activity.id),
            workshop_type,
            action: AccessAction::View,
            metadata: JsonPayload::from_value(&json!({ "at": Utc::now().to_rfc3339() })),
        });
        store.commit(batch)
    }

    /// Save answers as a draft or submit them.
    ///
    /// A submit needs at least one answer (`InvalidInput` otherwise); an
    /// empty draft is accepted.
    pub fn save<S: Store + ?Sized>(
        &self,
        store: &mut S,
        participant: &mut Participant,
        workshop_type: WorkshopType,
        answers: &BTreeMap<String, Value>,
        action: SaveAction,
    ) -> Result<SaveOutcome, ManaError> {
        let activity = self.accessible_activity(&*store, participant, workshop_type)?;
        validate_answers(answers)?;
        if action == SaveAction::Submit && answers.is_empty() {
            return Err(ManaError::InvalidInput(
                "cannot submit a workshop without answers".to_string(),
            ));
        }

        let already_submitted = store
            .responses_of(participant.id, activity.id)?
            .iter()
            .any(|r| r.status != ResponseStatus::Draft);
        if already_submitted {
            return Err(ManaError::AlreadySubmitted(workshop_type));
        }

        let now = Utc::now();
        let status = match action {
            SaveAction::Draft => ResponseStatus::Draft,
            SaveAction::Submit => ResponseStatus::Submitted,
        };

        let mut batch = ChangeBatch::new();
        for (question_id, value) in answers {
            batch.upsert_response(ResponseWrite {
                key: ResponseKey {
                    participant: participant.id,
                    workshop: activity.id,
                    question_id: question_id.clone(),
                },
                response_data: JsonPayload::from_value(value),
                status,
                submitted_at: (action == SaveAction::Submit).then_some(now),
            });
        }

        let mut completed = None;
        match action {
            SaveAction::Submit => {
                let stamp = JsonPayload::from_value(&json!({ "submitted_at": now.to_rfc3339() }));
                completed = self.manager.stage_completion(
                    &*store,
                    participant,
                    workshop_type,
                    Some(stamp.clone()),
                    &mut batch,
                )?;
                batch.append_log(NewAccessLog {
                    participant: participant.id,
                    workshop: Some(activity.id),
                    workshop_type,
                    action: AccessAction::Submit,
                    metadata: stamp,
                });
            }
            SaveAction::Draft => {
                batch.append_log(NewAccessLog {
                    participant: participant.id,
                    workshop: Some(activity.id),
                    workshop_type,
                    action: AccessAction::Update,
                    metadata: JsonPayload::from_value(&json!({
                        "saved_at": now.to_rfc3339(),
                        "status": status.as_str(),
                    })),
                });
            }
        }
        store.commit(batch)?;

        debug!(
            participant = %participant.id,
            workshop = %workshop_type,
            status = status.as_str(),
            answers = answers.len(),
            "responses saved"
        );

        let outcome = SaveOutcome {
            status,
            saved: answers.len(),
            completed: completed.is_some(),
        };
        if let Some(updated) = completed {
            *participant = updated;
        }
        Ok(outcome)
    }

    /// The participant's answers for one workshop, ordered by question id.
    pub fn responses_for<S: Store + ?Sized>(
        &self,
        store: &S,
        participant: &Participant,
        workshop_type: WorkshopType,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        let activity = self.activity(store, workshop_type)?;
        store.responses_of(participant.id, activity.id)
    }

    /// Every participant's answers for one workshop, narrowed by `filter`,
    /// ordered by question id.
    pub fn responses_for_workshop<S: Store + ?Sized>(
        &self,
        store: &S,
        workshop_type: WorkshopType,
        filter: &ResponseFilter,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        let activity = self.activity(store, workshop_type)?;
        let included: BTreeSet<_> = store
            .participants_in(self.manager.assessment())?
            .into_iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.id)
            .collect();

        let mut rows: Vec<WorkshopResponse> = store
            .responses_for_activity(activity.id)?
            .into_iter()
            .filter(|r| included.contains(&r.participant))
            .collect();
        rows.sort_by(|a, b| {
            a.question_id
                .cmp(&b.question_id)
                .then(a.participant.cmp(&b.participant))
        });
        Ok(rows)
    }
}

fn validate_answers(answers: &BTreeMap<String, Value>) -> Result<(), ManaError> {
    if answers.len() > MAX_ANSWERS_PER_SAVE {
        return Err(ManaError::InvalidInput(format!(
            "too many answers: {} (max {})",
            answers.len(),
            MAX_ANSWERS_PER_SAVE
        )));
    }
    for (question_id, value) in answers {
        if question_id.trim().is_empty() {
            return Err(ManaError::InvalidInput("empty question id".to_string()));
        }
        if question_id.len() > MAX_QUESTION_ID_LENGTH {
            return Err(ManaError::InvalidInput(format!(
                "question id exceeds {} bytes",
                MAX_QUESTION_ID_LENGTH
            )));
        }
        if value.to_string().len() > MAX_ANSWER_LENGTH {
            return Err(ManaError::InvalidInput(format!(
                "answer to {} exceeds {} bytes",
                question_id, MAX_ANSWER_LENGTH
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_on_every_given_field() {
        let mut p = crate::records::NewParticipant {
            assessment: crate::AssessmentId(1),
            username: "p@example.org".to_string(),
            full_name: "P".to_string(),
            stakeholder_type: StakeholderType::Farmer,
            organization: String::new(),
            province: Some("Sulu".to_string()),
            created_by: crate::Actor::new("f"),
            initial_stage: WorkshopType::Workshop1,
        }
        .into_participant(crate::ParticipantId(1), Utc::now());

        assert!(ResponseFilter::default().matches(&p));
        let filter = ResponseFilter {
            province: Some("Sulu".to_string()),
            stakeholder_type: Some(StakeholderType::Farmer),
        };
        assert!(filter.matches(&p));

        p.province = None;
        assert!(!filter.matches(&p));
    }

    #[test]
    fn answers_are_bounded() {
        let mut answers = BTreeMap::new();
        answers.insert(String::new(), json!("x"));
        assert!(matches!(
            validate_answers(&answers),
            Err(ManaError::InvalidInput(_))
        ));

        let mut answers = BTreeMap::new();
        answers.insert("q".repeat(MAX_QUESTION_ID_LENGTH + 1), json!("x"));
        assert!(validate_answers(&answers).is_err());

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), json!("x".repeat(MAX_ANSWER_LENGTH)));
        assert!(validate_answers(&answers).is_err());

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), json!({"text": "ok"}));
        assert!(validate_answers(&answers).is_ok());
    }
}
