//! # Workshop Access Manager
//!
//! The single source of truth for which workshops a participant may open,
//! and the only mutator of progression state.
//!
//! Access is cohort-paced. A participant's allowed stages are the prefix of
//! the sequence up to their `facilitator_advanced_to` ceiling, regardless of
//! what they have completed. Finishing a stage never unlocks the next one;
//! only a facilitator advance (or a manual override) does.
//!
//! ## Unknown Stages
//!
//! A ceiling that is unset or not part of the sequence falls back to the
//! first stage. Advancing to a stage outside the sequence touches nobody and
//! reports zero. Neither case is an error.
//!
//! ## Atomicity
//!
//! Every mutation is one [`ChangeBatch`]: participant rows and their audit
//! entries land together or not at all.

use crate::primitives::{
    REASON_FACILITATOR_ADVANCE, REASON_MANUAL_UNLOCK, REASON_PROGRESS_RESET,
    REASON_SCHEDULED_UNLOCK,
};
use crate::records::{NewAccessLog, NewNotification, Participant};
use crate::repository::{ChangeBatch, Store};
use crate::sequence::WorkshopSequence;
use crate::{AccessAction, Actor, AssessmentId, JsonPayload, ManaError, WorkshopType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Outcome of a cohort-wide advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceReport {
    /// Participants whose ceiling was set (the whole cohort).
    pub advanced: usize,
    /// Participants whose current position actually changed.
    pub moved: usize,
}

/// Progression rules for one assessment.
///
/// The manager holds no participant state. Every operation reads from and
/// writes to the store it is handed.
#[derive(Debug, Clone)]
pub struct WorkshopAccessManager {
    assessment: AssessmentId,
    sequence: WorkshopSequence,
}

impl WorkshopAccessManager {
    #[must_use]
    pub fn new(assessment: AssessmentId, sequence: WorkshopSequence) -> Self {
        Self {
            assessment,
            sequence,
        }
    }

    #[must_use]
    pub fn assessment(&self) -> AssessmentId {
        self.assessment
    }

    #[must_use]
    pub fn sequence(&self) -> &WorkshopSequence {
        &self.sequence
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    /// Stages the participant may open, in sequence order.
    ///
    /// A pure function of the ceiling; completion state plays no part.
    #[must_use]
    pub fn get_allowed_workshops(&self, participant: &Participant) -> Vec<WorkshopType> {
        self.sequence
            .prefix_through(participant.facilitator_advanced_to)
    }

    #[must_use]
    pub fn is_workshop_accessible(
        &self,
        participant: &Participant,
        workshop_type: WorkshopType,
    ) -> bool {
        self.get_allowed_workshops(participant)
            .contains(&workshop_type)
    }

    // =========================================================================
    // COHORT OPERATIONS
    // =========================================================================

    /// Set every participant's ceiling to `workshop_type`.
    ///
    /// A participant's current position also moves when `workshop_type` is
    /// the first stage or the participant completed the stage before it.
    /// A participant standing past the new ceiling (a backward advance, or an
    /// earlier manual unlock) is pulled back to it. Everyone else keeps
    /// working on the stage they are on.
    ///
    /// Each participant gets one `unlock` entry tagged `bulk_advancement` and
    /// one `workshop_advanced` notification, committed with the rows.
    pub fn advance_cohort<S: Store + ?Sized>(
        &self,
        store: &mut S,
        workshop_type: WorkshopType,
        actor: &Actor,
    ) -> Result<AdvanceReport, ManaError> {
        let Some(target) = self.sequence.position(workshop_type) else {
            debug!(
                assessment = %self.assessment,
                workshop = %workshop_type,
                "advance target not in sequence; nothing to do"
            );
            return Ok(AdvanceReport::default());
        };
        let previous = self.sequence.previous_of(workshop_type);
        let activity = store.find_activity(self.assessment, workshop_type)?;
        let workshop = activity.as_ref().map(|a| a.id);
        let name = activity
            .map(|a| a.title)
            .unwrap_or_else(|| workshop_type.title().to_string());
        let metadata = JsonPayload::from_value(&json!({
            "unlocked_by": actor.as_str(),
            "reason": REASON_FACILITATOR_ADVANCE,
            "bulk_advancement": true,
        }));

        let mut batch = ChangeBatch::new();
        let mut moved = 0;
        for mut participant in store.participants_in(self.assessment)? {
            participant.facilitator_advanced_to = Some(workshop_type);

            let past_ceiling = participant
                .current_workshop
                .and_then(|w| self.sequence.position(w))
                .is_some_and(|pos| pos > target);
            let may_move =
                past_ceiling || previous.is_none_or(|prev| participant.has_completed(prev));
            let mut moved_here = false;
            if may_move && participant.current_workshop != Some(workshop_type) {
                participant.current_workshop = Some(workshop_type);
                moved_here = true;
                moved += 1;
            }
            debug!(
                participant = %participant.id,
                moved = moved_here,
                pulled_back = past_ceiling,
                "ceiling set"
            );

            batch.append_log(NewAccessLog {
                participant: participant.id,
                workshop,
                workshop_type,
                action: AccessAction::Unlock,
                metadata: metadata.clone(),
            });
            batch.push_notification(NewNotification::workshop_advanced(
                participant.id,
                workshop,
                workshop_type,
                &name,
            ));
            batch.save_participant(participant);
        }

        let report = AdvanceReport {
            advanced: batch.participants.len(),
            moved,
        };
        store.commit(batch)?;

        info!(
            assessment = %self.assessment,
            workshop = %workshop_type,
            actor = %actor,
            advanced = report.advanced,
            moved = report.moved,
            "cohort advanced"
        );
        Ok(report)
    }

    /// Cohort advance reporting the number of participants touched.
    ///
    /// The count is the whole cohort, including participants whose current
    /// position stayed put. See [`Self::advance_cohort`] for both numbers.
    pub fn advance_all_participants<S: Store + ?Sized>(
        &self,
        store: &mut S,
        workshop_type: WorkshopType,
        actor: &Actor,
    ) -> Result<usize, ManaError> {
        self.advance_cohort(store, workshop_type, actor)
            .map(|report| report.advanced)
    }

    /// Reconciliation pass: snap every current position to the last allowed
    /// stage.
    ///
    /// Returns the number of participants moved.
    pub fn auto_unlock_due_workshops<S: Store + ?Sized>(
        &self,
        store: &mut S,
    ) -> Result<usize, ManaError> {
        let now = Utc::now();
        let mut batch = ChangeBatch::new();

        for mut participant in store.participants_in(self.assessment)? {
            let target = self
                .get_allowed_workshops(&participant)
                .last()
                .copied()
                .unwrap_or_else(|| self.sequence.first());
            if participant.current_workshop == Some(target) {
                continue;
            }

            participant.current_workshop = Some(target);
            batch.append_log(NewAccessLog {
                participant: participant.id,
                workshop: store
                    .find_activity(participant.assessment, target)?
                    .map(|a| a.id),
                workshop_type: target,
                action: AccessAction::Unlock,
                metadata: JsonPayload::from_value(&json!({
                    "unlocked_by": Actor::system().as_str(),
                    "reason": REASON_SCHEDULED_UNLOCK,
                    "timestamp": now.to_rfc3339(),
                })),
            });
            batch.save_participant(participant);
        }

        let unlocked = batch.participants.len();
        store.commit(batch)?;

        info!(assessment = %self.assessment, unlocked, "scheduled unlock pass finished");
        Ok(unlocked)
    }

    // =========================================================================
    // PARTICIPANT OPERATIONS
    // =========================================================================

    /// Record that the participant finished `workshop_type`.
    ///
    /// Idempotent: returns `false` when it was already completed. The current
    /// position is left alone, so the participant waits for the facilitator.
    pub fn mark_workshop_complete<S: Store + ?Sized>(
        &self,
        store: &mut S,
        participant: &mut Participant,
        workshop_type: WorkshopType,
        metadata: Option<JsonPayload>,
    ) -> Result<bool, ManaError> {
        let mut batch = ChangeBatch::new();
        let Some(updated) =
            self.stage_completion(&*store, participant, workshop_type, metadata, &mut batch)?
        else {
            return Ok(false);
        };
        store.commit(batch)?;

        debug!(participant = %updated.id, workshop = %workshop_type, "workshop completed");
        *participant = updated;
        Ok(true)
    }

    /// Queue a completion into `batch`.
    ///
    /// Returns the updated participant, or `None` when the stage was already
    /// completed (nothing is queued).
    pub(crate) fn stage_completion<S: Store + ?Sized>(
        &self,
        store: &S,
        participant: &Participant,
        workshop_type: WorkshopType,
        metadata: Option<JsonPayload>,
        batch: &mut ChangeBatch,
    ) -> Result<Option<Participant>, ManaError> {
        let mut updated = participant.clone();
        if !updated.record_completion(workshop_type) {
            return Ok(None);
        }

        batch.append_log(NewAccessLog {
            participant: updated.id,
            workshop: store
                .find_activity(updated.assessment, workshop_type)?
                .map(|a| a.id),
            workshop_type,
            action: AccessAction::Complete,
            metadata: metadata.unwrap_or_default(),
        });
        batch.save_participant(updated.clone());
        Ok(Some(updated))
    }

    /// Move one participant straight to `workshop_type`.
    ///
    /// Returns `false` when the stage is already accessible. The ceiling is
    /// not consulted or changed, so this can place a participant beyond it.
    pub fn unlock_workshop<S: Store + ?Sized>(
        &self,
        store: &mut S,
        participant: &mut Participant,
        workshop_type: WorkshopType,
        actor: &Actor,
    ) -> Result<bool, ManaError> {
        if self.is_workshop_accessible(participant, workshop_type) {
            return Ok(false);
        }

        let mut updated = participant.clone();
        updated.current_workshop = Some(workshop_type);

        let mut batch = ChangeBatch::new();
        batch.append_log(NewAccessLog {
            participant: updated.id,
            workshop: store
                .find_activity(updated.assessment, workshop_type)?
                .map(|a| a.id),
            workshop_type,
            action: AccessAction::Unlock,
            metadata: JsonPayload::from_value(&json!({
                "unlocked_by": actor.as_str(),
                "reason": REASON_MANUAL_UNLOCK,
            })),
        });
        batch.save_participant(updated.clone());
        store.commit(batch)?;

        info!(
            participant = %updated.id,
            workshop = %workshop_type,
            actor = %actor,
            "manual unlock"
        );
        *participant = updated;
        Ok(true)
    }

    /// Clear completions and return the participant to the first stage.
    ///
    /// The ceiling is kept. Always returns `true`.
    pub fn reset_participant_progress<S: Store + ?Sized>(
        &self,
        store: &mut S,
        participant: &mut Participant,
        actor: &Actor,
    ) -> Result<bool, ManaError> {
        let first = self.sequence.first();
        let mut updated = participant.clone();
        updated.completed_workshops.clear();
        updated.current_workshop = Some(first);

        let mut batch = ChangeBatch::new();
        batch.append_log(NewAccessLog {
            participant: updated.id,
            workshop: store.find_activity(updated.assessment, first)?.map(|a| a.id),
            workshop_type: first,
            action: AccessAction::Unlock,
            metadata: JsonPayload::from_value(&json!({
                "reset_by": actor.as_str(),
                "reason": REASON_PROGRESS_RESET,
            })),
        });
        batch.save_participant(updated.clone());
        store.commit(batch)?;

        info!(participant = %updated.id, actor = %actor, "progress reset");
        *participant = updated;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NewActivity, NewParticipant};
    use crate::repository::{
        ActivityRepository, AssessmentRepository, LogRepository, NotificationRepository,
        ParticipantRepository,
    };
    use crate::storage::MemoryStore;
    use crate::StakeholderType;

    fn cohort(size: usize) -> (MemoryStore, WorkshopAccessManager, Vec<Participant>) {
        let mut store = MemoryStore::new();
        let assessment = store.create_assessment("Cohort").expect("assessment");
        let sequence = WorkshopSequence::default();
        for stage in sequence.iter() {
            store
                .insert_activity(NewActivity::canonical(assessment.id, stage))
                .expect("activity");
        }
        let participants = (0..size)
            .map(|i| {
                store
                    .insert_participant(NewParticipant {
                        assessment: assessment.id,
                        username: format!("p{i}@example.org"),
                        full_name: format!("P{i}"),
                        stakeholder_type: StakeholderType::Other,
                        organization: String::new(),
                        province: None,
                        created_by: Actor::new("facilitator"),
                        initial_stage: sequence.first(),
                    })
                    .expect("participant")
            })
            .collect();
        (
            store,
            WorkshopAccessManager::new(assessment.id, sequence),
            participants,
        )
    }

    #[test]
    fn allowed_is_prefix_of_ceiling() {
        let (_, manager, mut participants) = cohort(1);
        let p = &mut participants[0];
        p.facilitator_advanced_to = Some(WorkshopType::Workshop3);
        assert_eq!(
            manager.get_allowed_workshops(p),
            vec![
                WorkshopType::Workshop1,
                WorkshopType::Workshop2,
                WorkshopType::Workshop3
            ]
        );
        assert!(manager.is_workshop_accessible(p, WorkshopType::Workshop2));
        assert!(!manager.is_workshop_accessible(p, WorkshopType::Workshop4));

        p.facilitator_advanced_to = None;
        assert_eq!(manager.get_allowed_workshops(p), vec![WorkshopType::Workshop1]);
    }

    #[test]
    fn advance_outside_sequence_is_noop() {
        let (mut store, manager, participants) = cohort(2);
        let count = manager
            .advance_all_participants(&mut store, WorkshopType::Workshop6, &Actor::new("f"))
            .expect("advance");
        assert_eq!(count, 0);
        assert_eq!(store.log_count().expect("count"), 0);
        assert!(store.notifications_of(participants[0].id).expect("list").is_empty());
    }

    #[test]
    fn advance_notifies_every_participant() {
        let (mut store, manager, participants) = cohort(3);
        manager
            .advance_cohort(&mut store, WorkshopType::Workshop2, &Actor::new("f"))
            .expect("advance");

        for p in &participants {
            let notes = store.notifications_of(p.id).expect("list");
            assert_eq!(notes.len(), 1);
            assert_eq!(notes[0].workshop_type, WorkshopType::Workshop2);
            assert_eq!(
                notes[0].title,
                format!("New Workshop Available: {}", WorkshopType::Workshop2.title())
            );
            assert!(notes[0].workshop.is_some());
        }
    }

    #[test]
    fn backward_advance_pulls_current_to_ceiling() {
        let (mut store, manager, participants) = cohort(2);
        let actor = Actor::new("facilitator");
        manager
            .advance_cohort(&mut store, WorkshopType::Workshop3, &actor)
            .expect("advance");
        manager.auto_unlock_due_workshops(&mut store).expect("reconcile");

        let report = manager
            .advance_cohort(&mut store, WorkshopType::Workshop2, &actor)
            .expect("advance back");
        assert_eq!(report, AdvanceReport { advanced: 2, moved: 2 });
        for p in &participants {
            let stored = store.get_participant(p.id).expect("get").expect("exists");
            assert_eq!(stored.facilitator_advanced_to, Some(WorkshopType::Workshop2));
            assert_eq!(stored.current_workshop, Some(WorkshopType::Workshop2));
        }
    }

    #[test]
    fn complete_is_idempotent_and_does_not_move() {
        let (mut store, manager, mut participants) = cohort(1);
        let p = &mut participants[0];
        assert!(
            manager
                .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, None)
                .expect("complete")
        );
        assert!(
            !manager
                .mark_workshop_complete(&mut store, p, WorkshopType::Workshop1, None)
                .expect("complete")
        );
        assert_eq!(p.completed_workshops, vec![WorkshopType::Workshop1]);
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop1));
        assert_eq!(store.logs_of(p.id).expect("logs").len(), 1);
    }

    #[test]
    fn manual_unlock_bypasses_ceiling() {
        let (mut store, manager, mut participants) = cohort(1);
        let p = &mut participants[0];
        let actor = Actor::new("facilitator");

        assert!(
            !manager
                .unlock_workshop(&mut store, p, WorkshopType::Workshop1, &actor)
                .expect("unlock")
        );
        assert!(
            manager
                .unlock_workshop(&mut store, p, WorkshopType::Workshop4, &actor)
                .expect("unlock")
        );
        assert_eq!(p.current_workshop, Some(WorkshopType::Workshop4));
        assert_eq!(p.facilitator_advanced_to, Some(WorkshopType::Workshop1));

        let stored = store.get_participant(p.id).expect("get").expect("exists");
        assert_eq!(stored.current_workshop, Some(WorkshopType::Workshop4));
        let log = &store.logs_of(p.id).expect("logs")[0];
        assert_eq!(log.metadata.value()["reason"], "manual_unlock");
    }

    #[test]
    fn reconciliation_snaps_to_ceiling() {
        let (mut store, manager, participants) = cohort(2);
        let actor = Actor::new("facilitator");
        manager
            .advance_all_participants(&mut store, WorkshopType::Workshop2, &actor)
            .expect("advance");

        // Nobody completed workshop 1, so nobody moved.
        let moved = manager
            .auto_unlock_due_workshops(&mut store)
            .expect("reconcile");
        assert_eq!(moved, 2);
        for p in &participants {
            let stored = store.get_participant(p.id).expect("get").expect("exists");
            assert_eq!(stored.current_workshop, Some(WorkshopType::Workshop2));
        }

        assert_eq!(manager.auto_unlock_due_workshops(&mut store).expect("again"), 0);
    }
}
