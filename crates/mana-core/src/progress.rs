//! # Progress Summaries
//!
//! Read-side views over progression state: per-participant summaries, the
//! cohort aggregate, dashboard navigation and submission counts. Nothing
//! here logs or mutates.

use crate::access::WorkshopAccessManager;
use crate::records::Participant;
use crate::repository::Store;
use crate::{ManaError, ResponseStatus, WorkshopId, WorkshopType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One participant's position in the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub completed_count: usize,
    pub total_workshops: usize,
    /// Current stage, the first stage when unset.
    pub current_workshop: WorkshopType,
    pub next_workshop: Option<WorkshopType>,
    /// Percentage rounded to one decimal place.
    pub completion_percentage: f64,
}

/// Per-stage counts of the cohort aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopProgress {
    pub workshop_type: WorkshopType,
    /// Participants with the stage in their completed set.
    pub completed: usize,
    /// Participants whose current position is the stage.
    pub in_progress: usize,
}

/// Cohort-wide aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentProgress {
    pub total_participants: usize,
    /// In sequence order.
    pub by_workshop: Vec<WorkshopProgress>,
    /// Participants who completed every stage of the sequence.
    pub fully_completed: usize,
}

/// One dashboard navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub workshop: WorkshopId,
    pub workshop_type: WorkshopType,
    pub title: String,
    pub accessible: bool,
    pub completed: bool,
    pub is_current: bool,
}

/// How much of the cohort has submitted one workshop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStats {
    pub total_participants: usize,
    /// Distinct participants with at least one submitted answer.
    pub submitted_participants: usize,
}

/// `completed / total * 100`, rounded half up to one decimal.
#[allow(clippy::float_arithmetic)]
fn completion_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let tenths = (completed * 1000 + total / 2) / total;
    tenths as f64 / 10.0
}

impl WorkshopAccessManager {
    /// Summary of one participant. Pure.
    #[must_use]
    pub fn get_progress_summary(&self, participant: &Participant) -> ProgressSummary {
        let sequence = self.sequence();
        let completed_count = participant.completed_workshops.len();
        let total_workshops = sequence.len();

        ProgressSummary {
            completed_count,
            total_workshops,
            current_workshop: participant
                .current_workshop
                .unwrap_or_else(|| sequence.first()),
            next_workshop: participant
                .current_workshop
                .and_then(|current| sequence.next_after(current)),
            completion_percentage: completion_percentage(completed_count, total_workshops),
        }
    }

    /// Aggregate over every participant of the assessment.
    pub fn get_assessment_progress_summary<S: Store + ?Sized>(
        &self,
        store: &S,
    ) -> Result<AssessmentProgress, ManaError> {
        let participants = store.participants_in(self.assessment())?;
        let sequence = self.sequence();

        let by_workshop = sequence
            .iter()
            .map(|workshop_type| WorkshopProgress {
                workshop_type,
                completed: participants
                    .iter()
                    .filter(|p| p.has_completed(workshop_type))
                    .count(),
                in_progress: participants
                    .iter()
                    .filter(|p| p.current_workshop == Some(workshop_type))
                    .count(),
            })
            .collect();

        let fully_completed = participants
            .iter()
            .filter(|p| sequence.iter().all(|w| p.has_completed(w)))
            .count();

        Ok(AssessmentProgress {
            total_participants: participants.len(),
            by_workshop,
            fully_completed,
        })
    }

    /// Navigation entries for the stages that have a catalog row.
    pub fn workshop_navigation<S: Store + ?Sized>(
        &self,
        store: &S,
        participant: &Participant,
    ) -> Result<Vec<NavItem>, ManaError> {
        let allowed = self.get_allowed_workshops(participant);
        let current = participant
            .current_workshop
            .unwrap_or_else(|| self.sequence().first());

        let mut items = Vec::new();
        for workshop_type in self.sequence().iter() {
            let Some(activity) = store.find_activity(participant.assessment, workshop_type)? else {
                continue;
            };
            items.push(NavItem {
                workshop: activity.id,
                workshop_type,
                title: activity.title,
                accessible: allowed.contains(&workshop_type),
                completed: participant.has_completed(workshop_type),
                is_current: workshop_type == current,
            });
        }
        Ok(items)
    }

    /// Whether the participant's current position is strictly after
    /// `workshop_type`, i.e. the cohort moved on after they submitted it.
    ///
    /// An unset or unknown position counts as the first stage.
    #[must_use]
    pub fn is_advanced_past(&self, participant: &Participant, workshop_type: WorkshopType) -> bool {
        let sequence = self.sequence();
        let Some(index) = sequence.position(workshop_type) else {
            return false;
        };
        let current = participant
            .current_workshop
            .and_then(|w| sequence.position(w))
            .unwrap_or(0);
        current > index
    }

    /// Submission counts for one workshop of the assessment.
    ///
    /// # Errors
    ///
    /// `NotFound` if the assessment has no catalog row for the workshop.
    pub fn submission_stats<S: Store + ?Sized>(
        &self,
        store: &S,
        workshop_type: WorkshopType,
    ) -> Result<SubmissionStats, ManaError> {
        let activity = store
            .find_activity(self.assessment(), workshop_type)?
            .ok_or_else(|| ManaError::not_found("workshop", workshop_type))?;

        let submitted: BTreeSet<_> = store
            .responses_for_activity(activity.id)?
            .into_iter()
            .filter(|r| r.status == ResponseStatus::Submitted)
            .map(|r| r.participant)
            .collect();

        Ok(SubmissionStats {
            total_participants: store.participants_in(self.assessment())?.len(),
            submitted_participants: submitted.len(),
        })
    }
}
