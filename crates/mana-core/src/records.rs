//! # Persisted Records
//!
//! Row types for assessments, participant accounts, the workshop catalog,
//! stored answers, the access audit trail and dashboard notifications, plus
//! the `New*` shapes used to insert them. Identifiers and timestamps are
//! assigned by the store.

use crate::{
    AccessAction, ActivityStatus, Actor, AssessmentId, JsonPayload, LogId, NotificationId,
    NotificationKind, ParticipantId, ResponseId, ResponseStatus, StakeholderType, WorkshopId,
    WorkshopType,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock instant used for every persisted timestamp.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// ASSESSMENT
// =============================================================================

/// One assessment: a cohort of participants sharing a workshop catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub title: String,
    pub created_at: Timestamp,
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// Identity, demographics and progress of one person in one assessment.
///
/// Progress is carried by three fields:
/// - `facilitator_advanced_to`: the cohort-wide ceiling
/// - `current_workshop`: the individual position
/// - `completed_workshops`: an ordered set of finished stages
///
/// Accounts are never deleted; a reset clears the progress fields instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub assessment: AssessmentId,
    /// Login name (the participant's email).
    pub username: String,
    pub full_name: String,
    pub stakeholder_type: StakeholderType,
    pub organization: String,
    pub province: Option<String>,
    pub completed_workshops: Vec<WorkshopType>,
    pub current_workshop: Option<WorkshopType>,
    pub facilitator_advanced_to: Option<WorkshopType>,
    pub consent_given: bool,
    pub consent_date: Option<Timestamp>,
    pub profile_completed: bool,
    pub created_by: Actor,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Participant {
    /// Whether `workshop` is in the completed set.
    #[must_use]
    pub fn has_completed(&self, workshop: WorkshopType) -> bool {
        self.completed_workshops.contains(&workshop)
    }

    /// Append `workshop` to the completed set.
    ///
    /// Returns `false` if it was already present (the set is unchanged).
    pub fn record_completion(&mut self, workshop: WorkshopType) -> bool {
        if self.has_completed(workshop) {
            return false;
        }
        self.completed_workshops.push(workshop);
        true
    }

    /// Onboarding gate for the participant dashboard.
    #[must_use]
    pub fn can_access_dashboard(&self) -> bool {
        self.consent_given && self.profile_completed
    }
}

/// Fields supplied when a facilitator registers a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub assessment: AssessmentId,
    pub username: String,
    pub full_name: String,
    pub stakeholder_type: StakeholderType,
    pub organization: String,
    pub province: Option<String>,
    pub created_by: Actor,
    /// Opening stage: becomes both the current position and the ceiling.
    pub initial_stage: WorkshopType,
}

impl NewParticipant {
    /// The stored account: opening stage as position and ceiling, nothing
    /// completed, onboarding pending.
    #[must_use]
    pub fn into_participant(self, id: ParticipantId, now: Timestamp) -> Participant {
        Participant {
            id,
            assessment: self.assessment,
            username: self.username,
            full_name: self.full_name,
            stakeholder_type: self.stakeholder_type,
            organization: self.organization,
            province: self.province,
            completed_workshops: Vec::new(),
            current_workshop: Some(self.initial_stage),
            facilitator_advanced_to: Some(self.initial_stage),
            consent_given: false,
            consent_date: None,
            profile_completed: false,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// WORKSHOP CATALOG
// =============================================================================

/// One catalog row: a workshop stage scheduled within an assessment.
///
/// Read-only to the access engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopActivity {
    pub id: WorkshopId,
    pub assessment: AssessmentId,
    pub workshop_type: WorkshopType,
    pub title: String,
    pub description: String,
    pub scheduled_date: Option<NaiveDate>,
    pub status: ActivityStatus,
    pub created_at: Timestamp,
}

/// Fields for a new catalog row. `(assessment, workshop_type)` must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub assessment: AssessmentId,
    pub workshop_type: WorkshopType,
    pub title: String,
    pub description: String,
    pub scheduled_date: Option<NaiveDate>,
}

impl NewActivity {
    /// A catalog row with the canonical title for `workshop_type`.
    #[must_use]
    pub fn canonical(assessment: AssessmentId, workshop_type: WorkshopType) -> Self {
        Self {
            assessment,
            workshop_type,
            title: workshop_type.title().to_string(),
            description: String::new(),
            scheduled_date: None,
        }
    }

    #[must_use]
    pub fn into_activity(self, id: WorkshopId, now: Timestamp) -> WorkshopActivity {
        WorkshopActivity {
            id,
            assessment: self.assessment,
            workshop_type: self.workshop_type,
            title: self.title,
            description: self.description,
            scheduled_date: self.scheduled_date,
            status: ActivityStatus::Planned,
            created_at: now,
        }
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Unique identity of one answer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub participant: ParticipantId,
    pub workshop: WorkshopId,
    pub question_id: String,
}

/// One answer to one question by one participant for one workshop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopResponse {
    pub id: ResponseId,
    pub participant: ParticipantId,
    pub workshop: WorkshopId,
    pub question_id: String,
    pub response_data: JsonPayload,
    pub status: ResponseStatus,
    /// Set on first submission and never cleared.
    pub submitted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkshopResponse {
    #[must_use]
    pub fn key(&self) -> ResponseKey {
        ResponseKey {
            participant: self.participant,
            workshop: self.workshop,
            question_id: self.question_id.clone(),
        }
    }
}

/// Insert-or-update of one answer, keyed by [`ResponseKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWrite {
    pub key: ResponseKey,
    pub response_data: JsonPayload,
    pub status: ResponseStatus,
    /// Used only when the stored row has no submission time yet.
    pub submitted_at: Option<Timestamp>,
}

impl ResponseWrite {
    /// Apply this write to an existing row (or create the row).
    ///
    /// Identity and `created_at` of an existing row are kept and an earlier
    /// `submitted_at` wins.
    #[must_use]
    pub fn apply(self, existing: Option<WorkshopResponse>, id: ResponseId, now: Timestamp) -> WorkshopResponse {
        match existing {
            Some(mut row) => {
                row.response_data = self.response_data;
                row.status = self.status;
                row.submitted_at = row.submitted_at.or(self.submitted_at);
                row.updated_at = now;
                row
            }
            None => WorkshopResponse {
                id,
                participant: self.key.participant,
                workshop: self.key.workshop,
                question_id: self.key.question_id,
                response_data: self.response_data,
                status: self.status,
                submitted_at: self.submitted_at,
                created_at: now,
                updated_at: now,
            },
        }
    }
}

// =============================================================================
// ACCESS LOG
// =============================================================================

/// One append-only audit fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub id: LogId,
    pub participant: ParticipantId,
    /// Catalog row, when the assessment has one for `workshop_type`.
    pub workshop: Option<WorkshopId>,
    pub workshop_type: WorkshopType,
    pub action: AccessAction,
    pub metadata: JsonPayload,
    pub created_at: Timestamp,
}

/// An audit fact waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccessLog {
    pub participant: ParticipantId,
    pub workshop: Option<WorkshopId>,
    pub workshop_type: WorkshopType,
    pub action: AccessAction,
    pub metadata: JsonPayload,
}

impl NewAccessLog {
    #[must_use]
    pub fn into_entry(self, id: LogId, now: Timestamp) -> AccessLogEntry {
        AccessLogEntry {
            id,
            participant: self.participant,
            workshop: self.workshop,
            workshop_type: self.workshop_type,
            action: self.action,
            metadata: self.metadata,
            created_at: now,
        }
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// A message shown on one participant's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopNotification {
    pub id: NotificationId,
    pub participant: ParticipantId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub workshop: Option<WorkshopId>,
    pub workshop_type: WorkshopType,
    pub is_read: bool,
    pub created_at: Timestamp,
}

/// A notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub participant: ParticipantId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub workshop: Option<WorkshopId>,
    pub workshop_type: WorkshopType,
}

impl NewNotification {
    /// "New workshop available" after a cohort advance.
    ///
    /// `name` is the catalog title when the assessment has a row for the
    /// stage, else the canonical title.
    #[must_use]
    pub fn workshop_advanced(
        participant: ParticipantId,
        workshop: Option<WorkshopId>,
        workshop_type: WorkshopType,
        name: &str,
    ) -> Self {
        Self {
            participant,
            kind: NotificationKind::WorkshopAdvanced,
            title: format!("New Workshop Available: {name}"),
            message: format!(
                "The facilitator has unlocked {name}. You can now proceed to complete this workshop."
            ),
            workshop,
            workshop_type,
        }
    }

    #[must_use]
    pub fn into_notification(self, id: NotificationId, now: Timestamp) -> WorkshopNotification {
        WorkshopNotification {
            id,
            participant: self.participant,
            kind: self.kind,
            title: self.title,
            message: self.message,
            workshop: self.workshop,
            workshop_type: self.workshop_type,
            is_read: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant() -> Participant {
        let now = Utc::now();
        Participant {
            id: ParticipantId(1),
            assessment: AssessmentId(1),
            username: "amina@example.org".to_string(),
            full_name: "Amina".to_string(),
            stakeholder_type: StakeholderType::Elder,
            organization: String::new(),
            province: None,
            completed_workshops: Vec::new(),
            current_workshop: Some(WorkshopType::Workshop1),
            facilitator_advanced_to: Some(WorkshopType::Workshop1),
            consent_given: false,
            consent_date: None,
            profile_completed: false,
            created_by: Actor::new("facilitator"),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn completion_is_an_ordered_set() {
        let mut p = participant();
        assert!(p.record_completion(WorkshopType::Workshop2));
        assert!(p.record_completion(WorkshopType::Workshop1));
        assert!(!p.record_completion(WorkshopType::Workshop2));
        assert_eq!(
            p.completed_workshops,
            vec![WorkshopType::Workshop2, WorkshopType::Workshop1]
        );
    }

    #[test]
    fn dashboard_requires_consent_and_profile() {
        let mut p = participant();
        assert!(!p.can_access_dashboard());
        p.consent_given = true;
        assert!(!p.can_access_dashboard());
        p.profile_completed = true;
        assert!(p.can_access_dashboard());
    }

    #[test]
    fn response_write_keeps_identity_and_first_submission() {
        let key = ResponseKey {
            participant: ParticipantId(1),
            workshop: WorkshopId(2),
            question_id: "q1".to_string(),
        };
        let t0 = Utc::now();
        let first = ResponseWrite {
            key: key.clone(),
            response_data: JsonPayload::from_value(&serde_json::json!("a")),
            status: ResponseStatus::Submitted,
            submitted_at: Some(t0),
        }
        .apply(None, ResponseId(7), t0);

        let later = t0 + chrono::Duration::seconds(30);
        let second = ResponseWrite {
            key,
            response_data: JsonPayload::from_value(&serde_json::json!("b")),
            status: ResponseStatus::Validated,
            submitted_at: Some(later),
        }
        .apply(Some(first.clone()), ResponseId(99), later);

        assert_eq!(second.id, ResponseId(7));
        assert_eq!(second.created_at, t0);
        assert_eq!(second.submitted_at, Some(t0));
        assert_eq!(second.status, ResponseStatus::Validated);
    }

    #[test]
    fn advanced_notification_names_the_workshop() {
        let stored = NewNotification::workshop_advanced(
            ParticipantId(3),
            Some(WorkshopId(2)),
            WorkshopType::Workshop2,
            "Community Priorities",
        )
        .into_notification(NotificationId(1), Utc::now());

        assert_eq!(stored.kind, NotificationKind::WorkshopAdvanced);
        assert_eq!(stored.title, "New Workshop Available: Community Priorities");
        assert!(stored.message.starts_with("The facilitator has unlocked Community Priorities."));
        assert!(!stored.is_read);
    }
}
