//! # Repository Interfaces
//!
//! Data-access traits injected into every service. Services never reach a
//! concrete backend; they take `&S` or `&mut S` where `S: Store + ?Sized`,
//! so both the in-memory store and the redb store (and `&mut dyn Store`)
//! drive the same code.
//!
//! ## Atomic Writes
//!
//! Progression state, stored answers, the audit trail and the notifications
//! announcing a change all move together.
//! Services collect those writes into a [`ChangeBatch`] and hand it to
//! [`Store::commit`], which applies all of it or none of it.

use crate::records::{
    Assessment, AccessLogEntry, NewAccessLog, NewActivity, NewNotification, NewParticipant,
    Participant, ResponseKey, ResponseWrite, WorkshopActivity, WorkshopNotification,
    WorkshopResponse,
};
use crate::synthesis::{NewSynthesis, SynthesisRecord};
use crate::{
    AssessmentId, ManaError, NotificationId, ParticipantId, SynthesisId, WorkshopId,
    WorkshopType,
};

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Assessments (cohorts).
pub trait AssessmentRepository {
    /// Create an assessment with the given title.
    fn create_assessment(&mut self, title: &str) -> Result<Assessment, ManaError>;

    fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, ManaError>;

    /// All assessments ordered by id.
    fn list_assessments(&self) -> Result<Vec<Assessment>, ManaError>;
}

/// Participant accounts.
pub trait ParticipantRepository {
    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the assessment does not exist
    /// - `Duplicate` if the username is taken within the assessment
    fn insert_participant(&mut self, new: NewParticipant) -> Result<Participant, ManaError>;

    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ManaError>;

    fn find_participant(
        &self,
        assessment: AssessmentId,
        username: &str,
    ) -> Result<Option<Participant>, ManaError>;

    /// Every participant of an assessment, ordered by id.
    fn participants_in(&self, assessment: AssessmentId) -> Result<Vec<Participant>, ManaError>;
}

/// Workshop catalog rows.
pub trait ActivityRepository {
    /// # Errors
    ///
    /// `Duplicate` if the assessment already has a row for the workshop type.
    fn insert_activity(&mut self, new: NewActivity) -> Result<WorkshopActivity, ManaError>;

    fn get_activity(&self, id: WorkshopId) -> Result<Option<WorkshopActivity>, ManaError>;

    fn find_activity(
        &self,
        assessment: AssessmentId,
        workshop_type: WorkshopType,
    ) -> Result<Option<WorkshopActivity>, ManaError>;

    /// Catalog rows of an assessment, ordered by id.
    fn activities_in(&self, assessment: AssessmentId) -> Result<Vec<WorkshopActivity>, ManaError>;
}

/// Stored answers. Writes go through [`Store::commit`].
pub trait ResponseRepository {
    fn get_response(&self, key: &ResponseKey) -> Result<Option<WorkshopResponse>, ManaError>;

    /// Answers of one participant for one workshop, ordered by question id.
    fn responses_of(
        &self,
        participant: ParticipantId,
        workshop: WorkshopId,
    ) -> Result<Vec<WorkshopResponse>, ManaError>;

    /// Answers of every participant for one workshop, ordered by
    /// (participant, question id).
    fn responses_for_activity(&self, workshop: WorkshopId)
    -> Result<Vec<WorkshopResponse>, ManaError>;
}

/// The append-only audit trail. Appends go through [`Store::commit`].
pub trait LogRepository {
    /// Entries of one participant in append order.
    fn logs_of(&self, participant: ParticipantId) -> Result<Vec<AccessLogEntry>, ManaError>;

    /// Total number of entries.
    fn log_count(&self) -> Result<usize, ManaError>;
}

/// Dashboard notifications. Deliveries go through [`Store::commit`].
pub trait NotificationRepository {
    /// Notifications of one participant, newest first.
    fn notifications_of(
        &self,
        participant: ParticipantId,
    ) -> Result<Vec<WorkshopNotification>, ManaError>;

    /// Mark one of the participant's notifications read.
    ///
    /// Returns `false` when it was already read.
    ///
    /// # Errors
    ///
    /// `NotFound` if the notification does not exist or belongs to someone
    /// else.
    fn mark_notification_read(
        &mut self,
        participant: ParticipantId,
        id: NotificationId,
    ) -> Result<bool, ManaError>;
}

/// Synthesis records.
pub trait SynthesisRepository {
    fn insert_synthesis(&mut self, new: NewSynthesis) -> Result<SynthesisRecord, ManaError>;

    fn get_synthesis(&self, id: SynthesisId) -> Result<Option<SynthesisRecord>, ManaError>;

    /// Overwrite an existing record. `updated_at` is refreshed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist.
    fn save_synthesis(&mut self, record: &SynthesisRecord) -> Result<(), ManaError>;

    /// Records for one workshop, newest first.
    fn syntheses_for(&self, workshop: WorkshopId) -> Result<Vec<SynthesisRecord>, ManaError>;
}

// =============================================================================
// STORE
// =============================================================================

/// The full data-access surface plus atomic batch commits.
pub trait Store:
    AssessmentRepository
    + ParticipantRepository
    + ActivityRepository
    + ResponseRepository
    + LogRepository
    + NotificationRepository
    + SynthesisRepository
{
    /// Apply a batch atomically.
    ///
    /// Participants are overwritten (their `updated_at` refreshed), responses
    /// are upserted by key, log entries and notifications are appended in
    /// order.
    ///
    /// # Errors
    ///
    /// `NotFound` if any participant or activity referenced by the batch is
    /// missing. Nothing is written in that case.
    fn commit(&mut self, batch: ChangeBatch) -> Result<(), ManaError>;
}

/// Writes that must land together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub participants: Vec<Participant>,
    pub responses: Vec<ResponseWrite>,
    pub logs: Vec<NewAccessLog>,
    pub notifications: Vec<NewNotification>,
}

impl ChangeBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_participant(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub fn upsert_response(&mut self, write: ResponseWrite) {
        self.responses.push(write);
    }

    pub fn append_log(&mut self, entry: NewAccessLog) {
        self.logs.push(entry);
    }

    pub fn push_notification(&mut self, notification: NewNotification) {
        self.notifications.push(notification);
    }

    /// Whether the batch carries no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
            && self.responses.is_empty()
            && self.logs.is_empty()
            && self.notifications.is_empty()
    }
}
