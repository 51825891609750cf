//! # In-memory Store
//!
//! BTreeMap-backed implementation of every repository. Fast and volatile;
//! the `file` backend persists it through [`StoreSnapshot`] and the
//! snapshot format in `formats::persistence`.
//!
//! Batch commits validate every reference before the first write, so a
//! rejected batch leaves the store untouched.

use super::IdKind;
use crate::records::{
    AccessLogEntry, Assessment, NewActivity, NewParticipant, Participant, ResponseKey,
    WorkshopActivity, WorkshopNotification, WorkshopResponse,
};
use crate::repository::{
    ActivityRepository, AssessmentRepository, ChangeBatch, LogRepository,
    NotificationRepository, ParticipantRepository, ResponseRepository, Store,
    SynthesisRepository,
};
use crate::synthesis::{NewSynthesis, SynthesisRecord};
use crate::{
    AssessmentId, LogId, ManaError, NotificationId, ParticipantId, ResponseId, SynthesisId,
    WorkshopId, WorkshopType,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// BTreeMap-backed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    assessments: BTreeMap<AssessmentId, Assessment>,
    participants: BTreeMap<ParticipantId, Participant>,
    usernames: BTreeMap<(AssessmentId, String), ParticipantId>,
    activities: BTreeMap<WorkshopId, WorkshopActivity>,
    activity_index: BTreeMap<(AssessmentId, WorkshopType), WorkshopId>,
    responses: BTreeMap<ResponseKey, WorkshopResponse>,
    logs: BTreeMap<LogId, AccessLogEntry>,
    notifications: BTreeMap<NotificationId, WorkshopNotification>,
    syntheses: BTreeMap<SynthesisId, SynthesisRecord>,
    counters: BTreeMap<IdKind, u64>,
}

/// Flat, ordered form of a [`MemoryStore`] for serialization.
///
/// Indexes and id counters are rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub assessments: Vec<Assessment>,
    pub participants: Vec<Participant>,
    pub activities: Vec<WorkshopActivity>,
    pub responses: Vec<WorkshopResponse>,
    pub logs: Vec<AccessLogEntry>,
    pub notifications: Vec<WorkshopNotification>,
    pub syntheses: Vec<SynthesisRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten into a snapshot (every table in id order).
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            assessments: self.assessments.values().cloned().collect(),
            participants: self.participants.values().cloned().collect(),
            activities: self.activities.values().cloned().collect(),
            responses: {
                let mut rows: Vec<WorkshopResponse> = self.responses.values().cloned().collect();
                rows.sort_by_key(|r| r.id);
                rows
            },
            logs: self.logs.values().cloned().collect(),
            notifications: self.notifications.values().cloned().collect(),
            syntheses: self.syntheses.values().cloned().collect(),
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// # Errors
    ///
    /// `Duplicate` if the snapshot violates a uniqueness constraint.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, ManaError> {
        let mut store = Self::new();

        for assessment in snapshot.assessments {
            store.bump(IdKind::Assessment, assessment.id.0);
            store.assessments.insert(assessment.id, assessment);
        }
        for participant in snapshot.participants {
            let key = (participant.assessment, participant.username.clone());
            if store.usernames.insert(key, participant.id).is_some() {
                return Err(ManaError::duplicate("participant", &participant.username));
            }
            store.bump(IdKind::Participant, participant.id.0);
            store.participants.insert(participant.id, participant);
        }
        for activity in snapshot.activities {
            let key = (activity.assessment, activity.workshop_type);
            if store.activity_index.insert(key, activity.id).is_some() {
                return Err(ManaError::duplicate("activity", activity.workshop_type));
            }
            store.bump(IdKind::Activity, activity.id.0);
            store.activities.insert(activity.id, activity);
        }
        for response in snapshot.responses {
            store.bump(IdKind::Response, response.id.0);
            if store.responses.insert(response.key(), response).is_some() {
                return Err(ManaError::duplicate("response", "participant/workshop/question"));
            }
        }
        for entry in snapshot.logs {
            store.bump(IdKind::Log, entry.id.0);
            store.logs.insert(entry.id, entry);
        }
        for notification in snapshot.notifications {
            store.bump(IdKind::Notification, notification.id.0);
            store.notifications.insert(notification.id, notification);
        }
        for record in snapshot.syntheses {
            store.bump(IdKind::Synthesis, record.id.0);
            store.syntheses.insert(record.id, record);
        }

        Ok(store)
    }

    fn allocate(&mut self, kind: IdKind) -> u64 {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    fn bump(&mut self, kind: IdKind, seen: u64) {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter = (*counter).max(seen);
    }

    fn require_participant(&self, id: ParticipantId) -> Result<(), ManaError> {
        if self.participants.contains_key(&id) {
            Ok(())
        } else {
            Err(ManaError::not_found("participant", id))
        }
    }

    fn require_activity(&self, id: WorkshopId) -> Result<(), ManaError> {
        if self.activities.contains_key(&id) {
            Ok(())
        } else {
            Err(ManaError::not_found("workshop", id))
        }
    }
}

// =============================================================================
// REPOSITORY IMPLEMENTATIONS
// =============================================================================

impl AssessmentRepository for MemoryStore {
    fn create_assessment(&mut self, title: &str) -> Result<Assessment, ManaError> {
        let assessment = Assessment {
            id: AssessmentId(self.allocate(IdKind::Assessment)),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.assessments.insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, ManaError> {
        Ok(self.assessments.get(&id).cloned())
    }

    fn list_assessments(&self) -> Result<Vec<Assessment>, ManaError> {
        Ok(self.assessments.values().cloned().collect())
    }
}

impl ParticipantRepository for MemoryStore {
    fn insert_participant(&mut self, new: NewParticipant) -> Result<Participant, ManaError> {
        if !self.assessments.contains_key(&new.assessment) {
            return Err(ManaError::not_found("assessment", new.assessment));
        }
        let key = (new.assessment, new.username.clone());
        if self.usernames.contains_key(&key) {
            return Err(ManaError::duplicate("participant", &new.username));
        }

        let id = ParticipantId(self.allocate(IdKind::Participant));
        let participant = new.into_participant(id, Utc::now());
        self.usernames.insert(key, id);
        self.participants.insert(id, participant.clone());
        Ok(participant)
    }

    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ManaError> {
        Ok(self.participants.get(&id).cloned())
    }

    fn find_participant(
        &self,
        assessment: AssessmentId,
        username: &str,
    ) -> Result<Option<Participant>, ManaError> {
        Ok(self
            .usernames
            .get(&(assessment, username.to_string()))
            .and_then(|id| self.participants.get(id))
            .cloned())
    }

    fn participants_in(&self, assessment: AssessmentId) -> Result<Vec<Participant>, ManaError> {
        Ok(self
            .participants
            .values()
            .filter(|p| p.assessment == assessment)
            .cloned()
            .collect())
    }
}

impl ActivityRepository for MemoryStore {
    fn insert_activity(&mut self, new: NewActivity) -> Result<WorkshopActivity, ManaError> {
        if !self.assessments.contains_key(&new.assessment) {
            return Err(ManaError::not_found("assessment", new.assessment));
        }
        let key = (new.assessment, new.workshop_type);
        if self.activity_index.contains_key(&key) {
            return Err(ManaError::duplicate("activity", new.workshop_type));
        }

        let id = WorkshopId(self.allocate(IdKind::Activity));
        let activity = new.into_activity(id, Utc::now());
        self.activity_index.insert(key, id);
        self.activities.insert(id, activity.clone());
        Ok(activity)
    }

    fn get_activity(&self, id: WorkshopId) -> Result<Option<WorkshopActivity>, ManaError> {
        Ok(self.activities.get(&id).cloned())
    }

    fn find_activity(
        &self,
        assessment: AssessmentId,
        workshop_type: WorkshopType,
    ) -> Result<Option<WorkshopActivity>, ManaError> {
        Ok(self
            .activity_index
            .get(&(assessment, workshop_type))
            .and_then(|id| self.activities.get(id))
            .cloned())
    }

    fn activities_in(&self, assessment: AssessmentId) -> Result<Vec<WorkshopActivity>, ManaError> {
        Ok(self
            .activities
            .values()
            .filter(|a| a.assessment == assessment)
            .cloned()
            .collect())
    }
}

impl ResponseRepository for MemoryStore {
    fn get_response(&self, key: &ResponseKey) -> Result<Option<WorkshopResponse>, ManaError> {
        Ok(self.responses.get(key).cloned())
    }

    fn responses_of(
        &self,
        participant: ParticipantId,
        workshop: WorkshopId,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        Ok(self
            .responses
            .values()
            .filter(|r| r.participant == participant && r.workshop == workshop)
            .cloned()
            .collect())
    }

    fn responses_for_activity(
        &self,
        workshop: WorkshopId,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        Ok(self
            .responses
            .values()
            .filter(|r| r.workshop == workshop)
            .cloned()
            .collect())
    }
}

impl LogRepository for MemoryStore {
    fn logs_of(&self, participant: ParticipantId) -> Result<Vec<AccessLogEntry>, ManaError> {
        Ok(self
            .logs
            .values()
            .filter(|l| l.participant == participant)
            .cloned()
            .collect())
    }

    fn log_count(&self) -> Result<usize, ManaError> {
        Ok(self.logs.len())
    }
}

impl NotificationRepository for MemoryStore {
    fn notifications_of(
        &self,
        participant: ParticipantId,
    ) -> Result<Vec<WorkshopNotification>, ManaError> {
        Ok(self
            .notifications
            .values()
            .rev()
            .filter(|n| n.participant == participant)
            .cloned()
            .collect())
    }

    fn mark_notification_read(
        &mut self,
        participant: ParticipantId,
        id: NotificationId,
    ) -> Result<bool, ManaError> {
        let notification = self
            .notifications
            .get_mut(&id)
            .filter(|n| n.participant == participant)
            .ok_or_else(|| ManaError::not_found("notification", id))?;
        if notification.is_read {
            return Ok(false);
        }
        notification.is_read = true;
        Ok(true)
    }
}

impl SynthesisRepository for MemoryStore {
    fn insert_synthesis(&mut self, new: NewSynthesis) -> Result<SynthesisRecord, ManaError> {
        self.require_activity(new.workshop)?;
        let id = SynthesisId(self.allocate(IdKind::Synthesis));
        let record = new.into_record(id, Utc::now());
        self.syntheses.insert(id, record.clone());
        Ok(record)
    }

    fn get_synthesis(&self, id: SynthesisId) -> Result<Option<SynthesisRecord>, ManaError> {
        Ok(self.syntheses.get(&id).cloned())
    }

    fn save_synthesis(&mut self, record: &SynthesisRecord) -> Result<(), ManaError> {
        let slot = self
            .syntheses
            .get_mut(&record.id)
            .ok_or_else(|| ManaError::not_found("synthesis", record.id))?;
        *slot = record.clone();
        slot.updated_at = Utc::now();
        Ok(())
    }

    fn syntheses_for(&self, workshop: WorkshopId) -> Result<Vec<SynthesisRecord>, ManaError> {
        Ok(self
            .syntheses
            .values()
            .rev()
            .filter(|s| s.workshop == workshop)
            .cloned()
            .collect())
    }
}

impl Store for MemoryStore {
    fn commit(&mut self, batch: ChangeBatch) -> Result<(), ManaError> {
        // Validate every reference before the first write.
        for participant in &batch.participants {
            self.require_participant(participant.id)?;
        }
        for write in &batch.responses {
            self.require_participant(write.key.participant)?;
            self.require_activity(write.key.workshop)?;
        }
        for entry in &batch.logs {
            self.require_participant(entry.participant)?;
            if let Some(workshop) = entry.workshop {
                self.require_activity(workshop)?;
            }
        }
        for notification in &batch.notifications {
            self.require_participant(notification.participant)?;
            if let Some(workshop) = notification.workshop {
                self.require_activity(workshop)?;
            }
        }

        let now = Utc::now();
        for mut participant in batch.participants {
            participant.updated_at = now;
            self.participants.insert(participant.id, participant);
        }
        for write in batch.responses {
            let existing = self.responses.get(&write.key).cloned();
            let id = match &existing {
                Some(row) => row.id,
                None => ResponseId(self.allocate(IdKind::Response)),
            };
            let row = write.apply(existing, id, now);
            self.responses.insert(row.key(), row);
        }
        for entry in batch.logs {
            let id = LogId(self.allocate(IdKind::Log));
            self.logs.insert(id, entry.into_entry(id, now));
        }
        for notification in batch.notifications {
            let id = NotificationId(self.allocate(IdKind::Notification));
            self.notifications
                .insert(id, notification.into_notification(id, now));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NewAccessLog, NewNotification, ResponseWrite};
    use crate::{AccessAction, Actor, JsonPayload, ResponseStatus, StakeholderType};

    fn seeded() -> (MemoryStore, Participant, WorkshopActivity) {
        let mut store = MemoryStore::new();
        let assessment = store.create_assessment("Cohort").expect("assessment");
        let activity = store
            .insert_activity(NewActivity::canonical(assessment.id, WorkshopType::Workshop1))
            .expect("activity");
        let participant = store
            .insert_participant(NewParticipant {
                assessment: assessment.id,
                username: "p@example.org".to_string(),
                full_name: "P".to_string(),
                stakeholder_type: StakeholderType::Farmer,
                organization: String::new(),
                province: None,
                created_by: Actor::new("facilitator"),
                initial_stage: WorkshopType::Workshop1,
            })
            .expect("participant");
        (store, participant, activity)
    }

    fn write(participant: ParticipantId, workshop: WorkshopId, status: ResponseStatus) -> ResponseWrite {
        ResponseWrite {
            key: ResponseKey {
                participant,
                workshop,
                question_id: "q1".to_string(),
            },
            response_data: JsonPayload::from_value(&serde_json::json!("answer")),
            status,
            submitted_at: None,
        }
    }

    #[test]
    fn ids_start_at_one() {
        let (_, participant, activity) = seeded();
        assert_eq!(participant.id, ParticipantId(1));
        assert_eq!(activity.id, WorkshopId(1));
    }

    #[test]
    fn duplicate_username_rejected() {
        let (mut store, participant, _) = seeded();
        let again = NewParticipant {
            assessment: participant.assessment,
            username: participant.username.clone(),
            full_name: "Other".to_string(),
            stakeholder_type: StakeholderType::Other,
            organization: String::new(),
            province: None,
            created_by: Actor::new("facilitator"),
            initial_stage: WorkshopType::Workshop1,
        };
        assert!(matches!(
            store.insert_participant(again),
            Err(ManaError::Duplicate { .. })
        ));
    }

    #[test]
    fn upsert_keeps_single_row() {
        let (mut store, participant, activity) = seeded();
        let mut batch = ChangeBatch::new();
        batch.upsert_response(write(participant.id, activity.id, ResponseStatus::Draft));
        store.commit(batch).expect("commit");

        let mut batch = ChangeBatch::new();
        batch.upsert_response(write(participant.id, activity.id, ResponseStatus::Submitted));
        store.commit(batch).expect("commit");

        let rows = store.responses_of(participant.id, activity.id).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ResponseStatus::Submitted);
        assert_eq!(rows[0].id, ResponseId(1));
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let (mut store, participant, activity) = seeded();
        let mut batch = ChangeBatch::new();
        batch.append_log(NewAccessLog {
            participant: participant.id,
            workshop: Some(activity.id),
            workshop_type: WorkshopType::Workshop1,
            action: AccessAction::View,
            metadata: JsonPayload::empty(),
        });
        batch.upsert_response(write(ParticipantId(404), activity.id, ResponseStatus::Draft));

        assert!(matches!(
            store.commit(batch),
            Err(ManaError::NotFound { .. })
        ));
        assert_eq!(store.log_count().expect("count"), 0);
    }

    #[test]
    fn notifications_newest_first_and_read_once() {
        let (mut store, participant, activity) = seeded();
        let mut batch = ChangeBatch::new();
        for stage in [WorkshopType::Workshop1, WorkshopType::Workshop2] {
            batch.push_notification(NewNotification::workshop_advanced(
                participant.id,
                Some(activity.id),
                stage,
                stage.title(),
            ));
        }
        store.commit(batch).expect("commit");

        let listed = store.notifications_of(participant.id).expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].workshop_type, WorkshopType::Workshop2);

        let id = listed[1].id;
        assert!(store.mark_notification_read(participant.id, id).expect("mark"));
        assert!(!store.mark_notification_read(participant.id, id).expect("again"));
        assert!(matches!(
            store.mark_notification_read(ParticipantId(404), id),
            Err(ManaError::NotFound { .. })
        ));

        let restored = MemoryStore::from_snapshot(store.snapshot()).expect("restore");
        let read: Vec<bool> = restored
            .notifications_of(participant.id)
            .expect("list")
            .iter()
            .map(|n| n.is_read)
            .collect();
        assert_eq!(read, vec![false, true]);
    }

    #[test]
    fn snapshot_restores_counters_and_indexes() {
        let (store, participant, _) = seeded();
        let mut restored = MemoryStore::from_snapshot(store.snapshot()).expect("restore");

        let found = restored
            .find_participant(participant.assessment, &participant.username)
            .expect("find");
        assert_eq!(found.map(|p| p.id), Some(participant.id));

        let next = restored.create_assessment("Second").expect("assessment");
        assert_eq!(next.id, AssessmentId(2));
        assert_eq!(restored.snapshot().assessments.len(), 2);
    }
}
