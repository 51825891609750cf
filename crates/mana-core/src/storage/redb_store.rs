//! # redb-backed Store
//!
//! A disk-backed store on the redb embedded database:
//! - ACID transactions (every `commit` batch is one write transaction)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records are serialized with postcard. Uniqueness constraints live in
//! secondary index tables; id counters live in the metadata table.

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
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for assessments: AssessmentId(u64) -> serialized Assessment
const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");

/// Table for participants: ParticipantId(u64) -> serialized Participant
const PARTICIPANTS: TableDefinition<u64, &[u8]> = TableDefinition::new("participants");

/// Index: (assessment, username) -> ParticipantId
const USERNAME_INDEX: TableDefinition<(u64, &str), u64> = TableDefinition::new("username_index");

/// Table for catalog rows: WorkshopId(u64) -> serialized WorkshopActivity
const ACTIVITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("activities");

/// Index: (assessment, workshop token) -> WorkshopId
const ACTIVITY_INDEX: TableDefinition<(u64, &str), u64> = TableDefinition::new("activity_index");

/// Table for answers: ResponseId(u64) -> serialized WorkshopResponse
const RESPONSES: TableDefinition<u64, &[u8]> = TableDefinition::new("responses");

/// Index: (participant, workshop, question id) -> ResponseId
const RESPONSE_INDEX: TableDefinition<(u64, u64, &str), u64> =
    TableDefinition::new("response_index");

/// Table for the audit trail: LogId(u64) -> serialized AccessLogEntry
const ACCESS_LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("access_logs");

/// Table for notifications: NotificationId(u64) -> serialized WorkshopNotification
const NOTIFICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("notifications");

/// Table for synthesis records: SynthesisId(u64) -> serialized SynthesisRecord
const SYNTHESES: TableDefinition<u64, &[u8]> = TableDefinition::new("syntheses");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

fn io(e: impl std::fmt::Display) -> ManaError {
    ManaError::Io(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ManaError> {
    postcard::to_allocvec(value).map_err(|e| ManaError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ManaError> {
    postcard::from_bytes(bytes).map_err(|e| ManaError::Serialization(e.to_string()))
}

/// Take the next id of `kind` and persist the counter.
fn allocate(meta: &mut Table<'_, &'static str, u64>, kind: IdKind) -> Result<u64, ManaError> {
    let next = meta
        .get(kind.counter_key())
        .map_err(io)?
        .map(|v| v.value())
        .unwrap_or(0)
        .saturating_add(1);
    meta.insert(kind.counter_key(), next).map_err(io)?;
    Ok(next)
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ManaError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io)?;
            for table in [
                ASSESSMENTS,
                PARTICIPANTS,
                ACTIVITIES,
                RESPONSES,
                ACCESS_LOGS,
                NOTIFICATIONS,
                SYNTHESES,
            ] {
                let _ = write_txn.open_table(table).map_err(io)?;
            }
            let _ = write_txn.open_table(USERNAME_INDEX).map_err(io)?;
            let _ = write_txn.open_table(ACTIVITY_INDEX).map_err(io)?;
            let _ = write_txn.open_table(RESPONSE_INDEX).map_err(io)?;
            let _ = write_txn.open_table(METADATA).map_err(io)?;
            write_txn.commit().map_err(io)?;
        }

        Ok(Self { db })
    }

    /// Run `f` inside one write transaction.
    ///
    /// Commits when `f` succeeds and aborts otherwise, so a failed operation
    /// writes nothing.
    fn write_with<T>(
        &mut self,
        f: impl FnOnce(&WriteTransaction) -> Result<T, ManaError>,
    ) -> Result<T, ManaError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit().map_err(io)?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort().map_err(io)?;
                Err(e)
            }
        }
    }

    fn read_one<T: DeserializeOwned>(&self, def: RecordTable, id: u64) -> Result<Option<T>, ManaError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(def).map_err(io)?;
        table
            .get(id)
            .map_err(io)?
            .map(|data| decode(data.value()))
            .transpose()
    }

    /// Every record of a table in id order.
    fn read_all<T: DeserializeOwned>(&self, def: RecordTable) -> Result<Vec<T>, ManaError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(def).map_err(io)?;

        let mut rows = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (_, value) = entry.map_err(io)?;
            rows.push(decode(value.value())?);
        }
        Ok(rows)
    }
}

// =============================================================================
// REPOSITORY IMPLEMENTATIONS
// =============================================================================

impl AssessmentRepository for RedbStore {
    fn create_assessment(&mut self, title: &str) -> Result<Assessment, ManaError> {
        self.write_with(|txn| {
            let mut meta = txn.open_table(METADATA).map_err(io)?;
            let mut table = txn.open_table(ASSESSMENTS).map_err(io)?;

            let assessment = Assessment {
                id: AssessmentId(allocate(&mut meta, IdKind::Assessment)?),
                title: title.to_string(),
                created_at: Utc::now(),
            };
            table
                .insert(assessment.id.0, encode(&assessment)?.as_slice())
                .map_err(io)?;
            Ok(assessment)
        })
    }

    fn get_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, ManaError> {
        self.read_one(ASSESSMENTS, id.0)
    }

    fn list_assessments(&self) -> Result<Vec<Assessment>, ManaError> {
        self.read_all(ASSESSMENTS)
    }
}

impl ParticipantRepository for RedbStore {
    fn insert_participant(&mut self, new: NewParticipant) -> Result<Participant, ManaError> {
        self.write_with(|txn| {
            let assessments = txn.open_table(ASSESSMENTS).map_err(io)?;
            if assessments.get(new.assessment.0).map_err(io)?.is_none() {
                return Err(ManaError::not_found("assessment", new.assessment));
            }

            let mut index = txn.open_table(USERNAME_INDEX).map_err(io)?;
            if index
                .get((new.assessment.0, new.username.as_str()))
                .map_err(io)?
                .is_some()
            {
                return Err(ManaError::duplicate("participant", &new.username));
            }

            let mut meta = txn.open_table(METADATA).map_err(io)?;
            let mut table = txn.open_table(PARTICIPANTS).map_err(io)?;
            let id = ParticipantId(allocate(&mut meta, IdKind::Participant)?);
            let participant = new.into_participant(id, Utc::now());

            table
                .insert(id.0, encode(&participant)?.as_slice())
                .map_err(io)?;
            index
                .insert((participant.assessment.0, participant.username.as_str()), id.0)
                .map_err(io)?;
            Ok(participant)
        })
    }

    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ManaError> {
        self.read_one(PARTICIPANTS, id.0)
    }

    fn find_participant(
        &self,
        assessment: AssessmentId,
        username: &str,
    ) -> Result<Option<Participant>, ManaError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(io)?;
            let index = read_txn.open_table(USERNAME_INDEX).map_err(io)?;
            index
                .get((assessment.0, username))
                .map_err(io)?
                .map(|v| v.value())
        };
        match id {
            Some(id) => self.read_one(PARTICIPANTS, id),
            None => Ok(None),
        }
    }

    fn participants_in(&self, assessment: AssessmentId) -> Result<Vec<Participant>, ManaError> {
        let mut rows: Vec<Participant> = self.read_all(PARTICIPANTS)?;
        rows.retain(|p| p.assessment == assessment);
        Ok(rows)
    }
}

impl ActivityRepository for RedbStore {
    fn insert_activity(&mut self, new: NewActivity) -> Result<WorkshopActivity, ManaError> {
        self.write_with(|txn| {
            let assessments = txn.open_table(ASSESSMENTS).map_err(io)?;
            if assessments.get(new.assessment.0).map_err(io)?.is_none() {
                return Err(ManaError::not_found("assessment", new.assessment));
            }

            let mut index = txn.open_table(ACTIVITY_INDEX).map_err(io)?;
            let key = (new.assessment.0, new.workshop_type.as_str());
            if index.get(key).map_err(io)?.is_some() {
                return Err(ManaError::duplicate("activity", new.workshop_type));
            }

            let mut meta = txn.open_table(METADATA).map_err(io)?;
            let mut table = txn.open_table(ACTIVITIES).map_err(io)?;
            let id = WorkshopId(allocate(&mut meta, IdKind::Activity)?);
            let activity = new.into_activity(id, Utc::now());

            table
                .insert(id.0, encode(&activity)?.as_slice())
                .map_err(io)?;
            index.insert(key, id.0).map_err(io)?;
            Ok(activity)
        })
    }

    fn get_activity(&self, id: WorkshopId) -> Result<Option<WorkshopActivity>, ManaError> {
        self.read_one(ACTIVITIES, id.0)
    }

    fn find_activity(
        &self,
        assessment: AssessmentId,
        workshop_type: WorkshopType,
    ) -> Result<Option<WorkshopActivity>, ManaError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(io)?;
            let index = read_txn.open_table(ACTIVITY_INDEX).map_err(io)?;
            index
                .get((assessment.0, workshop_type.as_str()))
                .map_err(io)?
                .map(|v| v.value())
        };
        match id {
            Some(id) => self.read_one(ACTIVITIES, id),
            None => Ok(None),
        }
    }

    fn activities_in(&self, assessment: AssessmentId) -> Result<Vec<WorkshopActivity>, ManaError> {
        let mut rows: Vec<WorkshopActivity> = self.read_all(ACTIVITIES)?;
        rows.retain(|a| a.assessment == assessment);
        Ok(rows)
    }
}

impl ResponseRepository for RedbStore {
    fn get_response(&self, key: &ResponseKey) -> Result<Option<WorkshopResponse>, ManaError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(io)?;
            let index = read_txn.open_table(RESPONSE_INDEX).map_err(io)?;
            index
                .get((key.participant.0, key.workshop.0, key.question_id.as_str()))
                .map_err(io)?
                .map(|v| v.value())
        };
        match id {
            Some(id) => self.read_one(RESPONSES, id),
            None => Ok(None),
        }
    }

    fn responses_of(
        &self,
        participant: ParticipantId,
        workshop: WorkshopId,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        let mut rows: Vec<WorkshopResponse> = self.read_all(RESPONSES)?;
        rows.retain(|r| r.participant == participant && r.workshop == workshop);
        rows.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(rows)
    }

    fn responses_for_activity(
        &self,
        workshop: WorkshopId,
    ) -> Result<Vec<WorkshopResponse>, ManaError> {
        let mut rows: Vec<WorkshopResponse> = self.read_all(RESPONSES)?;
        rows.retain(|r| r.workshop == workshop);
        rows.sort_by_key(WorkshopResponse::key);
        Ok(rows)
    }
}

impl LogRepository for RedbStore {
    fn logs_of(&self, participant: ParticipantId) -> Result<Vec<AccessLogEntry>, ManaError> {
        let mut rows: Vec<AccessLogEntry> = self.read_all(ACCESS_LOGS)?;
        rows.retain(|l| l.participant == participant);
        Ok(rows)
    }

    fn log_count(&self) -> Result<usize, ManaError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ACCESS_LOGS).map_err(io)?;
        let count = table.len().map_err(io)?;
        usize::try_from(count).map_err(io)
    }
}

impl NotificationRepository for RedbStore {
    fn notifications_of(
        &self,
        participant: ParticipantId,
    ) -> Result<Vec<WorkshopNotification>, ManaError> {
        let mut rows: Vec<WorkshopNotification> = self.read_all(NOTIFICATIONS)?;
        rows.retain(|n| n.participant == participant);
        rows.reverse();
        Ok(rows)
    }

    fn mark_notification_read(
        &mut self,
        participant: ParticipantId,
        id: NotificationId,
    ) -> Result<bool, ManaError> {
        self.write_with(|txn| {
            let mut table = txn.open_table(NOTIFICATIONS).map_err(io)?;
            let stored: Option<WorkshopNotification> = table
                .get(id.0)
                .map_err(io)?
                .map(|data| decode(data.value()))
                .transpose()?;
            let mut notification = stored
                .filter(|n| n.participant == participant)
                .ok_or_else(|| ManaError::not_found("notification", id))?;
            if notification.is_read {
                return Ok(false);
            }
            notification.is_read = true;
            table
                .insert(id.0, encode(&notification)?.as_slice())
                .map_err(io)?;
            Ok(true)
        })
    }
}

impl SynthesisRepository for RedbStore {
    fn insert_synthesis(&mut self, new: NewSynthesis) -> Result<SynthesisRecord, ManaError> {
        self.write_with(|txn| {
            let activities = txn.open_table(ACTIVITIES).map_err(io)?;
            if activities.get(new.workshop.0).map_err(io)?.is_none() {
                return Err(ManaError::not_found("workshop", new.workshop));
            }

            let mut meta = txn.open_table(METADATA).map_err(io)?;
            let mut table = txn.open_table(SYNTHESES).map_err(io)?;
            let id = SynthesisId(allocate(&mut meta, IdKind::Synthesis)?);
            let record = new.into_record(id, Utc::now());
            table
                .insert(id.0, encode(&record)?.as_slice())
                .map_err(io)?;
            Ok(record)
        })
    }

    fn get_synthesis(&self, id: SynthesisId) -> Result<Option<SynthesisRecord>, ManaError> {
        self.read_one(SYNTHESES, id.0)
    }

    fn save_synthesis(&mut self, record: &SynthesisRecord) -> Result<(), ManaError> {
        self.write_with(|txn| {
            let mut table = txn.open_table(SYNTHESES).map_err(io)?;
            if table.get(record.id.0).map_err(io)?.is_none() {
                return Err(ManaError::not_found("synthesis", record.id));
            }
            let mut updated = record.clone();
            updated.updated_at = Utc::now();
            table
                .insert(record.id.0, encode(&updated)?.as_slice())
                .map_err(io)?;
            Ok(())
        })
    }

    fn syntheses_for(&self, workshop: WorkshopId) -> Result<Vec<SynthesisRecord>, ManaError> {
        let mut rows: Vec<SynthesisRecord> = self.read_all(SYNTHESES)?;
        rows.retain(|s| s.workshop == workshop);
        rows.reverse();
        Ok(rows)
    }
}

impl Store for RedbStore {
    fn commit(&mut self, batch: ChangeBatch) -> Result<(), ManaError> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = Utc::now();

        self.write_with(|txn| {
            let mut participants = txn.open_table(PARTICIPANTS).map_err(io)?;
            let activities = txn.open_table(ACTIVITIES).map_err(io)?;
            let mut responses = txn.open_table(RESPONSES).map_err(io)?;
            let mut response_index = txn.open_table(RESPONSE_INDEX).map_err(io)?;
            let mut logs = txn.open_table(ACCESS_LOGS).map_err(io)?;
            let mut notifications = txn.open_table(NOTIFICATIONS).map_err(io)?;
            let mut meta = txn.open_table(METADATA).map_err(io)?;

            for mut participant in batch.participants {
                if participants.get(participant.id.0).map_err(io)?.is_none() {
                    return Err(ManaError::not_found("participant", participant.id));
                }
                participant.updated_at = now;
                participants
                    .insert(participant.id.0, encode(&participant)?.as_slice())
                    .map_err(io)?;
            }

            for write in batch.responses {
                let key = &write.key;
                if participants.get(key.participant.0).map_err(io)?.is_none() {
                    return Err(ManaError::not_found("participant", key.participant));
                }
                if activities.get(key.workshop.0).map_err(io)?.is_none() {
                    return Err(ManaError::not_found("workshop", key.workshop));
                }

                let existing_id = response_index
                    .get((key.participant.0, key.workshop.0, key.question_id.as_str()))
                    .map_err(io)?
                    .map(|v| v.value());
                let existing: Option<WorkshopResponse> = match existing_id {
                    Some(id) => responses
                        .get(id)
                        .map_err(io)?
                        .map(|data| decode(data.value()))
                        .transpose()?,
                    None => None,
                };
                let id = match existing_id {
                    Some(id) => ResponseId(id),
                    None => ResponseId(allocate(&mut meta, IdKind::Response)?),
                };

                let row = write.apply(existing, id, now);
                responses
                    .insert(row.id.0, encode(&row)?.as_slice())
                    .map_err(io)?;
                response_index
                    .insert(
                        (row.participant.0, row.workshop.0, row.question_id.as_str()),
                        row.id.0,
                    )
                    .map_err(io)?;
            }

            for entry in batch.logs {
                if participants.get(entry.participant.0).map_err(io)?.is_none() {
                    return Err(ManaError::not_found("participant", entry.participant));
                }
                if let Some(workshop) = entry.workshop {
                    if activities.get(workshop.0).map_err(io)?.is_none() {
                        return Err(ManaError::not_found("workshop", workshop));
                    }
                }
                let id = LogId(allocate(&mut meta, IdKind::Log)?);
                let row = entry.into_entry(id, now);
                logs.insert(id.0, encode(&row)?.as_slice()).map_err(io)?;
            }

            for notification in batch.notifications {
                if participants.get(notification.participant.0).map_err(io)?.is_none() {
                    return Err(ManaError::not_found("participant", notification.participant));
                }
                if let Some(workshop) = notification.workshop {
                    if activities.get(workshop.0).map_err(io)?.is_none() {
                        return Err(ManaError::not_found("workshop", workshop));
                    }
                }
                let id = NotificationId(allocate(&mut meta, IdKind::Notification)?);
                let row = notification.into_notification(id, now);
                notifications
                    .insert(id.0, encode(&row)?.as_slice())
                    .map_err(io)?;
            }

            Ok(())
        })
    }
}
