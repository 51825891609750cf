//! # Workshop Synthesis
//!
//! Summaries of submitted answers produced by an external service.
//!
//! The service sits behind [`SynthesisProvider`]; this module only owns the
//! record lifecycle:
//!
//! ```text
//! (no submitted answers) -> failed
//! processing -> completed -> approved
//!            -> failed
//! ```
//!
//! Provider errors are captured on the record. There is no retry.

use crate::access::WorkshopAccessManager;
use crate::records::Timestamp;
use crate::repository::Store;
use crate::responses::{ResponseFilter, ResponseService};
use crate::{
    Actor, JsonPayload, ManaError, ResponseStatus, StakeholderType, SynthesisId, WorkshopId,
    WorkshopType,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Error text recorded when there is nothing to summarize.
pub const NO_SUBMISSIONS: &str = "No submitted responses found";

/// Lifecycle of a synthesis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStatus {
    Processing,
    Completed,
    Failed,
    Approved,
}

/// One synthesis run over a workshop's submitted answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRecord {
    pub id: SynthesisId,
    pub workshop: WorkshopId,
    pub provider: String,
    pub filters: ResponseFilter,
    pub status: SynthesisStatus,
    pub response_count: usize,
    pub summary: String,
    pub key_themes: Vec<String>,
    pub error_message: String,
    pub created_by: Actor,
    pub approved_by: Option<Actor>,
    pub approved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields of a new synthesis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSynthesis {
    pub workshop: WorkshopId,
    pub provider: String,
    pub filters: ResponseFilter,
    pub status: SynthesisStatus,
    pub response_count: usize,
    pub error_message: String,
    pub created_by: Actor,
}

impl NewSynthesis {
    #[must_use]
    pub fn into_record(self, id: SynthesisId, now: Timestamp) -> SynthesisRecord {
        SynthesisRecord {
            id,
            workshop: self.workshop,
            provider: self.provider,
            filters: self.filters,
            status: self.status,
            response_count: self.response_count,
            summary: String::new(),
            key_themes: Vec::new(),
            error_message: self.error_message,
            created_by: self.created_by,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// PROVIDER SEAM
// =============================================================================

/// One submitted answer as handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDigest {
    pub province: Option<String>,
    pub stakeholder_type: StakeholderType,
    pub question_id: String,
    pub response: JsonPayload,
}

/// Everything a provider needs to summarize one workshop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisInput {
    pub workshop_type: WorkshopType,
    pub workshop_title: String,
    pub answers: Vec<AnswerDigest>,
}

/// What a provider returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub summary: String,
    pub key_themes: Vec<String>,
}

/// Failure reported by a provider.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// The external summarization service.
pub trait SynthesisProvider {
    /// Name stored on the record.
    fn name(&self) -> &str;

    fn summarize(&self, input: &SynthesisInput) -> Result<SynthesisOutput, ProviderError>;
}

// =============================================================================
// SYNTHESIZER
// =============================================================================

/// Runs and reviews syntheses for one assessment.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    manager: &'a WorkshopAccessManager,
}

impl<'a> Synthesizer<'a> {
    #[must_use]
    pub fn new(manager: &'a WorkshopAccessManager) -> Self {
        Self { manager }
    }

    /// Summarize the submitted answers of one workshop.
    ///
    /// The returned record is `failed` when there are no submitted answers
    /// or the provider errors, `completed` otherwise.
    pub fn synthesize<S: Store + ?Sized>(
        &self,
        store: &mut S,
        provider: &dyn SynthesisProvider,
        workshop_type: WorkshopType,
        filters: ResponseFilter,
        created_by: &Actor,
    ) -> Result<SynthesisRecord, ManaError> {
        let activity = store
            .find_activity(self.manager.assessment(), workshop_type)?
            .ok_or_else(|| ManaError::not_found("workshop", workshop_type))?;

        let mut answers = Vec::new();
        for response in ResponseService::new(self.manager).responses_for_workshop(
            &*store,
            workshop_type,
            &filters,
        )? {
            if response.status != ResponseStatus::Submitted {
                continue;
            }
            let Some(participant) = store.get_participant(response.participant)? else {
                continue;
            };
            answers.push(AnswerDigest {
                province: participant.province,
                stakeholder_type: participant.stakeholder_type,
                question_id: response.question_id,
                response: response.response_data,
            });
        }

        let new = NewSynthesis {
            workshop: activity.id,
            provider: provider.name().to_string(),
            filters,
            status: SynthesisStatus::Processing,
            response_count: answers.len(),
            error_message: String::new(),
            created_by: created_by.clone(),
        };

        if answers.is_empty() {
            warn!(workshop = %workshop_type, "synthesis requested without submissions");
            return store.insert_synthesis(NewSynthesis {
                status: SynthesisStatus::Failed,
                error_message: NO_SUBMISSIONS.to_string(),
                ..new
            });
        }

        let mut record = store.insert_synthesis(new)?;
        let input = SynthesisInput {
            workshop_type,
            workshop_title: activity.title,
            answers,
        };
        match provider.summarize(&input) {
            Ok(output) => {
                record.status = SynthesisStatus::Completed;
                record.summary = output.summary;
                record.key_themes = output.key_themes;
                info!(synthesis = %record.id, workshop = %workshop_type, "synthesis completed");
            }
            Err(e) => {
                record.status = SynthesisStatus::Failed;
                record.error_message = e.to_string();
                warn!(synthesis = %record.id, error = %e, "synthesis failed");
            }
        }
        store.save_synthesis(&record)?;
        Ok(record)
    }

    /// Approve a completed synthesis.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record does not exist
    /// - `InvalidInput` if the record is not `completed`
    pub fn approve<S: Store + ?Sized>(
        &self,
        store: &mut S,
        id: SynthesisId,
        reviewer: &Actor,
    ) -> Result<SynthesisRecord, ManaError> {
        let mut record = store
            .get_synthesis(id)?
            .ok_or_else(|| ManaError::not_found("synthesis", id))?;
        if record.status != SynthesisStatus::Completed {
            return Err(ManaError::InvalidInput(
                "can only approve completed syntheses".to_string(),
            ));
        }

        record.status = SynthesisStatus::Approved;
        record.approved_by = Some(reviewer.clone());
        record.approved_at = Some(Utc::now());
        store.save_synthesis(&record)?;
        Ok(record)
    }

    /// Run a new synthesis with the filters of an existing one.
    pub fn regenerate<S: Store + ?Sized>(
        &self,
        store: &mut S,
        provider: &dyn SynthesisProvider,
        id: SynthesisId,
        created_by: &Actor,
    ) -> Result<SynthesisRecord, ManaError> {
        let previous = store
            .get_synthesis(id)?
            .ok_or_else(|| ManaError::not_found("synthesis", id))?;
        let activity = store
            .get_activity(previous.workshop)?
            .ok_or_else(|| ManaError::not_found("workshop", previous.workshop))?;
        self.synthesize(
            store,
            provider,
            activity.workshop_type,
            previous.filters,
            created_by,
        )
    }
}
