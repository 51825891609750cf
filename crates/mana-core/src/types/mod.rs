//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the MANA engine:
//! - Identifiers (`AssessmentId`, `ParticipantId`, `WorkshopId`, ...)
//! - Closed token sets (`WorkshopType`, `StakeholderType`, `ResponseStatus`, ...)
//! - Opaque JSON payloads (`JsonPayload`)
//! - Error types (`ManaError`)
//!
//! ## Wire Compatibility
//!
//! Every closed token set keeps the exact string vocabulary of the stored
//! data (`workshop_1`, `youth_leader`, `submitted`, ...). Serde uses those
//! strings for JSON and the variant index for the binary formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of one assessment (a cohort of participants and its catalog).
    AssessmentId
);
record_id!(
    /// Identifier of one participant account.
    ParticipantId
);
record_id!(
    /// Identifier of one workshop catalog row.
    WorkshopId
);
record_id!(
    /// Identifier of one stored answer.
    ResponseId
);
record_id!(
    /// Identifier of one access log entry.
    LogId
);
record_id!(
    /// Identifier of one synthesis record.
    SynthesisId
);
record_id!(
    /// Identifier of one participant notification.
    NotificationId
);

// =============================================================================
// WORKSHOP TYPE
// =============================================================================

/// One of the fixed workshop stages.
///
/// The string tokens are persisted and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkshopType {
    #[serde(rename = "workshop_1")]
    Workshop1,
    #[serde(rename = "workshop_2")]
    Workshop2,
    #[serde(rename = "workshop_3")]
    Workshop3,
    #[serde(rename = "workshop_4")]
    Workshop4,
    #[serde(rename = "workshop_5")]
    Workshop5,
    #[serde(rename = "workshop_6")]
    Workshop6,
}

impl WorkshopType {
    /// Every workshop type in catalog order.
    pub const ALL: [WorkshopType; 6] = [
        WorkshopType::Workshop1,
        WorkshopType::Workshop2,
        WorkshopType::Workshop3,
        WorkshopType::Workshop4,
        WorkshopType::Workshop5,
        WorkshopType::Workshop6,
    ];

    /// The persisted token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkshopType::Workshop1 => "workshop_1",
            WorkshopType::Workshop2 => "workshop_2",
            WorkshopType::Workshop3 => "workshop_3",
            WorkshopType::Workshop4 => "workshop_4",
            WorkshopType::Workshop5 => "workshop_5",
            WorkshopType::Workshop6 => "workshop_6",
        }
    }

    /// Parse a persisted token. Unknown tokens yield `None`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.as_str() == token.trim())
    }

    /// Catalog title of the workshop.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            WorkshopType::Workshop1 => "Workshop 1: Understanding the Community Context",
            WorkshopType::Workshop2 => "Workshop 2: Community Aspirations and Priorities",
            WorkshopType::Workshop3 => "Workshop 3: Community Collaboration and Empowerment",
            WorkshopType::Workshop4 => "Workshop 4: Community Feedback on Existing Initiatives",
            WorkshopType::Workshop5 => {
                "Workshop 5: OBCs Needs, Challenges, Factors, and Outcomes"
            }
            WorkshopType::Workshop6 => "Workshop 6: Ways Forward and Action Planning",
        }
    }
}

impl fmt::Display for WorkshopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STAKEHOLDER TYPE
// =============================================================================

/// Stakeholder group a participant represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderType {
    Elder,
    WomenLeader,
    YouthLeader,
    Farmer,
    Fisherfolk,
    ReligiousLeader,
    TraditionalLeader,
    MilfRepresentative,
    MnlfRepresentative,
    BusinessLeader,
    Teacher,
    HealthWorker,
    #[default]
    Other,
}

impl StakeholderType {
    const ALL: [StakeholderType; 13] = [
        StakeholderType::Elder,
        StakeholderType::WomenLeader,
        StakeholderType::YouthLeader,
        StakeholderType::Farmer,
        StakeholderType::Fisherfolk,
        StakeholderType::ReligiousLeader,
        StakeholderType::TraditionalLeader,
        StakeholderType::MilfRepresentative,
        StakeholderType::MnlfRepresentative,
        StakeholderType::BusinessLeader,
        StakeholderType::Teacher,
        StakeholderType::HealthWorker,
        StakeholderType::Other,
    ];

    /// The persisted token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StakeholderType::Elder => "elder",
            StakeholderType::WomenLeader => "women_leader",
            StakeholderType::YouthLeader => "youth_leader",
            StakeholderType::Farmer => "farmer",
            StakeholderType::Fisherfolk => "fisherfolk",
            StakeholderType::ReligiousLeader => "religious_leader",
            StakeholderType::TraditionalLeader => "traditional_leader",
            StakeholderType::MilfRepresentative => "milf_representative",
            StakeholderType::MnlfRepresentative => "mnlf_representative",
            StakeholderType::BusinessLeader => "business_leader",
            StakeholderType::Teacher => "teacher",
            StakeholderType::HealthWorker => "health_worker",
            StakeholderType::Other => "other",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            StakeholderType::Elder => "Community Elder",
            StakeholderType::WomenLeader => "Women Leader",
            StakeholderType::YouthLeader => "Youth Leader",
            StakeholderType::Farmer => "Farmer",
            StakeholderType::Fisherfolk => "Fisherfolk",
            StakeholderType::ReligiousLeader => "Religious Leader",
            StakeholderType::TraditionalLeader => "Traditional Leader",
            StakeholderType::MilfRepresentative => "MILF Representative",
            StakeholderType::MnlfRepresentative => "MNLF Representative",
            StakeholderType::BusinessLeader => "Business Leader",
            StakeholderType::Teacher => "Teacher/Educator",
            StakeholderType::HealthWorker => "Health Worker",
            StakeholderType::Other => "Other",
        }
    }

    /// Parse a token, returning `None` when it is not part of the vocabulary.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == token.trim())
    }

    /// Parse a token, falling back to `Other` (roster import semantics).
    #[must_use]
    pub fn parse_or_other(token: &str) -> Self {
        Self::parse(token).unwrap_or_default()
    }
}

impl fmt::Display for StakeholderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STATUS TOKENS
// =============================================================================

/// Lifecycle of one stored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Draft,
    Submitted,
    Validated,
}

impl ResponseStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Draft => "draft",
            ResponseStatus::Submitted => "submitted",
            ResponseStatus::Validated => "validated",
        }
    }
}

/// Kind of event recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    View,
    Submit,
    Update,
    Unlock,
    Complete,
}

impl AccessAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessAction::View => "view",
            AccessAction::Submit => "submit",
            AccessAction::Update => "update",
            AccessAction::Unlock => "unlock",
            AccessAction::Complete => "complete",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of message delivered to a participant's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WorkshopAdvanced,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationKind::WorkshopAdvanced => "workshop_advanced",
        }
    }
}

/// Scheduling status of a workshop catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

// =============================================================================
// JSON PAYLOAD
// =============================================================================

/// An opaque JSON document stored as canonical text.
///
/// Answers and log metadata are free-form per question schema, so the engine
/// never inspects them. Keeping the text form lets the binary formats
/// (postcard) carry them without a self-describing encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPayload(String);

impl JsonPayload {
    /// The empty object `{}`.
    #[must_use]
    pub fn empty() -> Self {
        Self("{}".to_string())
    }

    /// Encode a JSON value.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    /// Decode back into a JSON value. Corrupt text decodes to `null`.
    #[must_use]
    pub fn value(&self) -> serde_json::Value {
        serde_json::from_str(&self.0).unwrap_or(serde_json::Value::Null)
    }

    /// Raw JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length of the encoded document in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is the empty object or empty text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty() || self.0 == "{}"
    }
}

impl Default for JsonPayload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<serde_json::Value> for JsonPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::from_value(&value)
    }
}

// =============================================================================
// ACTOR
// =============================================================================

/// Display name of whoever performed a facilitator action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor(pub String);

impl Actor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The actor used by scheduled reconciliation.
    #[must_use]
    pub fn system() -> Self {
        Self(crate::primitives::SYSTEM_ACTOR.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the MANA engine.
///
/// The access manager itself treats unknown workshop tokens as no-ops; the
/// variants below come from storage and from the gates of the surrounding
/// workflows (locked workshops, read-only submissions, bad input).
#[derive(Debug, Error)]
pub enum ManaError {
    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness constraint would be violated.
    #[error("duplicate {kind}: {key}")]
    Duplicate { kind: &'static str, key: String },

    /// The workshop is not accessible to this participant yet.
    #[error("workshop {0} is locked; await facilitator approval")]
    WorkshopLocked(WorkshopType),

    /// Responses for this workshop were already submitted and are read-only.
    #[error("workshop {0} has already been submitted")]
    AlreadySubmitted(WorkshopType),

    /// Caller input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ManaError {
    pub(crate) fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, key: impl fmt::Display) -> Self {
        Self::Duplicate {
            kind,
            key: key.to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workshop_tokens_are_stable() {
        assert_eq!(WorkshopType::Workshop1.as_str(), "workshop_1");
        assert_eq!(WorkshopType::Workshop6.to_string(), "workshop_6");
        assert_eq!(
            WorkshopType::parse("workshop_3"),
            Some(WorkshopType::Workshop3)
        );
        assert_eq!(WorkshopType::parse("workshop_7"), None);
        assert_eq!(WorkshopType::parse(""), None);
    }

    #[test]
    fn workshop_type_json_uses_token() {
        let json = serde_json::to_string(&WorkshopType::Workshop2).expect("serialize");
        assert_eq!(json, "\"workshop_2\"");
        let back: WorkshopType = serde_json::from_str("\"workshop_5\"").expect("deserialize");
        assert_eq!(back, WorkshopType::Workshop5);
    }

    #[test]
    fn stakeholder_unknown_falls_back_to_other() {
        assert_eq!(
            StakeholderType::parse_or_other("youth_leader"),
            StakeholderType::YouthLeader
        );
        assert_eq!(
            StakeholderType::parse_or_other("astronaut"),
            StakeholderType::Other
        );
        assert_eq!(StakeholderType::Elder.label(), "Community Elder");
    }

    #[test]
    fn payload_keeps_json_text() {
        let payload = JsonPayload::from_value(&serde_json::json!({"bulk_advancement": true}));
        assert_eq!(payload.value()["bulk_advancement"], true);
        assert!(!payload.is_empty());
        assert!(JsonPayload::empty().is_empty());
    }

    #[test]
    fn response_status_tokens() {
        let json = serde_json::to_string(&ResponseStatus::Submitted).expect("serialize");
        assert_eq!(json, "\"submitted\"");
        assert_eq!(ResponseStatus::Validated.as_str(), "validated");
    }
}
