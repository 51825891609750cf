//! # mana-core
//!
//! The workshop access and progress engine for MANA assessments.
//!
//! Participants of an assessment move through a fixed, linear sequence of
//! workshops as a cohort. A facilitator advances the whole cohort one stage
//! at a time; individual submissions only mark completion. Every change to
//! a participant's progression is recorded in an append-only access log.
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Deterministic ordering: `BTreeMap`/`BTreeSet`/`Vec` only
//! - Storage is injected through the [`Store`] traits; each engine operation
//!   is one atomic [`ChangeBatch`]
//! - Unknown or out-of-sequence workshop tokens fall back silently

// =============================================================================
// MODULES
// =============================================================================

pub mod access;
pub mod formats;
pub mod onboarding;
pub mod primitives;
pub mod progress;
pub mod records;
pub mod repository;
pub mod responses;
pub mod roster;
pub mod sequence;
pub mod storage;
pub mod synthesis;
pub mod types;
pub mod workspace;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AccessAction, ActivityStatus, Actor, AssessmentId, JsonPayload, LogId, ManaError,
    NotificationId, NotificationKind, ParticipantId, ResponseId, ResponseStatus,
    StakeholderType, SynthesisId, WorkshopId, WorkshopType,
};

// =============================================================================
// RE-EXPORTS: Records & Storage
// =============================================================================

pub use records::{
    AccessLogEntry, Assessment, NewAccessLog, NewActivity, NewNotification, NewParticipant,
    Participant, ResponseKey, ResponseWrite, Timestamp, WorkshopActivity, WorkshopNotification,
    WorkshopResponse,
};
pub use repository::{
    ActivityRepository, AssessmentRepository, ChangeBatch, LogRepository,
    NotificationRepository, ParticipantRepository, ResponseRepository, Store,
    SynthesisRepository,
};
pub use storage::{MemoryStore, RedbStore, StoreSnapshot};
pub use workspace::{StorageBackend, Workspace};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use access::{AdvanceReport, WorkshopAccessManager};
pub use progress::{AssessmentProgress, NavItem, ProgressSummary, SubmissionStats, WorkshopProgress};
pub use sequence::WorkshopSequence;

// =============================================================================
// RE-EXPORTS: Workflows
// =============================================================================

pub use onboarding::{ProfileUpdate, complete_onboarding};
pub use responses::{ResponseFilter, ResponseService, SaveAction, SaveOutcome};
pub use roster::{
    ImportReport, Registration, RosterRow, import_roster, import_roster_csv, import_roster_json,
    parse_roster_csv, register_participant, seed_catalog,
};
pub use synthesis::{
    AnswerDigest, NO_SUBMISSIONS, NewSynthesis, ProviderError, SynthesisInput, SynthesisOutput,
    SynthesisProvider, SynthesisRecord, SynthesisStatus, Synthesizer,
};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes};
