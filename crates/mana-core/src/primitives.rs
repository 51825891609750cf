//! # Engine Primitives
//!
//! Hardcoded constants for the MANA engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything a deployment may reasonably change (the number of workshop
//! stages, storage paths) lives in configuration instead.

/// Magic bytes for the MANA snapshot file header.
///
/// - File Header = Magic Bytes ("MANA") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MANA";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 2;

/// Number of stages in the default workshop sequence.
pub const DEFAULT_SEQUENCE_LEN: usize = 5;

/// Actor name recorded for reconciliation passes.
pub const SYSTEM_ACTOR: &str = "system";

// =============================================================================
// LOG REASONS
// =============================================================================

/// Unlock written by a cohort-wide facilitator advance.
pub const REASON_FACILITATOR_ADVANCE: &str = "facilitator_advance";

/// Unlock written by the periodic reconciliation pass.
pub const REASON_SCHEDULED_UNLOCK: &str = "scheduled_unlock";

/// Unlock written by a single-participant override.
pub const REASON_MANUAL_UNLOCK: &str = "manual_unlock";

/// Unlock written when a participant's progress is cleared.
pub const REASON_PROGRESS_RESET: &str = "progress_reset";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for question identifiers.
pub const MAX_QUESTION_ID_LENGTH: usize = 128;

/// Maximum serialized size of one answer (64KB).
pub const MAX_ANSWER_LENGTH: usize = 65536;

/// Maximum number of answers accepted in one save.
pub const MAX_ANSWERS_PER_SAVE: usize = 200;

/// Maximum number of rows in one roster import.
pub const MAX_ROSTER_ROWS: usize = 5000;

/// Maximum length for usernames (emails).
pub const MAX_USERNAME_LENGTH: usize = 254;

// =============================================================================
// DASHBOARD
// =============================================================================

/// Most recent notifications shown on a participant dashboard.
pub const DASHBOARD_RECENT_NOTIFICATIONS: usize = 10;

/// Unread notifications highlighted on a participant dashboard.
pub const DASHBOARD_UNREAD_NOTIFICATIONS: usize = 5;
