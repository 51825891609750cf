//! # Storage Backends
//!
//! - [`MemoryStore`]: BTreeMap-backed, saved and loaded as a snapshot file
//! - [`RedbStore`]: disk-backed on redb with ACID batch commits

mod memory;
mod redb_store;

pub use memory::{MemoryStore, StoreSnapshot};
pub use redb_store::RedbStore;

/// Record kinds that draw identifiers from a per-kind counter.
///
/// Counters start at zero and the first allocated id is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum IdKind {
    Assessment,
    Participant,
    Activity,
    Response,
    Log,
    Notification,
    Synthesis,
}

impl IdKind {
    /// Key of the counter in the redb metadata table.
    pub(crate) const fn counter_key(self) -> &'static str {
        match self {
            IdKind::Assessment => "next_assessment_id",
            IdKind::Participant => "next_participant_id",
            IdKind::Activity => "next_activity_id",
            IdKind::Response => "next_response_id",
            IdKind::Log => "next_log_id",
            IdKind::Notification => "next_notification_id",
            IdKind::Synthesis => "next_synthesis_id",
        }
    }
}
