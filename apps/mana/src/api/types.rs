//! # API Request/Response Types
//!
//! JSON bodies of the HTTP API. Engine records (participants, responses,
//! log entries, progress summaries) are returned as-is; this module only
//! adds the request shapes and the envelopes around them.

use mana_core::{
    AccessLogEntry, Actor, NavItem, Participant, ProgressSummary, Registration, ResponseFilter,
    SaveAction, StakeholderType, WorkshopNotification, WorkshopResponse, WorkshopType,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_actor() -> String {
    "facilitator".to_string()
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub title: String,
    /// Create the workshop catalog for the configured sequence.
    #[serde(default = "default_true")]
    pub seed_catalog: bool,
}

fn default_true() -> bool {
    true
}

/// Facilitator action that names a workshop by token.
///
/// The token is kept as a string: an unknown token is a no-op, not a
/// request error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceRequest {
    pub workshop_type: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

impl AdvanceRequest {
    pub fn actor(&self) -> Actor {
        Actor::new(&self.actor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResponse {
    /// Whether any participant row changed.
    pub changed: bool,
    /// Participants whose ceiling was set.
    pub advanced: usize,
    /// Participants whose current workshop moved.
    pub moved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub changed: bool,
    pub unlocked: usize,
}

// =============================================================================
// ROSTER
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub registration: Registration,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub format: RosterFormat,
    /// The roster file contents.
    pub content: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

// =============================================================================
// PARTICIPANT VIEWS
// =============================================================================

/// A participant's dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub participant: Participant,
    pub summary: ProgressSummary,
    pub allowed_workshops: Vec<WorkshopType>,
    pub navigation: Vec<NavItem>,
    /// Onboarding (profile and consent) is done.
    pub can_access_dashboard: bool,
    /// Newest unread notifications, capped.
    pub unread_notifications: Vec<WorkshopNotification>,
    /// Total unread, including those past the cap.
    pub unread_count: usize,
    /// Newest notifications, read or not, capped.
    pub recent_notifications: Vec<WorkshopNotification>,
}

/// Opening one workshop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopViewResponse {
    pub workshop_type: WorkshopType,
    pub title: String,
    pub responses: Vec<WorkshopResponse>,
    /// Answers are submitted and read-only.
    pub submitted: bool,
    /// The cohort has moved on past this workshop.
    pub advanced_past: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub answers: BTreeMap<String, Value>,
    pub action: SaveAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub workshop_type: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequest {
    pub workshop_type: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// Result of an operation that may be a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub participant: u64,
    pub entries: Vec<AccessLogEntry>,
}

// =============================================================================
// FACILITATOR READS
// =============================================================================

/// Query string of the response listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseQuery {
    pub province: Option<String>,
    pub stakeholder_type: Option<String>,
}

impl ResponseQuery {
    /// Unknown stakeholder tokens are rejected.
    pub fn filter(&self) -> Result<ResponseFilter, String> {
        let stakeholder_type = match self.stakeholder_type.as_deref() {
            None | Some("") => None,
            Some(token) => Some(
                StakeholderType::parse(token)
                    .ok_or_else(|| format!("unknown stakeholder type '{}'", token))?,
            ),
        };
        Ok(ResponseFilter {
            province: self.province.clone().filter(|p| !p.is_empty()),
            stakeholder_type,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(default = "default_actor")]
    pub actor: String,
}
