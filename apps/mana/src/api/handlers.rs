//! # API Endpoint Handlers
//!
//! Each handler takes the workspace lock, runs one engine operation and,
//! for writes, saves a file-backed workspace before answering.

use super::{
    ApiError, AppState,
    types::{
        AdvanceRequest, AdvanceResponse, ApproveRequest, ChangedResponse, CompleteRequest,
        CreateAssessmentRequest, DashboardResponse, HealthResponse, ImportRequest, LogsResponse,
        ReconcileResponse, RegisterRequest, ResetRequest, ResponseQuery, RosterFormat,
        SaveRequest, UnlockRequest, WorkshopViewResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use mana_core::primitives::{DASHBOARD_RECENT_NOTIFICATIONS, DASHBOARD_UNREAD_NOTIFICATIONS};
use mana_core::{
    Actor, Assessment, AssessmentId, AssessmentProgress, ImportReport, JsonPayload, ManaError,
    NotificationId, Participant, ParticipantId, ProfileUpdate, ResponseService, ResponseStatus,
    SaveOutcome, Store, SubmissionStats, SynthesisId, SynthesisRecord, Synthesizer,
    WorkshopAccessManager, WorkshopNotification, WorkshopResponse, WorkshopType, Workspace,
    complete_onboarding, import_roster_csv, import_roster_json, register_participant,
    seed_catalog,
};

// =============================================================================
// LOOKUP HELPERS
// =============================================================================

/// Access manager for an existing assessment.
fn manager_for(workspace: &Workspace, id: u64) -> Result<WorkshopAccessManager, ApiError> {
    let assessment = AssessmentId(id);
    workspace
        .store()
        .get_assessment(assessment)?
        .ok_or_else(|| not_found("assessment", id))?;
    Ok(workspace.access(assessment))
}

fn load_participant(store: &dyn Store, id: u64) -> Result<Participant, ApiError> {
    store
        .get_participant(ParticipantId(id))?
        .ok_or_else(|| not_found("participant", id))
}

/// Workshop named in a path. Unknown tokens are 404 here: the caller asked
/// for a page that does not exist.
fn path_workshop(token: &str) -> Result<WorkshopType, ApiError> {
    WorkshopType::parse(token).ok_or_else(|| not_found("workshop", token))
}

fn not_found(kind: &'static str, id: impl ToString) -> ApiError {
    ApiError::Engine(ManaError::NotFound {
        kind,
        id: id.to_string(),
    })
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// ASSESSMENT HANDLERS
// =============================================================================

pub async fn list_assessments_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Assessment>>, ApiError> {
    let workspace = state.workspace.read().await;
    Ok(Json(workspace.store().list_assessments()?))
}

/// Create an assessment and, unless told otherwise, its workshop catalog.
pub async fn create_assessment_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateAssessmentRequest>,
) -> Result<(StatusCode, Json<Assessment>), ApiError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }

    let mut workspace = state.workspace.write().await;
    let sequence = workspace.sequence().clone();
    let store = workspace.store_mut();
    let assessment = store.create_assessment(title)?;
    if request.seed_catalog {
        seed_catalog(store, assessment.id, &sequence)?;
    }
    state.persist(&workspace)?;

    tracing::info!(assessment = %assessment.id, "assessment created");
    Ok((StatusCode::CREATED, Json(assessment)))
}

pub async fn assessment_progress_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AssessmentProgress>, ApiError> {
    let workspace = state.workspace.read().await;
    let manager = manager_for(&workspace, id)?;
    Ok(Json(manager.get_assessment_progress_summary(workspace.store())?))
}

/// Advance the cohort. An unknown or out-of-sequence token changes nothing.
pub async fn advance_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let manager = manager_for(&workspace, id)?;

    let Some(workshop_type) = WorkshopType::parse(&request.workshop_type) else {
        tracing::debug!(token = %request.workshop_type, "advance ignored: unknown workshop");
        return Ok(Json(AdvanceResponse {
            changed: false,
            advanced: 0,
            moved: 0,
        }));
    };

    let report = manager.advance_cohort(workspace.store_mut(), workshop_type, &request.actor())?;
    if report.advanced > 0 {
        state.persist(&workspace)?;
    }
    Ok(Json(AdvanceResponse {
        changed: report.advanced > 0,
        advanced: report.advanced,
        moved: report.moved,
    }))
}

/// Scheduled reconciliation pass.
pub async fn reconcile_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let manager = manager_for(&workspace, id)?;
    let unlocked = manager.auto_unlock_due_workshops(workspace.store_mut())?;
    if unlocked > 0 {
        state.persist(&workspace)?;
    }
    Ok(Json(ReconcileResponse {
        changed: unlocked > 0,
        unlocked,
    }))
}

// =============================================================================
// ROSTER HANDLERS
// =============================================================================

pub async fn list_participants_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let workspace = state.workspace.read().await;
    let manager = manager_for(&workspace, id)?;
    Ok(Json(
        workspace.store().participants_in(manager.assessment())?,
    ))
}

pub async fn register_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let mut workspace = state.workspace.write().await;
    let manager = manager_for(&workspace, id)?;
    let participant = register_participant(
        workspace.store_mut(),
        &manager,
        request.registration,
        &Actor::new(request.actor),
    )?;
    state.persist(&workspace)?;
    Ok((StatusCode::CREATED, Json(participant)))
}

pub async fn import_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportReport>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let manager = manager_for(&workspace, id)?;
    let actor = Actor::new(request.actor);
    let report = match request.format {
        RosterFormat::Csv => {
            import_roster_csv(workspace.store_mut(), &manager, &request.content, &actor)?
        }
        RosterFormat::Json => {
            import_roster_json(workspace.store_mut(), &manager, &request.content, &actor)?
        }
    };
    if report.created > 0 {
        state.persist(&workspace)?;
    }
    Ok(Json(report))
}

// =============================================================================
// FACILITATOR READS
// =============================================================================

pub async fn workshop_responses_handler(
    State(state): State<AppState>,
    Path((id, workshop)): Path<(u64, String)>,
    Query(query): Query<ResponseQuery>,
) -> Result<Json<Vec<WorkshopResponse>>, ApiError> {
    let filter = query.filter().map_err(ApiError::BadRequest)?;
    let workshop_type = path_workshop(&workshop)?;

    let workspace = state.workspace.read().await;
    let manager = manager_for(&workspace, id)?;
    let rows = ResponseService::new(&manager).responses_for_workshop(
        workspace.store(),
        workshop_type,
        &filter,
    )?;
    Ok(Json(rows))
}

pub async fn submission_stats_handler(
    State(state): State<AppState>,
    Path((id, workshop)): Path<(u64, String)>,
) -> Result<Json<SubmissionStats>, ApiError> {
    let workshop_type = path_workshop(&workshop)?;
    let workspace = state.workspace.read().await;
    let manager = manager_for(&workspace, id)?;
    Ok(Json(
        manager.submission_stats(workspace.store(), workshop_type)?,
    ))
}

/// Stored synthesis records for one workshop, newest first.
///
/// Read side only; see the module docs on how records are created.
pub async fn list_syntheses_handler(
    State(state): State<AppState>,
    Path((id, workshop)): Path<(u64, String)>,
) -> Result<Json<Vec<SynthesisRecord>>, ApiError> {
    let workshop_type = path_workshop(&workshop)?;
    let workspace = state.workspace.read().await;
    let manager = manager_for(&workspace, id)?;
    let store = workspace.store();
    let activity = store
        .find_activity(manager.assessment(), workshop_type)?
        .ok_or_else(|| not_found("workshop", workshop_type))?;
    Ok(Json(store.syntheses_for(activity.id)?))
}

pub async fn approve_synthesis_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<SynthesisRecord>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let synthesis = SynthesisId(id);
    let assessment = {
        let store = workspace.store();
        let record = store
            .get_synthesis(synthesis)?
            .ok_or_else(|| not_found("synthesis", id))?;
        store
            .get_activity(record.workshop)?
            .ok_or_else(|| not_found("workshop", record.workshop))?
            .assessment
    };

    let manager = workspace.access(assessment);
    let record = Synthesizer::new(&manager).approve(
        workspace.store_mut(),
        synthesis,
        &Actor::new(request.actor),
    )?;
    state.persist(&workspace)?;
    Ok(Json(record))
}

// =============================================================================
// PARTICIPANT HANDLERS
// =============================================================================

pub async fn dashboard_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let workspace = state.workspace.read().await;
    let participant = load_participant(workspace.store(), id)?;
    let manager = workspace.access(participant.assessment);

    let notifications = workspace.store().notifications_of(participant.id)?;
    let unread: Vec<WorkshopNotification> =
        notifications.iter().filter(|n| !n.is_read).cloned().collect();

    Ok(Json(DashboardResponse {
        summary: manager.get_progress_summary(&participant),
        allowed_workshops: manager.get_allowed_workshops(&participant),
        navigation: manager.workshop_navigation(workspace.store(), &participant)?,
        can_access_dashboard: participant.can_access_dashboard(),
        unread_count: unread.len(),
        unread_notifications: unread
            .into_iter()
            .take(DASHBOARD_UNREAD_NOTIFICATIONS)
            .collect(),
        recent_notifications: notifications
            .into_iter()
            .take(DASHBOARD_RECENT_NOTIFICATIONS)
            .collect(),
        participant,
    }))
}

pub async fn mark_notification_read_handler(
    State(state): State<AppState>,
    Path((id, notification)): Path<(u64, u64)>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let participant = load_participant(workspace.store(), id)?;

    let changed = workspace
        .store_mut()
        .mark_notification_read(participant.id, NotificationId(notification))?;
    if changed {
        state.persist(&workspace)?;
    }
    Ok(Json(ChangedResponse { changed }))
}

pub async fn onboarding_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let mut participant = load_participant(workspace.store(), id)?;
    let manager = workspace.access(participant.assessment);

    let changed = complete_onboarding(workspace.store_mut(), &manager, &mut participant, update)?;
    if changed {
        state.persist(&workspace)?;
    }
    Ok(Json(ChangedResponse { changed }))
}

/// Open a workshop: gate it, log the view, return the stored answers.
pub async fn view_workshop_handler(
    State(state): State<AppState>,
    Path((id, workshop)): Path<(u64, String)>,
) -> Result<Json<WorkshopViewResponse>, ApiError> {
    let workshop_type = path_workshop(&workshop)?;
    let mut workspace = state.workspace.write().await;
    let participant = load_participant(workspace.store(), id)?;
    let manager = workspace.access(participant.assessment);
    let service = ResponseService::new(&manager);

    service.record_view(workspace.store_mut(), &participant, workshop_type)?;
    state.persist(&workspace)?;

    let store = workspace.store();
    let responses = service.responses_for(store, &participant, workshop_type)?;
    let title = store
        .find_activity(participant.assessment, workshop_type)?
        .map_or_else(|| workshop_type.title().to_string(), |a| a.title);

    Ok(Json(WorkshopViewResponse {
        workshop_type,
        title,
        submitted: responses.iter().any(|r| r.status != ResponseStatus::Draft),
        advanced_past: manager.is_advanced_past(&participant, workshop_type),
        responses,
    }))
}

pub async fn save_responses_handler(
    State(state): State<AppState>,
    Path((id, workshop)): Path<(u64, String)>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveOutcome>, ApiError> {
    let workshop_type = path_workshop(&workshop)?;
    let mut workspace = state.workspace.write().await;
    let mut participant = load_participant(workspace.store(), id)?;
    let manager = workspace.access(participant.assessment);

    let outcome = ResponseService::new(&manager).save(
        workspace.store_mut(),
        &mut participant,
        workshop_type,
        &request.answers,
        request.action,
    )?;
    state.persist(&workspace)?;
    Ok(Json(outcome))
}

/// Mark a workshop complete. Unknown tokens are a no-op.
pub async fn complete_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let mut participant = load_participant(workspace.store(), id)?;
    let Some(workshop_type) = WorkshopType::parse(&request.workshop_type) else {
        return Ok(Json(ChangedResponse { changed: false }));
    };
    let manager = workspace.access(participant.assessment);

    let metadata = request.metadata.as_ref().map(JsonPayload::from_value);
    let changed = manager.mark_workshop_complete(
        workspace.store_mut(),
        &mut participant,
        workshop_type,
        metadata,
    )?;
    if changed {
        state.persist(&workspace)?;
    }
    Ok(Json(ChangedResponse { changed }))
}

/// Manual unlock of one participant. Unknown tokens are a no-op.
pub async fn unlock_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UnlockRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let mut participant = load_participant(workspace.store(), id)?;
    let Some(workshop_type) = WorkshopType::parse(&request.workshop_type) else {
        return Ok(Json(ChangedResponse { changed: false }));
    };
    let manager = workspace.access(participant.assessment);

    let changed = manager.unlock_workshop(
        workspace.store_mut(),
        &mut participant,
        workshop_type,
        &Actor::new(request.actor),
    )?;
    if changed {
        state.persist(&workspace)?;
    }
    Ok(Json(ChangedResponse { changed }))
}

pub async fn reset_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ChangedResponse>, ApiError> {
    let mut workspace = state.workspace.write().await;
    let mut participant = load_participant(workspace.store(), id)?;
    let manager = workspace.access(participant.assessment);

    let changed = manager.reset_participant_progress(
        workspace.store_mut(),
        &mut participant,
        &Actor::new(request.actor),
    )?;
    state.persist(&workspace)?;
    Ok(Json(ChangedResponse { changed }))
}

pub async fn logs_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<LogsResponse>, ApiError> {
    let workspace = state.workspace.read().await;
    let participant = load_participant(workspace.store(), id)?;
    Ok(Json(LogsResponse {
        participant: participant.id.0,
        entries: workspace.store().logs_of(participant.id)?,
    }))
}
