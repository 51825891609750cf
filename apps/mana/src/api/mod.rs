//! # MANA HTTP API Module
//!
//! JSON API over the workshop engine, replacing the facilitator and
//! participant web views.
//!
//! ## Endpoints
//!
//! Facilitator:
//! - `GET  /health` - Health check (never authenticated)
//! - `GET  /assessments` / `POST /assessments` - List / create assessments
//! - `GET  /assessments/{id}/progress` - Cohort progress aggregate
//! - `POST /assessments/{id}/advance` - Advance the whole cohort
//! - `POST /assessments/{id}/reconcile` - Scheduled unlock pass
//! - `GET  /assessments/{id}/participants` / `POST` - List / register
//! - `POST /assessments/{id}/roster` - Bulk import (CSV or JSON)
//! - `GET  /assessments/{id}/workshops/{workshop}/responses` - Answers, filtered
//! - `GET  /assessments/{id}/workshops/{workshop}/stats` - Submission counts
//! - `GET  /assessments/{id}/workshops/{workshop}/syntheses` - Synthesis records
//! - `POST /syntheses/{id}/approve` - Approve a completed synthesis
//!
//! Synthesis is review-only over HTTP. Records are created by library
//! callers that hold a `SynthesisProvider` (`Synthesizer::synthesize`); the
//! server ships no provider, so it lists and approves what exists.
//!
//! Participant:
//! - `GET  /participants/{id}` - Dashboard, with recent and unread notifications
//! - `POST /participants/{id}/notifications/{notification}/read` - Mark one read
//! - `POST /participants/{id}/onboarding` - Profile and consent
//! - `GET  /participants/{id}/workshops/{workshop}` - Open a workshop
//! - `POST /participants/{id}/workshops/{workshop}/responses` - Save or submit
//! - `POST /participants/{id}/complete` / `unlock` / `reset` - Overrides
//! - `GET  /participants/{id}/logs` - Access log
//!
//! Engine no-ops answer 200 with `changed: false`. Locked or submitted
//! workshops answer 403, unknown records 404, duplicates 409.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::create_rate_limiter;
pub use types::{
    AdvanceRequest, AdvanceResponse, ApproveRequest, ChangedResponse, CompleteRequest,
    CreateAssessmentRequest, DashboardResponse, ErrorResponse, HealthResponse, ImportRequest,
    LogsResponse, ReconcileResponse, RegisterRequest, ResetRequest, ResponseQuery, RosterFormat,
    SaveRequest, UnlockRequest, WorkshopViewResponse,
};

use crate::config::{ServerConfig, StorageConfig};
use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mana_core::{ManaError, Workspace};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<RwLock<Workspace>>,
    /// Where a file-backed workspace is saved after each change.
    storage: Option<Arc<StorageConfig>>,
}

impl AppState {
    /// State without snapshot persistence (redb or throwaway in-memory).
    #[must_use]
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            storage: None,
        }
    }

    /// State that saves a file-backed workspace after every change.
    #[must_use]
    pub fn persisted(workspace: Workspace, storage: StorageConfig) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            storage: Some(Arc::new(storage)),
        }
    }

    fn persist(&self, workspace: &Workspace) -> Result<(), ApiError> {
        match &self.storage {
            Some(storage) => storage.persist(workspace).map_err(ApiError::from),
            None => Ok(()),
        }
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Handler error, rendered as [`ErrorResponse`].
#[derive(Debug)]
pub enum ApiError {
    Engine(ManaError),
    BadRequest(String),
}

impl From<ManaError> for ApiError {
    fn from(e: ManaError) -> Self {
        Self::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Engine(e) => {
                let status = match &e {
                    ManaError::NotFound { .. } => StatusCode::NOT_FOUND,
                    ManaError::Duplicate { .. } => StatusCode::CONFLICT,
                    ManaError::WorkshopLocked(_) | ManaError::AlreadySubmitted(_) => {
                        StatusCode::FORBIDDEN
                    }
                    ManaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    ManaError::Serialization(_) | ManaError::Io(_) => {
                        tracing::error!(error = %e, "storage failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS from the configured origins.
///
/// - `["*"]`: every origin (development only)
/// - unset: localhost only
/// - otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some([only]) if only == "*" => {
            tracing::warn!("CORS: allowing ALL origins; do not use in production");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                restricted_cors(allowed)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (if enabled), authentication (if a key is configured).
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/assessments",
            get(handlers::list_assessments_handler).post(handlers::create_assessment_handler),
        )
        .route("/assessments/{id}/progress", get(handlers::assessment_progress_handler))
        .route("/assessments/{id}/advance", post(handlers::advance_handler))
        .route("/assessments/{id}/reconcile", post(handlers::reconcile_handler))
        .route(
            "/assessments/{id}/participants",
            get(handlers::list_participants_handler).post(handlers::register_handler),
        )
        .route("/assessments/{id}/roster", post(handlers::import_handler))
        .route(
            "/assessments/{id}/workshops/{workshop}/responses",
            get(handlers::workshop_responses_handler),
        )
        .route(
            "/assessments/{id}/workshops/{workshop}/stats",
            get(handlers::submission_stats_handler),
        )
        .route(
            "/assessments/{id}/workshops/{workshop}/syntheses",
            get(handlers::list_syntheses_handler),
        )
        .route("/syntheses/{id}/approve", post(handlers::approve_synthesis_handler))
        .route("/participants/{id}", get(handlers::dashboard_handler))
        .route("/participants/{id}/onboarding", post(handlers::onboarding_handler))
        .route(
            "/participants/{id}/workshops/{workshop}",
            get(handlers::view_workshop_handler),
        )
        .route(
            "/participants/{id}/workshops/{workshop}/responses",
            post(handlers::save_responses_handler),
        )
        .route("/participants/{id}/complete", post(handlers::complete_handler))
        .route("/participants/{id}/unlock", post(handlers::unlock_handler))
        .route("/participants/{id}/reset", post(handlers::reset_handler))
        .route("/participants/{id}/logs", get(handlers::logs_handler))
        .route(
            "/participants/{id}/notifications/{notification}/read",
            post(handlers::mark_notification_read_handler),
        );

    match config.api_key.as_deref() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                ApiKey::new(key),
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED; set MANA_API_KEY to protect the API"
        ),
    }

    match create_rate_limiter(config.rate_limit) {
        Some(limiter) => {
            tracing::info!("rate limiting enabled: {} requests/second", config.rate_limit);
            router = router.layer(axum_middleware::from_fn_with_state(
                limiter,
                middleware::rate_limit_middleware,
            ));
        }
        None => tracing::info!("rate limiting disabled"),
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(4 * 1024 * 1024))
        .layer(build_cors_layer(config.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until the listener fails.
pub async fn run_server(state: AppState, config: &ServerConfig) -> Result<(), ManaError> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = create_router(state, config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ManaError::Io(format!("bind {} failed: {}", addr, e)))?;

    tracing::info!("MANA HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| ManaError::Io(format!("server error: {}", e)))
}
