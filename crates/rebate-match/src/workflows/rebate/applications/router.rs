use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationIntake, ApplicationState, EvidenceId, EvidenceSubmission, RebateApplication,
};
use super::repository::EvidenceStore;
use super::service::{EvidenceError, RebateApplicationService, RebateServiceError};
use crate::workflows::lifecycle::{
    Actor, LifecycleId, LifecycleStore, StoreError, TransitionError,
};

/// Router builder exposing HTTP endpoints for intake, evidence, and
/// operator-driven transitions.
pub fn application_router<R, E>(service: Arc<RebateApplicationService<R, E>>) -> Router
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    Router::new()
        .route("/api/v1/rebate/applications", post(submit_handler::<R, E>))
        .route(
            "/api/v1/rebate/applications/:application_id",
            get(status_handler::<R, E>),
        )
        .route(
            "/api/v1/rebate/applications/:application_id/history",
            get(history_handler::<R, E>),
        )
        .route(
            "/api/v1/rebate/applications/:application_id/transitions",
            post(transition_handler::<R, E>),
        )
        .route(
            "/api/v1/rebate/applications/:application_id/evidence",
            post(evidence_handler::<R, E>),
        )
        .route(
            "/api/v1/rebate/evidence/:evidence_id/review",
            post(review_handler::<R, E>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    pub(crate) to: ApplicationState,
    #[serde(default)]
    pub(crate) actor: Option<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ReviewDecision {
    Verified,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub(crate) decision: ReviewDecision,
    #[serde(default)]
    pub(crate) actor: Option<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

fn operator(actor: Option<String>) -> Actor {
    Actor::Operator(actor.unwrap_or_else(|| "admin".to_string()))
}

pub(crate) async fn submit_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    axum::Json(intake): axum::Json<ApplicationIntake>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    match service
        .submit(intake)
        .and_then(|record| service.status_view(&record.id))
    {
        Ok(view) => (StatusCode::ACCEPTED, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    let id = LifecycleId(application_id);
    match service.status_view(&id) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    let id = LifecycleId(application_id);
    match service.get_history(&id) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    let id = LifecycleId(application_id);
    match service.request_transition(&id, request.to, operator(request.actor), request.reason) {
        Ok(_) => match service.status_view(&id) {
            Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
            Err(error) => error_response(error),
        },
        Err(error) => error_response(error),
    }
}

pub(crate) async fn evidence_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    Path(application_id): Path<String>,
    axum::Json(submission): axum::Json<EvidenceSubmission>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    let id = LifecycleId(application_id);
    match service.on_evidence_submitted(&id, submission) {
        Ok(ingest) => {
            let payload = json!({
                "evidence_id": ingest.item.id.0,
                "verification": ingest.item.verification.label(),
                "auto_advanced": ingest.auto_advanced,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<R, E>(
    State(service): State<Arc<RebateApplicationService<R, E>>>,
    Path(evidence_id): Path<String>,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response
where
    R: LifecycleStore<RebateApplication> + 'static,
    E: EvidenceStore + 'static,
{
    let id = EvidenceId(evidence_id);
    let actor = operator(request.actor);
    let outcome = match request.decision {
        ReviewDecision::Verified => service.verify_evidence(&id, actor),
        ReviewDecision::Rejected => service.reject_evidence(
            &id,
            actor,
            request.reason.unwrap_or_else(|| "unspecified".to_string()),
        ),
    };
    match outcome {
        Ok(item) => {
            let payload = json!({
                "evidence_id": item.id.0,
                "verification": item.verification.label(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: RebateServiceError) -> Response {
    let status = match &error {
        RebateServiceError::Transition(TransitionError::NotFound)
        | RebateServiceError::Store(StoreError::NotFound)
        | RebateServiceError::Evidence(EvidenceError::NotFound) => StatusCode::NOT_FOUND,
        RebateServiceError::Transition(TransitionError::InvalidTransition { .. })
        | RebateServiceError::DocumentsNotVerified { .. }
        | RebateServiceError::EvidenceMissing => StatusCode::UNPROCESSABLE_ENTITY,
        RebateServiceError::Transition(TransitionError::ConcurrentModification { .. })
        | RebateServiceError::Evidence(EvidenceError::AlreadyResolved { .. })
        | RebateServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
