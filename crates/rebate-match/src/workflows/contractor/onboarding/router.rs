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

use super::domain::{ContractorIntake, ContractorRecord, ContractorState};
use super::service::{ContractorOnboardingService, OnboardingServiceError};
use crate::workflows::lifecycle::{Actor, LifecycleId, LifecycleStore, StoreError, TransitionError};

/// Router builder exposing HTTP endpoints for contractor onboarding.
pub fn contractor_router<R>(service: Arc<ContractorOnboardingService<R>>) -> Router
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    Router::new()
        .route("/api/v1/contractors", post(register_handler::<R>))
        .route(
            "/api/v1/contractors/:contractor_id",
            get(status_handler::<R>),
        )
        .route(
            "/api/v1/contractors/:contractor_id/history",
            get(history_handler::<R>),
        )
        .route(
            "/api/v1/contractors/:contractor_id/transitions",
            post(transition_handler::<R>),
        )
        .route(
            "/api/v1/contractors/:contractor_id/state-approval",
            post(state_approval_handler::<R>),
        )
        .route(
            "/api/v1/contractors/:contractor_id/fast-track",
            post(fast_track_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    pub(crate) to: ContractorState,
    #[serde(default)]
    pub(crate) actor: Option<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OperatorRequest {
    #[serde(default)]
    pub(crate) actor: Option<String>,
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

fn operator(actor: Option<String>) -> Actor {
    Actor::Operator(actor.unwrap_or_else(|| "admin".to_string()))
}

pub(crate) async fn register_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    axum::Json(intake): axum::Json<ContractorIntake>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    match service.register(intake) {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    Path(contractor_id): Path<String>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    let id = LifecycleId(contractor_id);
    match service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    Path(contractor_id): Path<String>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    let id = LifecycleId(contractor_id);
    match service.get_history(&id) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transition_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    Path(contractor_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    let id = LifecycleId(contractor_id);
    match service.request_transition(&id, request.to, operator(request.actor), request.reason) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn state_approval_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    Path(contractor_id): Path<String>,
    axum::Json(request): axum::Json<OperatorRequest>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    let id = LifecycleId(contractor_id);
    match service.record_state_approval(&id, operator(request.actor)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fast_track_handler<R>(
    State(service): State<Arc<ContractorOnboardingService<R>>>,
    Path(contractor_id): Path<String>,
    axum::Json(request): axum::Json<OperatorRequest>,
) -> Response
where
    R: LifecycleStore<ContractorRecord> + 'static,
{
    let id = LifecycleId(contractor_id);
    match service.fast_track_approval(&id, operator(request.actor), request.reason) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: OnboardingServiceError) -> Response {
    let status = match &error {
        OnboardingServiceError::Transition(TransitionError::NotFound)
        | OnboardingServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        OnboardingServiceError::Transition(TransitionError::InvalidTransition { .. })
        | OnboardingServiceError::StateApprovalPending
        | OnboardingServiceError::FastTrackRequired => StatusCode::UNPROCESSABLE_ENTITY,
        OnboardingServiceError::Transition(TransitionError::ConcurrentModification { .. })
        | OnboardingServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
