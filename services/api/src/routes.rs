use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;

use crate::infra::{AppState, Marketplace};
use rebate_match::workflows::contractor::onboarding::contractor_router;
use rebate_match::workflows::notifications::NotificationDispatcher;
use rebate_match::workflows::rebate::applications::application_router;

pub(crate) fn with_marketplace_routes(marketplace: &Marketplace) -> Router {
    let feed_routes = Router::new()
        .route(
            "/api/v1/notifications/:recipient",
            get(notifications_endpoint),
        )
        .route("/api/v1/notifications/retry", post(retry_endpoint))
        .with_state(marketplace.dispatcher.clone());

    application_router(marketplace.applications.clone())
        .merge(contractor_router(marketplace.contractors.clone()))
        .merge(feed_routes)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn notifications_endpoint(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    Path(recipient): Path<String>,
) -> Response {
    match dispatcher.notifications_for(&recipient) {
        Ok(notifications) => (StatusCode::OK, Json(notifications)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn retry_endpoint(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
) -> Response {
    match dispatcher.retry_undelivered() {
        Ok(delivered) => {
            let payload = json!({ "delivered": delivered.len() });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebate_match::workflows::notifications::{InMemoryNotificationFeed, TracingMailer};

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("ok"));
    }

    #[tokio::test]
    async fn notifications_endpoint_returns_empty_feed() {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(InMemoryNotificationFeed::default()),
            Arc::new(TracingMailer),
        ));
        let response = notifications_endpoint(
            State(dispatcher),
            Path("cust-nobody".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retry_endpoint_reports_zero_when_feed_is_clean() {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(InMemoryNotificationFeed::default()),
            Arc::new(TracingMailer),
        ));
        let response = retry_endpoint(State(dispatcher)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
