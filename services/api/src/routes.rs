use crate::infra::{AppState, LicenseServices};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use license_ease::access::access_router;
use license_ease::licensing::applications::application_router;
use license_ease::licensing::directory::directory_router;
use license_ease::licensing::documents::document_router;
use license_ease::licensing::payments::payment_router;
use serde_json::json;

pub(crate) fn with_license_routes(services: &LicenseServices) -> Router {
    let gate = &services.gate;

    Router::new()
        .route("/", get(root))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .merge(access_router(gate, services.roles.clone()))
        .merge(application_router(gate, services.applications.clone()))
        .merge(payment_router(gate, services.payments.clone()))
        .merge(directory_router(gate, services.directory.clone()))
        .merge(document_router(gate, services.classifier.clone()))
}

pub(crate) async fn root() -> &'static str {
    "LicenseEase backend is running"
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
