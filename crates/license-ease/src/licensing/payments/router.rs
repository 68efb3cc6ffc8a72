use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    middleware::from_fn_with_state,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use super::domain::{
    CardIntentReceipt, CardIntentRequest, MobilePaymentReceipt, MobilePaymentRequest,
};
use super::service::PaymentCoordinator;
use super::webhook::SIGNATURE_HEADER;
use crate::access::{enforce_roles, AccessGate, Principal, ALL_ROLES};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::licensing::applications::ApplicationStore;

/// Payment initiation for authenticated callers plus the unauthenticated provider webhook.
pub fn payment_router<S>(gate: &AccessGate, coordinator: Arc<PaymentCoordinator<S>>) -> Router
where
    S: ApplicationStore + 'static,
{
    Router::new()
        .route(
            "/create-payment-intent",
            post(card_intent_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles)),
        )
        .route(
            "/process-mobile-payment",
            post(mobile_payment_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles)),
        )
        .route("/payment-webhook", post(webhook_handler::<S>))
        .with_state(coordinator)
}

pub(crate) async fn card_intent_handler<S>(
    State(coordinator): State<Arc<PaymentCoordinator<S>>>,
    principal: Principal,
    JsonBody(request): JsonBody<CardIntentRequest>,
) -> Result<Json<CardIntentReceipt>, ApiError>
where
    S: ApplicationStore + 'static,
{
    tracing::debug!(subject = %principal.subject_id, "card intent requested");
    let receipt = coordinator.create_card_intent_as(&principal, request).await?;
    Ok(Json(receipt))
}

pub(crate) async fn mobile_payment_handler<S>(
    State(coordinator): State<Arc<PaymentCoordinator<S>>>,
    principal: Principal,
    JsonBody(request): JsonBody<MobilePaymentRequest>,
) -> Result<Json<MobilePaymentReceipt>, ApiError>
where
    S: ApplicationStore + 'static,
{
    tracing::debug!(subject = %principal.subject_id, "mobile payment requested");
    let receipt = coordinator
        .initiate_mobile_payment_as(&principal, request)
        .await?;
    Ok(Json(receipt))
}

pub(crate) async fn webhook_handler<S>(
    State(coordinator): State<Arc<PaymentCoordinator<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError>
where
    S: ApplicationStore + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = coordinator.handle_provider_callback(&body, signature)?;
    Ok(Json(json!({
        "received": true,
        "outcome": outcome.label(),
    })))
}
