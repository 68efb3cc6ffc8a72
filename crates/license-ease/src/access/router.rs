use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::gate::{enforce_roles, AccessGate, ADMIN_ONLY};
use super::identity::{Principal, RoleAssigner};
use crate::error::ApiError;
use crate::extract::JsonBody;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Role administration endpoints, admin only.
pub fn access_router(gate: &AccessGate, assigner: Arc<dyn RoleAssigner>) -> Router {
    Router::new()
        .route(
            "/set-role",
            post(set_role_handler)
                .route_layer(from_fn_with_state(gate.permit(ADMIN_ONLY), enforce_roles)),
        )
        .with_state(assigner)
}

pub(crate) async fn set_role_handler(
    State(assigner): State<Arc<dyn RoleAssigner>>,
    principal: Principal,
    JsonBody(request): JsonBody<SetRoleRequest>,
) -> Result<Json<Value>, ApiError> {
    let uid = non_empty(request.uid);
    let role = non_empty(request.role);
    let (Some(uid), Some(role)) = (uid, role) else {
        return Err(ApiError::Validation("UID and role are required".into()));
    };

    assigner
        .assign_role(&uid, &role)
        .await
        .map_err(|err| ApiError::IdentityProvider(err.to_string()))?;

    tracing::info!(admin = %principal.subject_id, %uid, %role, "role assigned");
    Ok(Json(json!({ "message": format!("Role '{role}' set for user {uid}") })))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
