use std::sync::Arc;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};

use super::domain::{ClientProfile, Company, CompanyDraft};
use super::service::DirectoryService;
use crate::access::{enforce_roles, AccessGate, Principal, ALL_ROLES, CLIENT_ONLY, REVIEWERS};
use crate::error::ApiError;
use crate::extract::JsonBody;

/// Client profile and company endpoints.
pub fn directory_router(gate: &AccessGate, directory: Arc<DirectoryService>) -> Router {
    Router::new()
        .route(
            "/clients",
            get(clients_handler)
                .route_layer(from_fn_with_state(gate.permit(REVIEWERS), enforce_roles)),
        )
        .route(
            "/clients/me",
            get(own_profile_handler)
                .route_layer(from_fn_with_state(gate.permit(CLIENT_ONLY), enforce_roles)),
        )
        .route(
            "/companies",
            get(companies_handler)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles))
                .merge(
                    post(register_company_handler)
                        .route_layer(from_fn_with_state(gate.permit(CLIENT_ONLY), enforce_roles)),
                ),
        )
        .with_state(directory)
}

fn principal_email(principal: &Principal) -> Result<&str, ApiError> {
    principal
        .email
        .as_deref()
        .ok_or_else(|| {
            ApiError::Validation("an email claim is required for this operation".into())
        })
}

pub(crate) async fn clients_handler(
    State(directory): State<Arc<DirectoryService>>,
) -> Result<Json<Vec<ClientProfile>>, ApiError> {
    Ok(Json(directory.clients()?))
}

pub(crate) async fn own_profile_handler(
    State(directory): State<Arc<DirectoryService>>,
    principal: Principal,
) -> Result<Json<ClientProfile>, ApiError> {
    let email = principal_email(&principal)?;
    Ok(Json(directory.client(email)?))
}

pub(crate) async fn companies_handler(
    State(directory): State<Arc<DirectoryService>>,
    principal: Principal,
) -> Result<Json<Vec<Company>>, ApiError> {
    let companies = if principal.role.can_review() {
        directory.companies(None)?
    } else {
        directory.companies(Some(principal_email(&principal)?))?
    };
    Ok(Json(companies))
}

pub(crate) async fn register_company_handler(
    State(directory): State<Arc<DirectoryService>>,
    principal: Principal,
    JsonBody(draft): JsonBody<CompanyDraft>,
) -> Result<Json<Company>, ApiError> {
    let email = principal_email(&principal)?;
    Ok(Json(directory.register_company(email, draft)?))
}
