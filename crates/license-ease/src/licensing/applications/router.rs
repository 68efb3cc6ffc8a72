use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, ListOrder, UploadedFile,
};
use super::repository::ApplicationStore;
use super::service::ApplicationService;
use crate::access::{enforce_roles, AccessGate, Principal, ALL_ROLES, CLIENT_ONLY, REVIEWERS};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::licensing::catalog::LicenseCategory;

/// Room for several maximum-size documents plus the text fields.
const FILES_PER_SUBMISSION: u64 = 8;

/// Router exposing submission, listing, review, and the public fee catalog.
pub fn application_router<S>(gate: &AccessGate, service: Arc<ApplicationService<S>>) -> Router
where
    S: ApplicationStore + 'static,
{
    let body_limit = service
        .intake()
        .max_bytes()
        .saturating_mul(FILES_PER_SUBMISSION)
        .saturating_add(1024 * 1024);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/services", get(services_handler::<S>))
        .route(
            "/applications",
            get(list_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles))
                .merge(
                    post(submit_handler::<S>)
                        .layer(DefaultBodyLimit::max(body_limit))
                        .route_layer(from_fn_with_state(gate.permit(CLIENT_ONLY), enforce_roles)),
                ),
        )
        .route(
            "/applications/:application_id",
            get(detail_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(ALL_ROLES), enforce_roles)),
        )
        .route(
            "/applications/:application_id/notes",
            post(note_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(REVIEWERS), enforce_roles)),
        )
        .route(
            "/applications/:application_id/status",
            post(status_handler::<S>)
                .route_layer(from_fn_with_state(gate.permit(REVIEWERS), enforce_roles)),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub order: ListOrder,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

pub(crate) async fn services_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
) -> Json<Vec<LicenseCategory>>
where
    S: ApplicationStore + 'static,
{
    Json(service.catalog().categories().to_vec())
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    principal: Principal,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    S: ApplicationStore + 'static,
{
    let mut fields = ApplicationFields::default();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) if !filename.is_empty() => {
                let content = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::Validation(err.body_text()))?;
                files.push(UploadedFile::new(name, filename, content.to_vec()));
            }
            // browsers send an empty part for file inputs left blank
            Some(_) => {}
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::Validation(err.body_text()))?;
                assign_field(&mut fields, &name, value);
            }
        }
    }

    let application = service.submit(fields, files, Some(&principal)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Application submitted.",
            "data": application,
        })),
    ))
}

fn assign_field(fields: &mut ApplicationFields, name: &str, value: String) {
    let slot = match name {
        "applicant_name" | "name" => &mut fields.applicant_name,
        "applicant_email" | "email" => &mut fields.applicant_email,
        "applicant_phone" | "phone" => &mut fields.applicant_phone,
        "company" => &mut fields.company,
        "license_type" => &mut fields.license_type,
        "application_type" => &mut fields.application_type,
        "description" => &mut fields.description,
        other => {
            tracing::debug!(field = other, "ignoring unknown submission field");
            return;
        }
    };
    *slot = Some(value);
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Application>>, ApiError>
where
    S: ApplicationStore + 'static,
{
    let applications = service.list_for(&principal, query.order)?;
    Ok(Json(applications))
}

pub(crate) async fn detail_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    principal: Principal,
    Path(application_id): Path<String>,
) -> Result<Json<Application>, ApiError>
where
    S: ApplicationStore + 'static,
{
    let application = service.get_for(&ApplicationId(application_id), &principal)?;
    Ok(Json(application))
}

pub(crate) async fn note_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    principal: Principal,
    Path(application_id): Path<String>,
    JsonBody(request): JsonBody<NoteRequest>,
) -> Result<Json<Application>, ApiError>
where
    S: ApplicationStore + 'static,
{
    let note = request
        .note
        .ok_or_else(|| ApiError::Validation("note is required".into()))?;
    let application = service.append_note(&ApplicationId(application_id), &note, &principal)?;
    Ok(Json(application))
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    principal: Principal,
    Path(application_id): Path<String>,
    JsonBody(request): JsonBody<StatusRequest>,
) -> Result<Json<Application>, ApiError>
where
    S: ApplicationStore + 'static,
{
    let raw = request
        .status
        .ok_or_else(|| ApiError::Validation("status is required".into()))?;
    let status = ApplicationStatus::parse(&raw)
        .ok_or_else(|| ApiError::Validation(format!("unknown status '{raw}'")))?;

    let application = service.set_status(
        &ApplicationId(application_id),
        status,
        request.note.as_deref(),
        &principal,
    )?;
    Ok(Json(application))
}
