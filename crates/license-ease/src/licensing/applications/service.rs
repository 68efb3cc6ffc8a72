use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::domain::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, ApplicationType, FileRecord,
    ListOrder, UploadedFile,
};
use super::intake::{stored_filename, FileIntakePolicy, FileRejection};
use super::repository::{ApplicationStore, DocumentStore, StorageError, StoreError};
use crate::access::{AccessError, Principal};
use crate::licensing::catalog::FeeSchedule;
use crate::licensing::directory::DirectoryService;
use crate::licensing::ids::{generate_id, APPLICATION_PREFIX};

const MAX_WRITE_ATTEMPTS: usize = 8;
const UPLOAD_TOKEN_LEN: usize = 10;

/// Lifecycle manager composing the store, blob storage, fee schedule and directory.
pub struct ApplicationService<S> {
    store: Arc<S>,
    documents: Arc<dyn DocumentStore>,
    directory: Arc<DirectoryService>,
    catalog: Arc<FeeSchedule>,
    intake: FileIntakePolicy,
}

/// Confirmed payment to apply to an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

/// Result of applying a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentApplication {
    Applied(Application),
    AlreadyPaid(Application),
    UnknownApplication(ApplicationId),
}

struct Submission {
    applicant_name: String,
    applicant_email: String,
    applicant_phone: Option<String>,
    company: Option<String>,
    license_type: String,
    application_type: ApplicationType,
    description: String,
}

impl<S> ApplicationService<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        documents: Arc<dyn DocumentStore>,
        directory: Arc<DirectoryService>,
        catalog: Arc<FeeSchedule>,
        intake: FileIntakePolicy,
    ) -> Self {
        Self {
            store,
            documents,
            directory,
            catalog,
            intake,
        }
    }

    pub fn catalog(&self) -> &FeeSchedule {
        &self.catalog
    }

    pub fn intake(&self) -> &FileIntakePolicy {
        &self.intake
    }

    /// Validate, upload, and persist a new application in state `pending`.
    ///
    /// Nothing is uploaded until every field and file has passed validation, and the
    /// record is written last; a failed upload or write removes the blobs already stored.
    /// Blob keys carry the application id plus a per-attempt token, so no two submissions
    /// ever share a key.
    pub async fn submit(
        &self,
        fields: ApplicationFields,
        files: Vec<UploadedFile>,
        principal: Option<&Principal>,
    ) -> Result<Application, ApplicationServiceError> {
        let submission = validate_fields(fields, principal)?;
        if files.is_empty() {
            return Err(ApplicationServiceError::Validation(
                "at least one supporting document is required".into(),
            ));
        }
        for file in &files {
            self.intake.validate(&file.filename, file.size())?;
        }

        let fees = self
            .catalog
            .quote(&submission.license_type, submission.application_type);
        let now = Utc::now();
        let template = Application {
            id: ApplicationId(String::new()),
            applicant_name: submission.applicant_name,
            applicant_email: submission.applicant_email,
            applicant_phone: submission.applicant_phone,
            company: submission.company,
            license_type: submission.license_type,
            application_type: submission.application_type,
            description: submission.description,
            files: Vec::new(),
            status: ApplicationStatus::Pending,
            fees,
            processing_notes: Vec::new(),
            submitted_by: principal.map(|principal| principal.subject_id.clone()),
            payment_reference: None,
            paid_at: None,
            submitted_at: now,
            updated_at: now,
        };

        let mut last_id = template.id.clone();
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (id, upload_token) = self.fresh_identity();
            let prefix = format!("documents/{id}/{upload_token}");
            let (records, uploaded_keys) = self.upload_documents(&prefix, &files, now).await?;

            let mut draft = template.clone();
            draft.id = id.clone();
            draft.files = records;
            match self.store.create(draft) {
                Ok(stored) => {
                    tracing::info!(
                        application_id = %stored.id,
                        license_type = %stored.license_type,
                        files = stored.files.len(),
                        total = stored.fees.total,
                        "application submitted"
                    );
                    self.refresh_directory(&stored.applicant_email);
                    return Ok(stored);
                }
                // lost a race for the id between the check and the insert
                Err(StoreError::Conflict) => {
                    self.discard_uploads(&uploaded_keys).await;
                    tracing::debug!(
                        application_id = %id,
                        attempt,
                        "application id taken, retrying"
                    );
                    last_id = id;
                }
                Err(other) => {
                    self.discard_uploads(&uploaded_keys).await;
                    return Err(other.into());
                }
            }
        }
        Err(ApplicationServiceError::Contention(last_id))
    }

    /// Fetch an application regardless of owner.
    pub fn get(&self, id: &ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.store
            .get(id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))
    }

    /// Fetch an application as `principal` sees it; clients only see their own.
    pub fn get_for(
        &self,
        id: &ApplicationId,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        let application = self.get(id)?;
        if principal.role.can_review() {
            return Ok(application);
        }
        match principal.email.as_deref() {
            Some(email) if application.is_owned_by(email) => Ok(application),
            _ => Err(ApplicationServiceError::NotFound(id.clone())),
        }
    }

    /// Applications in submission order, optionally filtered by applicant email.
    pub fn list(
        &self,
        owner_email: Option<&str>,
        order: ListOrder,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        let mut applications = self.store.list()?;
        if let Some(owner) = owner_email {
            applications.retain(|application| application.is_owned_by(owner));
        }
        if order == ListOrder::Recent {
            // stable sort keeps submission order among equal timestamps
            applications.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        }
        Ok(applications)
    }

    /// Reviewer view is unscoped; every other role sees applications under its email claim.
    pub fn list_for(
        &self,
        principal: &Principal,
        order: ListOrder,
    ) -> Result<Vec<Application>, ApplicationServiceError> {
        if principal.role.can_review() {
            return self.list(None, order);
        }
        let email = principal.email.as_deref().ok_or_else(|| {
            ApplicationServiceError::Validation(
                "an email claim is required to list your applications".into(),
            )
        })?;
        self.list(Some(email), order)
    }

    pub fn append_note(
        &self,
        id: &ApplicationId,
        note: &str,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        ensure_reviewer(principal)?;
        let note = note.trim();
        if note.is_empty() {
            return Err(ApplicationServiceError::Validation(
                "note must not be empty".into(),
            ));
        }

        let (updated, _) = self.mutate(id, |application| {
            application.processing_notes.push(note.to_string());
            Ok(true)
        })?;
        tracing::info!(
            application_id = %id,
            reviewer = %principal.subject_id,
            "processing note appended"
        );
        Ok(updated)
    }

    /// Reviewer status change; terminal states can never be left.
    pub fn set_status(
        &self,
        id: &ApplicationId,
        next: ApplicationStatus,
        note: Option<&str>,
        principal: &Principal,
    ) -> Result<Application, ApplicationServiceError> {
        ensure_reviewer(principal)?;
        let note = note.map(str::trim).filter(|note| !note.is_empty());

        let (updated, _) = self.mutate(id, |application| {
            if !application.status.can_transition_to(next) {
                return Err(ApplicationServiceError::InvalidTransition {
                    current: application.status,
                    requested: next,
                });
            }
            application.status = next;
            if let Some(note) = note {
                application.processing_notes.push(note.to_string());
            }
            Ok(true)
        })?;

        tracing::info!(
            application_id = %id,
            status = next.label(),
            reviewer = %principal.subject_id,
            "application status changed"
        );
        self.refresh_directory(&updated.applicant_email);
        Ok(updated)
    }

    /// Marks the application paid and moves `pending` to `under_review`.
    ///
    /// Replays are no-ops: an application that is already paid is returned unchanged.
    pub fn record_payment(
        &self,
        id: &ApplicationId,
        payment: &PaymentRecord,
    ) -> Result<PaymentApplication, ApplicationServiceError> {
        let result = self.mutate(id, |application| {
            if application.fees.paid {
                return Ok(false);
            }
            application.fees.paid = true;
            application.paid_at = Some(payment.paid_at);
            application.payment_reference = Some(payment.reference.clone());
            if application.status == ApplicationStatus::Pending {
                application.status = ApplicationStatus::UnderReview;
            }
            Ok(true)
        });

        match result {
            Ok((application, true)) => {
                tracing::info!(
                    application_id = %id,
                    reference = %payment.reference,
                    status = application.status.label(),
                    "payment applied"
                );
                self.refresh_directory(&application.applicant_email);
                Ok(PaymentApplication::Applied(application))
            }
            Ok((application, false)) => {
                tracing::info!(application_id = %id, "payment already recorded, ignoring replay");
                Ok(PaymentApplication::AlreadyPaid(application))
            }
            Err(ApplicationServiceError::NotFound(missing)) => {
                Ok(PaymentApplication::UnknownApplication(missing))
            }
            Err(other) => Err(other),
        }
    }

    /// Read-modify-write under compare-and-swap; `change` returns whether anything changed.
    fn mutate<F>(
        &self,
        id: &ApplicationId,
        mut change: F,
    ) -> Result<(Application, bool), ApplicationServiceError>
    where
        F: FnMut(&mut Application) -> Result<bool, ApplicationServiceError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.get(id)?;
            let mut updated = current.clone();
            if !change(&mut updated)? {
                return Ok((current, false));
            }
            updated.updated_at = Utc::now();

            match self.store.compare_and_swap(&current, updated) {
                Ok(stored) => return Ok((stored, true)),
                Err(StoreError::StaleRecord) => {
                    tracing::debug!(application_id = %id, attempt, "stale application record, retrying");
                }
                Err(StoreError::NotFound) => {
                    return Err(ApplicationServiceError::NotFound(id.clone()))
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::warn!(application_id = %id, "giving up after repeated write conflicts");
        Err(ApplicationServiceError::Contention(id.clone()))
    }

    /// Draws an unused application id and a random token scoping this attempt's uploads.
    fn fresh_identity(&self) -> (ApplicationId, String) {
        let mut rng = rand::thread_rng();
        let store = &self.store;
        let id = generate_id(&mut rng, APPLICATION_PREFIX, |candidate| {
            matches!(store.get(&ApplicationId::from(candidate)), Ok(Some(_)))
        });
        let upload_token: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(UPLOAD_TOKEN_LEN)
            .map(|byte| char::from(byte).to_ascii_lowercase())
            .collect();
        (ApplicationId(id), upload_token)
    }

    /// Uploads every file under `prefix`; on failure the blobs already stored are removed.
    async fn upload_documents(
        &self,
        prefix: &str,
        files: &[UploadedFile],
        now: DateTime<Utc>,
    ) -> Result<(Vec<FileRecord>, Vec<String>), ApplicationServiceError> {
        let mut records = Vec::with_capacity(files.len());
        let mut uploaded_keys = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let stored = stored_filename(&file.filename, now);
            // the index keeps same-named files of one submission apart
            let key = format!("{prefix}/{}_{stored}", index + 1);
            let content_type = mime_guess::from_path(&file.filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string();

            let url = match self
                .documents
                .upload(&key, file.content.clone(), &content_type)
                .await
            {
                Ok(url) => url,
                Err(err) => {
                    self.discard_uploads(&uploaded_keys).await;
                    return Err(err.into());
                }
            };
            uploaded_keys.push(key);
            records.push(FileRecord {
                file_type: file.file_type.clone(),
                filename: stored,
                original_filename: file.filename.clone(),
                url,
                size: file.size(),
                content_type: Some(content_type),
                uploaded_at: now,
            });
        }
        Ok((records, uploaded_keys))
    }

    async fn discard_uploads(&self, keys: &[String]) {
        for key in keys {
            if let Err(err) = self.documents.delete(key).await {
                tracing::warn!(%key, error = %err, "failed to remove orphaned upload");
            }
        }
    }

    /// Recomputes the applicant's profile; failures are logged, never surfaced.
    fn refresh_directory(&self, email: &str) {
        if let Err(err) = self.directory.refresh_client(email, || self.store.list()) {
            tracing::warn!(%email, error = %err, "client profile refresh failed");
        }
    }
}

fn ensure_reviewer(principal: &Principal) -> Result<(), ApplicationServiceError> {
    if principal.role.can_review() {
        Ok(())
    } else {
        Err(AccessError::Forbidden {
            role: principal.role.label().to_string(),
        }
        .into())
    }
}

fn validate_fields(
    fields: ApplicationFields,
    principal: Option<&Principal>,
) -> Result<Submission, ApplicationServiceError> {
    let claimed_email = principal.and_then(|principal| principal.email.clone());

    let applicant_email = present(fields.applicant_email)
        .or_else(|| claimed_email.clone())
        .ok_or_else(|| missing("applicant_email"))?;
    let applicant_name = present(fields.applicant_name)
        .or(claimed_email)
        .ok_or_else(|| missing("applicant_name"))?;
    let license_type = present(fields.license_type).ok_or_else(|| missing("license_type"))?;
    let description = present(fields.description).ok_or_else(|| missing("description"))?;

    if !applicant_email.contains('@') {
        return Err(ApplicationServiceError::Validation(format!(
            "applicant_email '{applicant_email}' is not a valid email address"
        )));
    }

    let application_type = match fields.application_type.as_deref() {
        None => ApplicationType::default(),
        Some(raw) => ApplicationType::parse(raw).ok_or_else(|| {
            ApplicationServiceError::Validation(format!("unknown application_type '{raw}'"))
        })?,
    };

    Ok(Submission {
        applicant_name,
        applicant_email,
        applicant_phone: present(fields.applicant_phone),
        company: present(fields.company),
        license_type,
        application_type,
        description,
    })
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn missing(field: &str) -> ApplicationServiceError {
    ApplicationServiceError::Validation(format!("missing required field: {field}"))
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    File(#[from] FileRejection),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("cannot move application from {} to {}", .current.label(), .requested.label())]
    InvalidTransition {
        current: ApplicationStatus,
        requested: ApplicationStatus,
    },
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("application {0} kept changing during update")]
    Contention(ApplicationId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
