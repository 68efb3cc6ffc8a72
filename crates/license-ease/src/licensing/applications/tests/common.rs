use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Map, Value};

use crate::access::{
    AccessGate, IdentityVerifier, Principal, Role, RoleClaimPolicy, VerifiedClaims,
};
use crate::licensing::applications::{
    application_router, Application, ApplicationFields, ApplicationId, ApplicationService,
    ApplicationStore, DocumentStore, FileIntakePolicy, StorageError, StoreError, UploadedFile,
};
use crate::licensing::catalog::FeeSchedule;
use crate::licensing::directory::DirectoryService;
use crate::licensing::memory::{
    InMemoryApplicationStore, InMemoryCompanyStore, InMemoryProfileStore,
};

pub(super) const BOUNDARY: &str = "license-ease-test-boundary";

pub(super) fn fields() -> ApplicationFields {
    ApplicationFields {
        applicant_name: Some("Ada Uwase".to_string()),
        applicant_email: Some("ada@example.com".to_string()),
        applicant_phone: Some("+250788000111".to_string()),
        company: Some("Acme Trading".to_string()),
        license_type: Some("X".to_string()),
        application_type: None,
        description: Some("d".to_string()),
    }
}

pub(super) fn fields_for(email: &str) -> ApplicationFields {
    ApplicationFields {
        applicant_email: Some(email.to_string()),
        ..fields()
    }
}

pub(super) fn document(name: &str, size: usize) -> UploadedFile {
    UploadedFile::new("business_registration", name, vec![0u8; size])
}

pub(super) fn client(email: &str) -> Principal {
    Principal::new(format!("uid-{email}"), Some(email.to_string()), Role::Client)
}

pub(super) fn officer() -> Principal {
    Principal::new(
        "uid-officer",
        Some("officer@rdb.rw".to_string()),
        Role::Officer,
    )
}

pub(super) struct Harness<S> {
    pub(super) service: Arc<ApplicationService<S>>,
    pub(super) store: Arc<S>,
    pub(super) documents: Arc<MemoryDocuments>,
    pub(super) directory: Arc<DirectoryService>,
}

pub(super) fn harness_with<S>(store: S, documents: MemoryDocuments) -> Harness<S>
where
    S: ApplicationStore + 'static,
{
    let store = Arc::new(store);
    let documents = Arc::new(documents);
    let directory = Arc::new(DirectoryService::new(
        Arc::new(InMemoryProfileStore::default()),
        Arc::new(InMemoryCompanyStore::default()),
    ));
    let service = Arc::new(ApplicationService::new(
        store.clone(),
        documents.clone(),
        directory.clone(),
        Arc::new(FeeSchedule::standard()),
        FileIntakePolicy::default(),
    ));
    Harness {
        service,
        store,
        documents,
        directory,
    }
}

pub(super) fn harness() -> Harness<InMemoryApplicationStore> {
    harness_with(
        InMemoryApplicationStore::default(),
        MemoryDocuments::default(),
    )
}

/// Blob store that remembers uploads and deletions; can fail the n-th upload.
#[derive(Default)]
pub(super) struct MemoryDocuments {
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_upload_number: Option<usize>,
}

impl MemoryDocuments {
    pub(super) fn failing_on(upload_number: usize) -> Self {
        Self {
            fail_upload_number: Some(upload_number),
            ..Self::default()
        }
    }

    pub(super) fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().expect("upload mutex poisoned").clone()
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("delete mutex poisoned").clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn upload(
        &self,
        key: &str,
        _content: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let mut uploaded = self.uploaded.lock().expect("upload mutex poisoned");
        if self.fail_upload_number == Some(uploaded.len() + 1) {
            return Err(StorageError::Unavailable("bucket offline".to_string()));
        }
        uploaded.push(key.to_string());
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deleted
            .lock()
            .expect("delete mutex poisoned")
            .push(key.to_string());
        Ok(())
    }
}

/// Store whose writes are always refused.
#[derive(Default)]
pub(super) struct UnavailableStore;

impl ApplicationStore for UnavailableStore {
    fn create(&self, _record: Application) -> Result<Application, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn get(&self, _id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        Ok(None)
    }

    fn list(&self) -> Result<Vec<Application>, StoreError> {
        Ok(Vec::new())
    }

    fn compare_and_swap(
        &self,
        _expected: &Application,
        _updated: Application,
    ) -> Result<Application, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Wraps the in-memory store and injects id conflicts and stale writes.
#[derive(Default)]
pub(super) struct ContendedStore {
    inner: InMemoryApplicationStore,
    pub(super) conflicting_creates: AtomicUsize,
    pub(super) stale_swaps: AtomicUsize,
    pub(super) create_calls: AtomicUsize,
    pub(super) swap_calls: AtomicUsize,
}

impl ContendedStore {
    pub(super) fn new(conflicting_creates: usize, stale_swaps: usize) -> Self {
        Self {
            conflicting_creates: AtomicUsize::new(conflicting_creates),
            stale_swaps: AtomicUsize::new(stale_swaps),
            ..Self::default()
        }
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl ApplicationStore for ContendedStore {
    fn create(&self, record: Application) -> Result<Application, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.conflicting_creates) {
            return Err(StoreError::Conflict);
        }
        self.inner.create(record)
    }

    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<Application>, StoreError> {
        self.inner.list()
    }

    fn compare_and_swap(
        &self,
        expected: &Application,
        updated: Application,
    ) -> Result<Application, StoreError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.stale_swaps) {
            return Err(StoreError::StaleRecord);
        }
        self.inner.compare_and_swap(expected, updated)
    }
}

/// Accepts `<email>:<role>` bearer tokens.
pub(super) struct EmailRoleVerifier;

#[async_trait]
impl IdentityVerifier for EmailRoleVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, String> {
        let (email, role) = token
            .split_once(':')
            .ok_or_else(|| "token must be <email>:<role>".to_string())?;
        let mut claims = Map::new();
        claims.insert("email".to_string(), json!(email));
        claims.insert("role".to_string(), json!(role));
        Ok(VerifiedClaims {
            subject: format!("uid-{email}"),
            claims,
        })
    }
}

pub(super) fn router_for(harness: &Harness<InMemoryApplicationStore>) -> Router {
    let gate = AccessGate::new(Arc::new(EmailRoleVerifier), RoleClaimPolicy::default());
    application_router(&gate, harness.service.clone())
}

/// Hand-built `multipart/form-data` body.
pub(super) fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn submission_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post("/applications").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).expect("request builds")
}

pub(super) fn json_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
