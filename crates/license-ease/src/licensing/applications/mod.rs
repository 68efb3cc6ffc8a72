//! Application intake, review, and payment status.
//!
//! Submissions are validated and their documents uploaded before anything is persisted; every
//! later mutation goes through the store's compare-and-swap so concurrent reviewers and payment
//! callbacks never interleave partial writes.

pub mod domain;
pub mod intake;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, ApplicationType,
    FeeBreakdown, FileRecord, ListOrder, UploadedFile,
};
pub use intake::{sanitize_filename, stored_filename, FileIntakePolicy, FileRejection};
pub use repository::{ApplicationStore, DocumentStore, StorageError, StoreError};
pub use router::application_router;
pub use service::{
    ApplicationService, ApplicationServiceError, PaymentApplication, PaymentRecord,
};
