//! Denormalised client profiles and owner-keyed company records.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    AccountStatus, ClientProfile, Company, CompanyDraft, CompanyStatus, Representative,
    CLIENT_ROLE,
};
pub use repository::{CompanyStore, ProfileStore};
pub use router::directory_router;
pub use service::{DirectoryError, DirectoryService};
