use super::domain::{ClientProfile, Company};
use crate::licensing::applications::StoreError;

/// Client profiles keyed by lower-cased email.
pub trait ProfileStore: Send + Sync {
    fn get(&self, email: &str) -> Result<Option<ClientProfile>, StoreError>;
    /// Fails with `Conflict` when a profile already exists for the email.
    fn insert(&self, profile: ClientProfile) -> Result<ClientProfile, StoreError>;
    fn compare_and_swap(
        &self,
        expected: &ClientProfile,
        updated: ClientProfile,
    ) -> Result<ClientProfile, StoreError>;
    fn list(&self) -> Result<Vec<ClientProfile>, StoreError>;
}

/// Companies, unique both by id and by owner email.
pub trait CompanyStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Company>, StoreError>;
    fn find_by_owner(&self, owner_email: &str) -> Result<Option<Company>, StoreError>;
    /// Fails with `Conflict` when the id or the owner is already taken.
    fn insert(&self, company: Company) -> Result<Company, StoreError>;
    fn compare_and_swap(&self, expected: &Company, updated: Company)
        -> Result<Company, StoreError>;
    fn list(&self) -> Result<Vec<Company>, StoreError>;
}
