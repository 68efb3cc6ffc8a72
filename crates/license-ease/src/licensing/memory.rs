//! Process-local stores backing the development server, the demo, and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::applications::{
    Application, ApplicationId, ApplicationStore, DocumentStore, StorageError, StoreError,
};
use super::directory::{ClientProfile, Company, CompanyStore, ProfileStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default)]
struct ApplicationTable {
    order: Vec<ApplicationId>,
    records: HashMap<ApplicationId, Application>,
}

/// Application store preserving insertion order.
#[derive(Default)]
pub struct InMemoryApplicationStore {
    table: Mutex<ApplicationTable>,
}

impl ApplicationStore for InMemoryApplicationStore {
    fn create(&self, record: Application) -> Result<Application, StoreError> {
        let mut table = lock(&self.table)?;
        if table.records.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        table.order.push(record.id.clone());
        table.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        let table = lock(&self.table)?;
        Ok(table.records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Application>, StoreError> {
        let table = lock(&self.table)?;
        Ok(table
            .order
            .iter()
            .filter_map(|id| table.records.get(id).cloned())
            .collect())
    }

    fn compare_and_swap(
        &self,
        expected: &Application,
        updated: Application,
    ) -> Result<Application, StoreError> {
        let mut table = lock(&self.table)?;
        let current = table
            .records
            .get_mut(&expected.id)
            .ok_or(StoreError::NotFound)?;
        if current != expected || updated.id != expected.id {
            return Err(StoreError::StaleRecord);
        }
        *current = updated.clone();
        Ok(updated)
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<Vec<ClientProfile>>,
}

impl ProfileStore for InMemoryProfileStore {
    fn get(&self, email: &str) -> Result<Option<ClientProfile>, StoreError> {
        let profiles = lock(&self.profiles)?;
        Ok(profiles
            .iter()
            .find(|profile| profile.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn insert(&self, profile: ClientProfile) -> Result<ClientProfile, StoreError> {
        let mut profiles = lock(&self.profiles)?;
        if profiles
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&profile.email))
        {
            return Err(StoreError::Conflict);
        }
        profiles.push(profile.clone());
        Ok(profile)
    }

    fn compare_and_swap(
        &self,
        expected: &ClientProfile,
        updated: ClientProfile,
    ) -> Result<ClientProfile, StoreError> {
        let mut profiles = lock(&self.profiles)?;
        let current = profiles
            .iter_mut()
            .find(|profile| profile.email.eq_ignore_ascii_case(&expected.email))
            .ok_or(StoreError::NotFound)?;
        if current != expected || !updated.email.eq_ignore_ascii_case(&expected.email) {
            return Err(StoreError::StaleRecord);
        }
        *current = updated.clone();
        Ok(updated)
    }

    fn list(&self) -> Result<Vec<ClientProfile>, StoreError> {
        Ok(lock(&self.profiles)?.clone())
    }
}

#[derive(Default)]
pub struct InMemoryCompanyStore {
    companies: Mutex<Vec<Company>>,
}

impl CompanyStore for InMemoryCompanyStore {
    fn get(&self, id: &str) -> Result<Option<Company>, StoreError> {
        let companies = lock(&self.companies)?;
        Ok(companies.iter().find(|company| company.id == id).cloned())
    }

    fn find_by_owner(&self, owner_email: &str) -> Result<Option<Company>, StoreError> {
        let companies = lock(&self.companies)?;
        Ok(companies
            .iter()
            .find(|company| company.submitted_by.eq_ignore_ascii_case(owner_email))
            .cloned())
    }

    fn insert(&self, company: Company) -> Result<Company, StoreError> {
        let mut companies = lock(&self.companies)?;
        let taken = companies.iter().any(|existing| {
            existing.id == company.id
                || existing
                    .submitted_by
                    .eq_ignore_ascii_case(&company.submitted_by)
        });
        if taken {
            return Err(StoreError::Conflict);
        }
        companies.push(company.clone());
        Ok(company)
    }

    fn compare_and_swap(
        &self,
        expected: &Company,
        updated: Company,
    ) -> Result<Company, StoreError> {
        let mut companies = lock(&self.companies)?;
        let current = companies
            .iter_mut()
            .find(|company| company.id == expected.id)
            .ok_or(StoreError::NotFound)?;
        if current != expected || updated.id != expected.id {
            return Err(StoreError::StaleRecord);
        }
        *current = updated.clone();
        Ok(updated)
    }

    fn list(&self) -> Result<Vec<Company>, StoreError> {
        Ok(lock(&self.companies)?.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Document store keeping blobs in memory and handing out `memory://` URLs.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    blobs: Mutex<HashMap<String, StoredDocument>>,
}

impl InMemoryDocumentStore {
    pub fn fetch(&self, key: &str) -> Option<StoredDocument> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .lock()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upload(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("document mutex poisoned".to_string()))?;
        blobs.insert(
            key.to_string(),
            StoredDocument {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StorageError::Unavailable("document mutex poisoned".to_string()))?;
        blobs.remove(key);
        Ok(())
    }
}
