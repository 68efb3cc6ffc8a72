use async_trait::async_trait;

use super::domain::{Application, ApplicationId};

/// Storage abstraction for application documents.
///
/// `create` must check-and-insert atomically so two submissions can never claim the same
/// id, and `compare_and_swap` is the only way to mutate a stored record.
pub trait ApplicationStore: Send + Sync {
    fn create(&self, record: Application) -> Result<Application, StoreError>;
    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;
    /// All records in insertion order.
    fn list(&self) -> Result<Vec<Application>, StoreError>;
    /// Replaces the stored record only if it still equals `expected`.
    fn compare_and_swap(
        &self,
        expected: &Application,
        updated: Application,
    ) -> Result<Application, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed since it was read")]
    StaleRecord,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Blob store boundary for uploaded documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `content` under `key` and returns a retrievable URL.
    async fn upload(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
}
