// ============================================================================
// Subject Store - persistence port
// ============================================================================
//
// The store is the only shared mutable resource in the write path. Every
// implementation must make `save` reject a contact address held by another
// live subject, atomically with the write itself; the orchestrator's
// `exists_by_address` pre-check is only a fast path.
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::domain::subject::{ContactAddress, Subject, SubjectId, SubjectProfile};

pub use memory::{InMemorySubjectStore, StoreCall};
pub use postgres::PgSubjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Contact address already registered: {0}")]
    DuplicateAddress(ContactAddress),

    #[error("Subject not found: {0}")]
    NotFound(SubjectId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// All subjects in insertion order.
    async fn find_all(&self) -> Result<Vec<Subject>, StoreError>;

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, StoreError>;

    async fn exists_by_address(&self, address: &ContactAddress) -> Result<bool, StoreError>;

    /// Like `exists_by_address`, ignoring the record owned by `id`.
    async fn exists_by_address_excluding(
        &self,
        address: &ContactAddress,
        id: SubjectId,
    ) -> Result<bool, StoreError>;

    /// Insert when `id` is `None` (the store assigns the identifier), otherwise
    /// replace every mutable field of the existing record.
    async fn save(&self, id: Option<SubjectId>, profile: SubjectProfile) -> Result<Subject, StoreError>;

    async fn delete_by_id(&self, id: SubjectId) -> Result<(), StoreError>;
}
