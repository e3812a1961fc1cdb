use crate::billing::ProvisioningError;
use crate::store::StoreError;

use super::value_objects::{ContactAddress, SubjectId};

// ============================================================================
// Subject Lifecycle Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Contact address already registered: {0}")]
    DuplicateAddress(ContactAddress),

    #[error("Subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// The subject record was committed; only the billing account is missing.
    #[error("Subject {subject_id} was registered but account provisioning failed: {source}")]
    ProvisioningFailed {
        subject_id: SubjectId,
        #[source]
        source: ProvisioningError,
    },

    #[error("Invalid subject: {0}")]
    InvalidSubject(&'static str),

    #[error("Store failure: {0}")]
    Store(#[source] StoreError),
}

impl LifecycleError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::DuplicateAddress(_) => "duplicate_address",
            LifecycleError::SubjectNotFound(_) => "subject_not_found",
            LifecycleError::ProvisioningFailed { .. } => "provisioning_failure",
            LifecycleError::InvalidSubject(_) => "invalid_subject",
            LifecycleError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAddress(address) => LifecycleError::DuplicateAddress(address),
            StoreError::NotFound(id) => LifecycleError::SubjectNotFound(id),
            other => LifecycleError::Store(other),
        }
    }
}
