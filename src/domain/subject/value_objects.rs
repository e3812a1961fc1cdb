use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::LifecycleError;

// ============================================================================
// Subject Value Objects
// ============================================================================

/// Registry-assigned subject identifier. Only a store mints new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for SubjectId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Contact address that must be unique across live subjects.
///
/// Comparison is exact and case-sensitive; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactAddress(String);

impl ContactAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The mutable fields of a subject. Updates replace all of them at once.
///
/// Fields are private: a profile is built through [`SubjectProfile::new`] or
/// the `with_*` methods, all of which re-check the name and address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    name: String,
    contact_address: ContactAddress,
    date_of_birth: NaiveDate,
    postal_address: String,
}

impl SubjectProfile {
    pub fn new(
        name: impl Into<String>,
        contact_address: impl Into<String>,
        date_of_birth: NaiveDate,
        postal_address: impl Into<String>,
    ) -> Result<Self, LifecycleError> {
        let profile = Self {
            name: name.into(),
            contact_address: ContactAddress(contact_address.into()),
            date_of_birth,
            postal_address: postal_address.into(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Deserialized profiles skip `new`, so the orchestrator calls this again
    /// before touching the store.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.name.trim().is_empty() {
            return Err(LifecycleError::InvalidSubject("name cannot be empty"));
        }
        if self.contact_address.0.trim().is_empty() {
            return Err(LifecycleError::InvalidSubject("contact address cannot be empty"));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_address(&self) -> &ContactAddress {
        &self.contact_address
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn postal_address(&self) -> &str {
        &self.postal_address
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self, LifecycleError> {
        self.name = name.into();
        self.validate()?;
        Ok(self)
    }

    pub fn with_contact_address(mut self, address: impl Into<String>) -> Result<Self, LifecycleError> {
        self.contact_address = ContactAddress(address.into());
        self.validate()?;
        Ok(self)
    }

    pub fn with_postal_address(mut self, postal_address: impl Into<String>) -> Self {
        self.postal_address = postal_address.into();
        self
    }
}

/// A persisted subject record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub contact_address: ContactAddress,
    pub date_of_birth: NaiveDate,
    pub postal_address: String,
}

impl Subject {
    pub fn from_profile(id: SubjectId, profile: SubjectProfile) -> Self {
        Self {
            id,
            name: profile.name,
            contact_address: profile.contact_address,
            date_of_birth: profile.date_of_birth,
            postal_address: profile.postal_address,
        }
    }

    pub fn profile(&self) -> SubjectProfile {
        SubjectProfile {
            name: self.name.clone(),
            contact_address: self.contact_address.clone(),
            date_of_birth: self.date_of_birth,
            postal_address: self.postal_address.clone(),
        }
    }
}
