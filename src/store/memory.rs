use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

use super::{StoreError, SubjectStore};
use crate::domain::subject::{ContactAddress, Subject, SubjectId, SubjectProfile};

/// One recorded store invocation, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    FindAll,
    FindById(SubjectId),
    ExistsByAddress(ContactAddress),
    ExistsByAddressExcluding(ContactAddress, SubjectId),
    Save(Option<SubjectId>),
    DeleteById(SubjectId),
}

#[derive(Default)]
struct Records {
    subjects: HashMap<SubjectId, Subject>,
    order: Vec<SubjectId>,
    by_address: HashMap<ContactAddress, SubjectId>,
}

/// In-memory subject store.
///
/// Records, insertion order and the address index sit behind one write lock,
/// so the uniqueness check inside `save` and the mutation are a single step.
#[derive(Default)]
pub struct InMemorySubjectStore {
    records: RwLock<Records>,
    calls: Mutex<Vec<StoreCall>>,
    fail_next_save: Mutex<Option<String>>,
}

impl InMemorySubjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StoreCall::Save(_)))
            .count()
    }

    /// Make the next `save` fail with a backend error.
    pub fn fail_next_save(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.fail_next_save.lock() {
            *slot = Some(reason.into());
        }
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn take_injected_failure(&self) -> Option<String> {
        self.fail_next_save.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl SubjectStore for InMemorySubjectStore {
    async fn find_all(&self) -> Result<Vec<Subject>, StoreError> {
        self.record(StoreCall::FindAll);
        let records = self.records.read().await;
        Ok(records
            .order
            .iter()
            .filter_map(|id| records.subjects.get(id).cloned())
            .collect())
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, StoreError> {
        self.record(StoreCall::FindById(id));
        Ok(self.records.read().await.subjects.get(&id).cloned())
    }

    async fn exists_by_address(&self, address: &ContactAddress) -> Result<bool, StoreError> {
        self.record(StoreCall::ExistsByAddress(address.clone()));
        Ok(self.records.read().await.by_address.contains_key(address))
    }

    async fn exists_by_address_excluding(
        &self,
        address: &ContactAddress,
        id: SubjectId,
    ) -> Result<bool, StoreError> {
        self.record(StoreCall::ExistsByAddressExcluding(address.clone(), id));
        let records = self.records.read().await;
        Ok(records.by_address.get(address).is_some_and(|owner| *owner != id))
    }

    async fn save(&self, id: Option<SubjectId>, profile: SubjectProfile) -> Result<Subject, StoreError> {
        self.record(StoreCall::Save(id));

        if let Some(reason) = self.take_injected_failure() {
            return Err(StoreError::Backend(reason));
        }

        let mut records = self.records.write().await;

        if let Some(owner) = records.by_address.get(profile.contact_address()) {
            if Some(*owner) != id {
                return Err(StoreError::DuplicateAddress(profile.contact_address().clone()));
            }
        }

        let subject = match id {
            None => {
                let id = SubjectId::generate();
                records.order.push(id);
                Subject::from_profile(id, profile)
            }
            Some(id) => {
                let previous = records.subjects.get(&id).ok_or(StoreError::NotFound(id))?;
                let previous_address = previous.contact_address.clone();
                records.by_address.remove(&previous_address);
                Subject::from_profile(id, profile)
            }
        };

        records.by_address.insert(subject.contact_address.clone(), subject.id);
        records.subjects.insert(subject.id, subject.clone());

        Ok(subject)
    }

    async fn delete_by_id(&self, id: SubjectId) -> Result<(), StoreError> {
        self.record(StoreCall::DeleteById(id));
        let mut records = self.records.write().await;

        let removed = records.subjects.remove(&id).ok_or(StoreError::NotFound(id))?;
        records.by_address.remove(&removed.contact_address);
        records.order.retain(|existing| *existing != id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn profile(name: &str, address: &str) -> SubjectProfile {
        SubjectProfile::new(
            name,
            address,
            NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
            "123 Main St",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_identifier_and_keeps_order() {
        let store = InMemorySubjectStore::new();

        let first = store.save(None, profile("John Doe", "john@example.com")).await.unwrap();
        let second = store.save(None, profile("Jane Doe", "jane@example.com")).await.unwrap();

        assert_ne!(first.id, second.id);
        let all = store.find_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn test_save_rejects_address_held_by_other_subject() {
        let store = InMemorySubjectStore::new();
        store.save(None, profile("John Doe", "john@example.com")).await.unwrap();

        let result = store.save(None, profile("Johnny", "john@example.com")).await;

        assert!(matches!(result, Err(StoreError::DuplicateAddress(_))));
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_moves_address_index() {
        let store = InMemorySubjectStore::new();
        let subject = store.save(None, profile("John Doe", "john@example.com")).await.unwrap();

        store
            .save(Some(subject.id), profile("John Doe", "john.doe@work.example"))
            .await
            .unwrap();

        let old = ContactAddress::new("john@example.com");
        let new = ContactAddress::new("john.doe@work.example");
        assert!(!store.exists_by_address(&old).await.unwrap());
        assert!(store.exists_by_address(&new).await.unwrap());
        assert!(!store.exists_by_address_excluding(&new, subject.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_of_missing_record_is_not_found() {
        let store = InMemorySubjectStore::new();
        let missing = SubjectId::generate();

        let result = store.save(Some(missing), profile("Ghost", "ghost@example.com")).await;

        assert!(matches!(result, Err(StoreError::NotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_delete_frees_address() {
        let store = InMemorySubjectStore::new();
        let subject = store.save(None, profile("John Doe", "john@example.com")).await.unwrap();

        store.delete_by_id(subject.id).await.unwrap();

        assert!(store.find_by_id(subject.id).await.unwrap().is_none());
        assert!(!store.exists_by_address(&subject.contact_address).await.unwrap());
        assert!(matches!(
            store.delete_by_id(subject.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let store = InMemorySubjectStore::new();
        store.fail_next_save("disk full");

        assert!(matches!(
            store.save(None, profile("John Doe", "john@example.com")).await,
            Err(StoreError::Backend(_))
        ));
        assert!(store.save(None, profile("John Doe", "john@example.com")).await.is_ok());
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_commit_one_address_once() {
        let store = Arc::new(InMemorySubjectStore::new());

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .save(None, profile(&format!("Racer {n}"), "shared@example.com"))
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }
}
