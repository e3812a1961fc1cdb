use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::billing::{AccountProvisioner, AccountStatus, ProvisionedAccount, ProvisioningError};
use crate::events::ChangeEvent;
use crate::messaging::{EventPublisher, PublishError};
use crate::metrics::Metrics;
use crate::store::SubjectStore;

use super::errors::LifecycleError;
use super::value_objects::{Subject, SubjectId, SubjectProfile};

// ============================================================================
// Subject Lifecycle Orchestrator
// ============================================================================
//
// Create:  exists_by_address -> save -> create_account -> publish
// Update:  find_by_id -> exists_by_address_excluding (address changed) -> save
// Delete:  delete_by_id
//
// Local invariant checks fail before any external call. Once the record is
// saved it is the source of truth: a billing failure is reported to the
// caller but the record is kept (no compensating delete), and a publish
// failure is only logged.
//
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct LifecycleTimeouts {
    pub provisioning: Duration,
    pub publish: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            provisioning: Duration::from_secs(5),
            publish: Duration::from_secs(2),
        }
    }
}

pub struct SubjectLifecycle {
    store: Arc<dyn SubjectStore>,
    provisioner: Arc<dyn AccountProvisioner>,
    publisher: Arc<dyn EventPublisher>,
    timeouts: LifecycleTimeouts,
    metrics: Option<Arc<Metrics>>,
}

impl SubjectLifecycle {
    pub fn new(
        store: Arc<dyn SubjectStore>,
        provisioner: Arc<dyn AccountProvisioner>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            provisioner,
            publisher,
            timeouts: LifecycleTimeouts::default(),
            metrics: None,
        }
    }

    pub fn with_timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn list(&self) -> Result<Vec<Subject>, LifecycleError> {
        Ok(self.store.find_all().await?)
    }

    pub async fn get(&self, id: SubjectId) -> Result<Subject, LifecycleError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(LifecycleError::SubjectNotFound(id))
    }

    pub async fn create(&self, profile: SubjectProfile) -> Result<Subject, LifecycleError> {
        let result = self.run_create(profile).await;
        self.observe("create", &result);
        result
    }

    pub async fn update(&self, id: SubjectId, profile: SubjectProfile) -> Result<Subject, LifecycleError> {
        let result = self.run_update(id, profile).await;
        self.observe("update", &result);
        result
    }

    pub async fn delete(&self, id: SubjectId) -> Result<(), LifecycleError> {
        let result = self.store.delete_by_id(id).await.map_err(LifecycleError::from);
        if result.is_ok() {
            tracing::info!(subject_id = %id, "Subject deleted");
        }
        self.observe("delete", &result);
        result
    }

    async fn run_create(&self, profile: SubjectProfile) -> Result<Subject, LifecycleError> {
        profile.validate()?;

        if self.store.exists_by_address(profile.contact_address()).await? {
            return Err(LifecycleError::DuplicateAddress(profile.contact_address().clone()));
        }

        let subject = self.store.save(None, profile).await?;
        tracing::info!(subject_id = %subject.id, "Subject registered");

        self.provision(&subject).await?;
        self.publish_created(&subject).await;

        Ok(subject)
    }

    async fn run_update(&self, id: SubjectId, profile: SubjectProfile) -> Result<Subject, LifecycleError> {
        profile.validate()?;

        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(LifecycleError::SubjectNotFound(id))?;

        if current.contact_address != *profile.contact_address()
            && self
                .store
                .exists_by_address_excluding(profile.contact_address(), id)
                .await?
        {
            return Err(LifecycleError::DuplicateAddress(profile.contact_address().clone()));
        }

        let updated = self.store.save(Some(id), profile).await?;
        tracing::info!(subject_id = %id, "Subject updated");

        Ok(updated)
    }

    /// Exactly one billing call per committed create. Never retried: the
    /// billing side has no idempotency key.
    async fn provision(&self, subject: &Subject) -> Result<ProvisionedAccount, LifecycleError> {
        let subject_id = subject.id.to_string();
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            self.timeouts.provisioning,
            self.provisioner
                .create_account(&subject_id, &subject.name, subject.contact_address.as_str()),
        )
        .await;

        if let Some(metrics) = &self.metrics {
            metrics.observe_provisioning(started.elapsed().as_secs_f64());
        }

        let account = outcome
            .unwrap_or(Err(ProvisioningError::Timeout(self.timeouts.provisioning)))
            .and_then(|account| match account.status {
                AccountStatus::Failed => Err(ProvisioningError::Rejected(format!(
                    "account {} opened with status {}",
                    account.account_id, account.status
                ))),
                _ => Ok(account),
            })
            .map_err(|source| {
                tracing::error!(
                    subject_id = %subject.id,
                    error = %source,
                    "Account provisioning failed; subject record kept"
                );
                LifecycleError::ProvisioningFailed {
                    subject_id: subject.id,
                    source,
                }
            })?;

        tracing::info!(
            subject_id = %subject.id,
            account_id = %account.account_id,
            status = %account.status,
            "Billing account linked"
        );

        Ok(account)
    }

    async fn publish_created(&self, subject: &Subject) {
        let event = ChangeEvent::created(subject);

        let result = tokio::time::timeout(self.timeouts.publish, self.publisher.publish(&event))
            .await
            .unwrap_or(Err(PublishError::Timeout(self.timeouts.publish)));

        if let Err(e) = result {
            tracing::warn!(
                subject_id = %subject.id,
                error = %e,
                "Failed to publish subject created event"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_publish_failure(e.reason());
            }
        }
    }

    fn observe<T>(&self, operation: &str, result: &Result<T, LifecycleError>) {
        if let Err(e) = result {
            tracing::debug!(operation, kind = e.kind(), error = %e, "Lifecycle operation rejected");
        }

        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(_) => metrics.record_lifecycle_success(operation),
            Err(e) => metrics.record_lifecycle_failure(operation, e.kind()),
        }
    }
}
