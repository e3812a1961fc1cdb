//! Deterministic fakes for the orchestration ports.
//!
//! Each fake appends to a call log instead of relying on a mocking framework;
//! the provisioner and publisher can share one [`CallLog`] so tests can
//! assert cross-collaborator ordering.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::billing::{AccountProvisioner, AccountStatus, ProvisionedAccount, ProvisioningError};
use crate::events::ChangeEvent;
use crate::messaging::{ChangeEventHandler, EventPublisher, PublishError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Provision {
        subject_id: String,
        name: String,
        address: String,
    },
    Publish(ChangeEvent),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Step>>>);

impl CallLog {
    pub fn push(&self, step: Step) {
        self.0.lock().expect("call log").push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().expect("call log").clone()
    }

    pub fn provision_count(&self) -> usize {
        self.steps().iter().filter(|s| matches!(s, Step::Provision { .. })).count()
    }

    pub fn publish_count(&self) -> usize {
        self.steps().iter().filter(|s| matches!(s, Step::Publish(_))).count()
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail,
    Delay(Duration),
}

pub struct RecordingProvisioner {
    log: CallLog,
    behavior: Behavior,
    status: AccountStatus,
}

impl RecordingProvisioner {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            behavior: Behavior::Succeed,
            status: AccountStatus::Active,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl AccountProvisioner for RecordingProvisioner {
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        address: &str,
    ) -> Result<ProvisionedAccount, ProvisioningError> {
        self.log.push(Step::Provision {
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            address: address.to_string(),
        });

        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail => return Err(ProvisioningError::Unavailable("billing is down".to_string())),
            Behavior::Delay(delay) => tokio::time::sleep(*delay).await,
        }

        Ok(ProvisionedAccount {
            account_id: subject_id.to_string(),
            status: self.status,
        })
    }
}

pub struct RecordingPublisher {
    log: CallLog,
    behavior: Behavior,
}

impl RecordingPublisher {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            behavior: Behavior::Succeed,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &ChangeEvent) -> Result<(), PublishError> {
        self.log.push(Step::Publish(event.clone()));

        match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(PublishError::Broker("broker rejected message".to_string())),
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
        }
    }
}

/// Event handler that records what it received and can be told to fail or
/// panic for specific subject ids.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ChangeEvent>>,
    fail_ids: Mutex<HashSet<String>>,
    panic_ids: Mutex<HashSet<String>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().expect("events").clone()
    }

    pub fn fail_for(&self, subject_id: &str) {
        self.fail_ids.lock().expect("fail ids").insert(subject_id.to_string());
    }

    pub fn panic_for(&self, subject_id: &str) {
        self.panic_ids.lock().expect("panic ids").insert(subject_id.to_string());
    }
}

#[async_trait]
impl ChangeEventHandler for RecordingHandler {
    async fn handle(&self, event: ChangeEvent) -> anyhow::Result<()> {
        if self.panic_ids.lock().expect("panic ids").contains(&event.subject_id) {
            panic!("handler blew up on {}", event.subject_id);
        }
        if self.fail_ids.lock().expect("fail ids").contains(&event.subject_id) {
            anyhow::bail!("analytics sink rejected {}", event.subject_id);
        }
        self.events.lock().expect("events").push(event);
        Ok(())
    }
}
