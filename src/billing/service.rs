use async_trait::async_trait;

use super::proto::{BillingRequest, BillingResponse};
use super::{AccountProvisioner, AccountStatus, ProvisionedAccount, ProvisioningError};

/// Billing callee logic, runnable in-process when no remote billing endpoint
/// is configured. Accounts are keyed by the subject identifier and open
/// immediately as `ACTIVE`.
#[derive(Debug, Default, Clone)]
pub struct BillingAccountService;

impl BillingAccountService {
    pub fn new() -> Self {
        Self
    }

    pub fn create_billing_account(&self, request: &BillingRequest) -> BillingResponse {
        tracing::info!(
            patient_id = %request.patient_id,
            name = %request.name,
            "Create billing account request received"
        );

        BillingResponse {
            account_id: request.patient_id.clone(),
            status: AccountStatus::Active.as_str().to_string(),
        }
    }
}

#[async_trait]
impl AccountProvisioner for BillingAccountService {
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        address: &str,
    ) -> Result<ProvisionedAccount, ProvisioningError> {
        let response = self.create_billing_account(&BillingRequest {
            patient_id: subject_id.to_string(),
            name: name.to_string(),
            email: address.to_string(),
        });

        Ok(ProvisionedAccount {
            account_id: response.account_id,
            status: response.status.parse()?,
        })
    }
}
