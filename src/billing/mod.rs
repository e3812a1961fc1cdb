// ============================================================================
// Account Provisioning - billing port
// ============================================================================
//
// `create_account` is NOT idempotent on the billing side: two calls for one
// subject may open two accounts. Callers invoke it at most once per
// successful local create and never retry it.
//
// ============================================================================

mod grpc;
mod proto;
mod service;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use grpc::GrpcBillingClient;
pub use proto::{BillingRequest, BillingResponse};
pub use service::BillingAccountService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Pending,
    Failed,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Pending => "PENDING",
            AccountStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "PENDING" => Ok(AccountStatus::Pending),
            "FAILED" => Ok(AccountStatus::Failed),
            other => Err(ProvisioningError::InvalidResponse(format!(
                "unknown account status {other:?}"
            ))),
        }
    }
}

/// Result of a billing call. Not persisted by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    pub account_id: String,
    pub status: AccountStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Billing call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Billing service unavailable: {0}")]
    Unavailable(String),

    #[error("Billing service rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid billing response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    async fn create_account(
        &self,
        subject_id: &str,
        name: &str,
        address: &str,
    ) -> Result<ProvisionedAccount, ProvisioningError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_known_values() {
        for status in [AccountStatus::Active, AccountStatus::Pending, AccountStatus::Failed] {
            assert_eq!(status.as_str().parse::<AccountStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_rejects_unknown_value() {
        let result = "active".parse::<AccountStatus>();
        assert!(matches!(result, Err(ProvisioningError::InvalidResponse(_))));
    }
}
